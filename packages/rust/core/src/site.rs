//! End-to-end site build: discover → generate → expand → write.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use kustdoc_discovery::{Discovery, discover};
use kustdoc_shared::{
    BlockFailure, BuildConfig, CURRENT_SCHEMA_VERSION, KustdocError, ManifestPage, NavNode,
    Result, SiteManifest,
};

use crate::build::BuildTool;
use crate::generate::{self, Page, bundle_key};
use crate::nav;
use crate::page::{PageRenderer, PathResolver, RenderedPage};

/// Name of the navigation file written to the site root.
pub const NAV_FILE: &str = "nav.json";
/// Name of the manifest written to the site root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Result of [`build_site`].
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Output directory.
    pub site_dir: PathBuf,
    /// Pages written.
    pub page_count: usize,
    /// Of which generated from discovered bundles.
    pub generated_count: usize,
    /// Bundles discovered (0 when discovery is off).
    pub bundle_count: usize,
    /// Directive blocks that became error notices.
    pub failures: Vec<BlockFailure>,
    /// Discovery and page warnings, in the order they arose.
    pub warnings: Vec<String>,
    /// The navigation written to `nav.json`.
    pub nav: Vec<NavNode>,
    /// Wall time of the build.
    pub elapsed: Duration,
}

/// Progress callback for reporting build status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each page finishes rendering (in completion order).
    fn page_rendered(&self, path: &str, current: usize, total: usize);
    /// Called when the build completes.
    fn done(&self, report: &BuildReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_rendered(&self, _path: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &BuildReport) {}
}

/// Run a full site build.
///
/// 1. Discover bundles under `auto_nav_path` and generate their pages
/// 2. Collect authored pages from `docs_dir`
/// 3. Expand directives, up to `render_concurrency` pages at once
/// 4. Append the generated section to the configured navigation
/// 5. Write pages, `nav.json` and `manifest.json` to `site_dir`
///
/// Directive failures never abort the build; they are counted in the report.
#[instrument(skip_all, fields(site_dir = %config.site_dir.display()))]
pub async fn build_site(
    config: &BuildConfig,
    tool: Arc<dyn BuildTool>,
    progress: &dyn ProgressReporter,
) -> Result<BuildReport> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    // --- Phase 1: Discovery ---
    let discovery = match &config.auto_nav_path {
        Some(root) => {
            progress.phase("Discovering bundles");
            Some(discover(root)?)
        }
        None => {
            debug!("auto_nav_path not set, discovery disabled");
            None
        }
    };
    if let Some(discovery) = &discovery {
        warnings.extend(discovery.warnings.iter().map(ToString::to_string));
    }

    // --- Phase 2: Page sources ---
    progress.phase("Collecting pages");
    let generated = discovery
        .as_ref()
        .map(|d| generate::generated_pages(d, config))
        .unwrap_or_default();
    let generated_count = generated.len();
    let authored = generate::collect_authored(&config.docs_dir, &config.site_dir, &mut warnings)?;
    let pages = combine_pages(generated, authored, &mut warnings);

    // --- Phase 3: Expand directives ---
    progress.phase("Rendering pages");
    let renderer = Arc::new(PageRenderer::new(
        tool,
        resolver(config, discovery.as_ref()),
        config.enable_rendering,
    ));
    let rendered = render_pages(pages, renderer, config.render_concurrency, progress).await?;

    // --- Phase 4: Navigation ---
    let mut nav_entries = config.nav.clone();
    if let Some(discovery) = &discovery {
        nav::append_section(
            &mut nav_entries,
            nav::build_nav(&discovery.bundles, &config.nav_title, &config.section),
        );
    }

    // --- Phase 5: Write ---
    progress.phase("Writing site");
    let failures: Vec<BlockFailure> = rendered
        .iter()
        .flat_map(|(_, out)| out.failures.iter().cloned())
        .collect();
    let manifest_pages = write_site(&config.site_dir, &rendered, &nav_entries)?;
    let manifest = SiteManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        generated_at: Utc::now(),
        page_count: manifest_pages.len(),
        pages: manifest_pages,
        failures: failures.clone(),
        warnings: warnings.clone(),
    };
    write_json_atomic(&config.site_dir.join(MANIFEST_FILE), &manifest)?;

    // --- Phase 6: Report ---
    if !warnings.is_empty() {
        warn!(
            count = warnings.len(),
            warnings = %warnings.join("; "),
            "build finished with warnings"
        );
    }

    let report = BuildReport {
        site_dir: config.site_dir.clone(),
        page_count: manifest.page_count,
        generated_count,
        bundle_count: discovery.as_ref().map(Discovery::bundle_count).unwrap_or(0),
        failures,
        warnings,
        nav: nav_entries,
        elapsed: start.elapsed(),
    };

    info!(
        pages = report.page_count,
        bundles = report.bundle_count,
        failures = report.failures.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "site build complete"
    );
    progress.done(&report);

    Ok(report)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Generated pages first, then authored ones. An authored page replaces a
/// generated page at the same path.
fn combine_pages(generated: Vec<Page>, authored: Vec<Page>, warnings: &mut Vec<String>) -> Vec<Page> {
    let mut pages: Vec<Page> = Vec::with_capacity(generated.len() + authored.len());
    for page in generated {
        if authored.iter().any(|a| a.path == page.path) {
            warnings.push(format!(
                "{}: authored page replaces the generated one",
                page.path
            ));
            continue;
        }
        pages.push(page);
    }
    pages.extend(authored);
    pages
}

/// Directive path resolver seeded with every discovered bundle.
fn resolver(config: &BuildConfig, discovery: Option<&Discovery>) -> PathResolver {
    let mut resolver = PathResolver::new(&config.project_root, config.kustomize_dirs.clone());
    if let Some(discovery) = discovery {
        for bundle in discovery.bundles.iter().flat_map(|b| b.walk()) {
            resolver.insert_discovered(bundle_key(&bundle.rel_path), &bundle.path);
        }
    }
    resolver
}

/// Expand every page on blocking workers, at most `concurrency` at a time.
///
/// Results come back in input order regardless of completion order.
async fn render_pages(
    pages: Vec<Page>,
    renderer: Arc<PageRenderer>,
    concurrency: usize,
    progress: &dyn ProgressReporter,
) -> Result<Vec<(Page, RenderedPage)>> {
    let total = pages.len();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (index, page) in pages.into_iter().enumerate() {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| KustdocError::Render(e.to_string()))?;
        let renderer = Arc::clone(&renderer);
        tasks.spawn_blocking(move || {
            let _permit = permit;
            let rendered = renderer.render_page(&page.path, &page.source);
            (index, page, rendered)
        });
    }

    let mut slots: Vec<Option<(Page, RenderedPage)>> = (0..total).map(|_| None).collect();
    let mut completed = 0;
    while let Some(joined) = tasks.join_next().await {
        let (index, page, rendered) = joined.map_err(|e| KustdocError::Render(e.to_string()))?;
        completed += 1;
        progress.page_rendered(&page.path, completed, total);
        slots[index] = Some((page, rendered));
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Write every page and `nav.json`; returns the manifest entries.
fn write_site(
    site_dir: &Path,
    pages: &[(Page, RenderedPage)],
    nav: &[NavNode],
) -> Result<Vec<ManifestPage>> {
    std::fs::create_dir_all(site_dir).map_err(|e| KustdocError::io(site_dir, e))?;

    let mut entries = Vec::with_capacity(pages.len());
    for (page, rendered) in pages {
        let content = with_trailing_newline(&rendered.content);
        write_page(site_dir, &page.path, &content)?;
        entries.push(ManifestPage {
            path: page.path.clone(),
            title: page.title.clone(),
            sha256: sha256_hex(&content),
            generated: page.generated,
        });
    }

    write_json_atomic(&site_dir.join(NAV_FILE), &nav)?;
    Ok(entries)
}

/// Page text as written: unchanged apart from a final newline.
fn with_trailing_newline(content: &str) -> String {
    let mut out = content.to_string();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Write a single page below the site directory.
fn write_page(site_dir: &Path, page_path: &str, content: &str) -> Result<()> {
    let file_path = site_dir.join(page_path);

    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| KustdocError::io(parent, e))?;
    }

    std::fs::write(&file_path, content).map_err(|e| KustdocError::io(&file_path, e))?;

    debug!(path = %file_path.display(), "wrote page");
    Ok(())
}

/// Write pretty-printed JSON via a temp file and rename.
fn write_json_atomic<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(|e| {
        KustdocError::validation(format!("JSON serialization failed: {e}"))
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, json).map_err(|e| KustdocError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| KustdocError::io(path, e))?;

    debug!(path = %path.display(), "wrote JSON file");
    Ok(())
}

fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
