//! Page sources: virtual pages generated from discovery, and authored pages
//! collected from the docs directory.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};
use url::Url;

use kustdoc_discovery::{Discovery, readme_heading};
use kustdoc_markdown::{Directive, fenced, frontmatter};
use kustdoc_shared::{Bundle, BuildConfig, KustdocError, Result};

use crate::nav::{bundle_page_path, section_index_path};

/// A page before directive expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Site path, `/`-separated (e.g., `kustomize/base/index.md`).
    pub path: String,
    /// Title for the manifest, when known.
    pub title: Option<String>,
    /// Markdown source.
    pub source: String,
    /// Whether the page was generated from a discovered bundle.
    pub generated: bool,
}

/// Directive path under which a discovered bundle is registered.
///
/// The root bundle has no relative path, so it is addressed as `.`.
pub fn bundle_key(rel_path: &str) -> &str {
    if rel_path.is_empty() { "." } else { rel_path }
}

// ---------------------------------------------------------------------------
// Generated pages
// ---------------------------------------------------------------------------

/// The section index followed by one page per bundle, in pre-order.
#[instrument(skip_all, fields(bundles = discovery.bundle_count()))]
pub fn generated_pages(discovery: &Discovery, config: &BuildConfig) -> Vec<Page> {
    let all: Vec<&Bundle> = discovery.bundles.iter().flat_map(|b| b.walk()).collect();
    let listed: Vec<&Bundle> = all
        .iter()
        .copied()
        .filter(|b| !b.rel_path.is_empty())
        .collect();

    let mut pages = Vec::with_capacity(listed.len() + 1);

    let index_path = section_index_path(&config.section);
    let index_source = match all.first() {
        Some(root) if root.rel_path.is_empty() => {
            let mut source = bundle_source(root, &config.nav_title, config);
            source.push('\n');
            source.push_str(&bundle_listing(&listed, "## Bundles"));
            source
        }
        _ => overview_source(&listed, &config.nav_title),
    };
    pages.push(Page {
        path: index_path,
        title: Some(config.nav_title.clone()),
        source: index_source,
        generated: true,
    });

    for bundle in listed {
        pages.push(Page {
            path: bundle_page_path(&config.section, &bundle.rel_path),
            title: Some(bundle.title.clone()),
            source: bundle_source(bundle, &bundle.title, config),
            generated: true,
        });
    }

    debug!(pages = pages.len(), "generated bundle pages");
    pages
}

/// Page source for one bundle: frontmatter, description, usage, directive.
fn bundle_source(bundle: &Bundle, title: &str, config: &BuildConfig) -> String {
    let source_dir = repo_dir(&bundle.path, &config.project_root, &bundle.rel_path);
    let mut out = frontmatter(title, Some(source_dir.as_str()));
    out.push('\n');

    if bundle.heading.is_none() {
        out.push_str(&format!("# {title}\n\n"));
    }
    if let Some(description) = &bundle.description {
        out.push_str(description.trim_end());
        out.push_str("\n\n");
    }
    if let Some(repo_url) = &config.repo_url {
        out.push_str(&usage_section(repo_url, &source_dir));
        out.push('\n');
    }

    out.push_str(&Directive::to_markdown(bundle_key(&bundle.rel_path), true));
    out
}

/// How to apply the bundle, locally and from the remote repository.
fn usage_section(repo_url: &Url, dir: &str) -> String {
    let remote = format!("{}/{dir}", repo_url.as_str().trim_end_matches('/'));
    let kustomization = format!(
        "apiVersion: kustomize.config.k8s.io/v1beta1\nkind: Kustomization\nresources:\n  - {remote}?ref=main\n"
    );

    let mut out = String::from("## Usage\n\n");
    out.push_str("From a clone of the repository, run from its root directory:\n\n");
    out.push_str(&fenced("sh", &format!("kubectl apply -k {dir}\n")));
    out.push_str("\nOr, without cloning:\n\n");
    out.push_str(&fenced("sh", &format!("kubectl apply -k {remote}\n")));
    out.push_str("\nAs part of an overlay in your own repository:\n\n");
    out.push_str(&fenced("yaml", &kustomization));
    out
}

/// Section index for a discovery root that is not itself a bundle.
fn overview_source(listed: &[&Bundle], nav_title: &str) -> String {
    let mut out = frontmatter(nav_title, None);
    out.push_str(&format!("\n# {nav_title}\n\n"));
    out.push_str("This section contains auto-discovered Kustomize configurations.\n\n");
    out.push_str(&bundle_listing(listed, ""));
    if !listed.is_empty() {
        out.push_str("\nUse the navigation menu to explore each configuration.\n");
    }
    out
}

/// Bulleted list of bundles, linked relative to the section index.
fn bundle_listing(listed: &[&Bundle], heading: &str) -> String {
    let mut out = String::new();
    if !heading.is_empty() {
        out.push_str(heading);
        out.push_str("\n\n");
    }
    if listed.is_empty() {
        out.push_str("No directories with Kustomize configurations were found.\n");
        return out;
    }

    out.push_str(&format!(
        "Found {} directories with Kustomize configurations:\n\n",
        listed.len()
    ));
    for bundle in listed {
        let label = bundle.heading.as_deref().unwrap_or(&bundle.title);
        out.push_str(&format!(
            "- [**{label}**]({rel}/index.md) (`{rel}`)\n",
            rel = bundle.rel_path
        ));
    }
    out
}

/// Bundle directory relative to the project root, `/`-separated; falls back
/// to the discovery-relative path when the bundle lies elsewhere.
fn repo_dir(path: &Path, project_root: &Path, rel_path: &str) -> String {
    match path.strip_prefix(project_root) {
        Ok(rel) => {
            let joined = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            if joined.is_empty() { ".".to_string() } else { joined }
        }
        Err(_) => bundle_key(rel_path).to_string(),
    }
}

// ---------------------------------------------------------------------------
// Authored pages
// ---------------------------------------------------------------------------

/// Every `*.md` file below `docs_dir`, sorted by site path.
///
/// Hidden directories and `exclude` (usually the output directory) are not
/// descended into. A missing `docs_dir` yields no pages. A directory reached
/// a second time through a symlink is skipped and noted in `warnings`.
#[instrument(skip_all, fields(docs_dir = %docs_dir.display()))]
pub fn collect_authored(
    docs_dir: &Path,
    exclude: &Path,
    warnings: &mut Vec<String>,
) -> Result<Vec<Page>> {
    if !docs_dir.is_dir() {
        debug!("docs directory does not exist, no authored pages");
        return Ok(Vec::new());
    }

    let mut pages = Vec::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut stack: Vec<(PathBuf, Vec<String>)> = vec![(docs_dir.to_path_buf(), Vec::new())];

    while let Some((dir, rel)) = stack.pop() {
        let canonical = fs::canonicalize(&dir).map_err(|e| KustdocError::io(&dir, e))?;
        if !visited.insert(canonical) {
            warn!(dir = %dir.display(), "skipping docs directory already visited");
            warnings.push(format!(
                "{}: already visited via another path (symlink loop?)",
                dir.display()
            ));
            continue;
        }

        let entries = fs::read_dir(&dir).map_err(|e| KustdocError::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| KustdocError::io(&dir, e))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }

            let mut segments = rel.clone();
            segments.push(name.clone());

            if path.is_dir() {
                if path != exclude {
                    stack.push((path, segments));
                }
            } else if name.ends_with(".md") {
                let source =
                    fs::read_to_string(&path).map_err(|e| KustdocError::io(&path, e))?;
                pages.push(Page {
                    path: segments.join("/"),
                    title: readme_heading(&source),
                    source,
                    generated: false,
                });
            }
        }
    }

    pages.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(pages = pages.len(), "collected authored pages");
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use kustdoc_discovery::discover;
    use kustdoc_shared::{AppConfig, BuildConfig};
    use tempfile::TempDir;

    use super::*;

    fn bundle_dir(root: &Path, rel: &str, readme: Option<&str>) {
        let dir = root.join(rel);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("kustomization.yaml"), "resources: []\n").unwrap();
        if let Some(readme) = readme {
            fs::write(dir.join("README.md"), readme).unwrap();
        }
    }

    fn config(project: &Path, repo_url: Option<&str>) -> BuildConfig {
        let mut app = AppConfig::default();
        app.kustomize.auto_nav_path = Some(PathBuf::from("kubernetes"));
        app.kustomize.repo_url = repo_url.map(|u| Url::parse(u).unwrap());
        BuildConfig::resolve(&app, project).unwrap()
    }

    #[test]
    fn index_lists_bundles_and_pages_follow() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("kubernetes");
        bundle_dir(&root, "base", Some("# Base Layer\n\nShared resources.\n"));
        bundle_dir(&root, "overlays/staging", None);

        let config = config(tmp.path(), None);
        let discovery = discover(&root).unwrap();
        let pages = generated_pages(&discovery, &config);

        let paths: Vec<_> = pages.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "kustomize/index.md",
                "kustomize/base/index.md",
                "kustomize/overlays/staging/index.md"
            ]
        );
        assert!(pages.iter().all(|p| p.generated));

        let index = &pages[0].source;
        assert!(index.contains("# Kustomize\n"));
        assert!(index.contains("Found 2 directories"));
        assert!(index.contains("- [**Base Layer**](base/index.md) (`base`)"));
        assert!(index.contains("- [**Overlays > Staging**](overlays/staging/index.md) (`overlays/staging`)"));

        let base = &pages[1].source;
        assert!(base.starts_with("---\ntitle: \"Base\"\nsource: \"kubernetes/base\"\n---\n"));
        assert!(base.contains("# Base Layer\n\nShared resources.\n"));
        assert!(!base.contains("# Base\n"));
        assert!(base.ends_with("```kustomize base [analyze=true]\n```\n"));
        assert!(!base.contains("## Usage"));

        let staging = &pages[2].source;
        assert!(staging.contains("# Overlays > Staging\n"));
    }

    #[test]
    fn usage_section_uses_repo_url() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("kubernetes");
        bundle_dir(&root, "base", None);

        let config = config(tmp.path(), Some("https://github.com/org/catalog/"));
        let pages = generated_pages(&discover(&root).unwrap(), &config);
        let base = &pages[1].source;

        assert!(base.contains("## Usage"));
        assert!(base.contains("kubectl apply -k kubernetes/base\n"));
        assert!(base.contains("kubectl apply -k https://github.com/org/catalog/kubernetes/base\n"));
        assert!(base.contains("  - https://github.com/org/catalog/kubernetes/base?ref=main\n"));
    }

    #[test]
    fn root_bundle_owns_the_index() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("kubernetes");
        bundle_dir(&root, "", Some("Top level.\n"));
        bundle_dir(&root, "base", None);

        let config = config(tmp.path(), None);
        let pages = generated_pages(&discover(&root).unwrap(), &config);

        assert_eq!(pages.len(), 2);
        let index = &pages[0];
        assert_eq!(index.path, "kustomize/index.md");
        assert_eq!(index.title.as_deref(), Some("Kustomize"));
        assert!(index.source.contains("Top level."));
        assert!(index.source.contains("```kustomize . [analyze=true]\n```\n"));
        assert!(index.source.contains("## Bundles\n\nFound 1 directories"));
    }

    #[test]
    fn empty_discovery_still_has_an_index() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("kubernetes/docs")).unwrap();

        let config = config(tmp.path(), None);
        let pages = generated_pages(&discover(&tmp.path().join("kubernetes")).unwrap(), &config);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].source.contains("No directories with Kustomize configurations were found."));
    }

    #[test]
    fn authored_pages_are_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        let docs = tmp.path().join("docs");
        fs::create_dir_all(docs.join("guides")).unwrap();
        fs::create_dir_all(docs.join(".hidden")).unwrap();
        fs::create_dir_all(docs.join("site")).unwrap();
        fs::write(docs.join("index.md"), "# Home\n").unwrap();
        fs::write(docs.join("guides/deploy.md"), "Intro\n\n# Deploying\n").unwrap();
        fs::write(docs.join("guides/notes.txt"), "not markdown").unwrap();
        fs::write(docs.join(".hidden/secret.md"), "# Hidden\n").unwrap();
        fs::write(docs.join("site/old.md"), "# Old output\n").unwrap();

        let mut warnings = Vec::new();
        let pages = collect_authored(&docs, &docs.join("site"), &mut warnings).unwrap();
        let paths: Vec<_> = pages.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["guides/deploy.md", "index.md"]);
        assert_eq!(pages[0].title.as_deref(), Some("Deploying"));
        assert_eq!(pages[1].title.as_deref(), Some("Home"));
        assert!(pages.iter().all(|p| !p.generated));
        assert!(warnings.is_empty());
    }

    #[test]
    fn missing_docs_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let mut warnings = Vec::new();
        let pages =
            collect_authored(&tmp.path().join("docs"), &tmp.path().join("site"), &mut warnings)
                .unwrap();
        assert!(pages.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn docs_symlink_loop_is_skipped_with_warning() {
        let tmp = TempDir::new().unwrap();
        let docs = tmp.path().join("docs");
        fs::create_dir_all(docs.join("guides")).unwrap();
        fs::write(docs.join("guides/deploy.md"), "# Deploying\n").unwrap();
        std::os::unix::fs::symlink(&docs, docs.join("guides/back")).unwrap();

        let mut warnings = Vec::new();
        let pages = collect_authored(&docs, &tmp.path().join("site"), &mut warnings).unwrap();

        let paths: Vec<_> = pages.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["guides/deploy.md"]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("guides/back"));
    }

    #[test]
    fn repo_dir_is_project_relative() {
        assert_eq!(repo_dir(Path::new("/p/k8s/base"), Path::new("/p"), "base"), "k8s/base");
        assert_eq!(repo_dir(Path::new("/p"), Path::new("/p"), ""), ".");
        assert_eq!(repo_dir(Path::new("/elsewhere/base"), Path::new("/p"), "base"), "base");
    }
}
