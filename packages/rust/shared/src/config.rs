//! Build configuration for kustdoc.
//!
//! The project config lives in `kustdoc.toml`, by default in the current
//! directory. Relative paths in it resolve against the file's directory.
//! Unknown keys are rejected so typos fail the build instead of being ignored.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{KustdocError, Result};
use crate::types::NavNode;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "kustdoc.toml";

// ---------------------------------------------------------------------------
// Config structs (matching kustdoc.toml schema)
// ---------------------------------------------------------------------------

/// Top-level project config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Input/output layout.
    #[serde(default)]
    pub site: SiteConfig,

    /// Rendering and discovery settings.
    #[serde(default)]
    pub kustomize: KustomizeConfig,

    /// Pre-existing navigation entries; the generated section is appended.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nav: Vec<NavNode>,
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Directory of authored Markdown pages.
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,

    /// Output directory.
    #[serde(default = "default_site_dir")]
    pub site_dir: PathBuf,

    /// Page path prefix for generated bundle pages.
    #[serde(default = "default_section")]
    pub section: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            docs_dir: default_docs_dir(),
            site_dir: default_site_dir(),
            section: default_section(),
        }
    }
}

fn default_docs_dir() -> PathBuf {
    "docs".into()
}
fn default_site_dir() -> PathBuf {
    "site".into()
}
fn default_section() -> String {
    "kustomize".into()
}

/// `[kustomize]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KustomizeConfig {
    /// Executable to run. A bare name is resolved via `PATH`.
    #[serde(default = "default_kustomize_path")]
    pub kustomize_path: String,

    /// Extra base directories searched when a directive path is relative.
    #[serde(default)]
    pub kustomize_dirs: Vec<PathBuf>,

    /// When false, directives pass through unrendered.
    #[serde(default = "default_true")]
    pub enable_rendering: bool,

    /// Root directory for bundle discovery. Absent disables discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_nav_path: Option<PathBuf>,

    /// Label of the generated navigation section.
    #[serde(default = "default_nav_title")]
    pub nav_title: String,

    /// Repository URL used in the generated usage snippets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<Url>,

    /// Maximum pages rendered at once.
    #[serde(default = "default_render_concurrency")]
    pub render_concurrency: usize,
}

impl Default for KustomizeConfig {
    fn default() -> Self {
        Self {
            kustomize_path: default_kustomize_path(),
            kustomize_dirs: Vec::new(),
            enable_rendering: true,
            auto_nav_path: None,
            nav_title: default_nav_title(),
            repo_url: None,
            render_concurrency: default_render_concurrency(),
        }
    }
}

fn default_kustomize_path() -> String {
    "kustomize".into()
}
fn default_true() -> bool {
    true
}
fn default_nav_title() -> String {
    "Kustomize".into()
}
fn default_render_concurrency() -> usize {
    4
}

impl AppConfig {
    /// Check values that do not depend on the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.kustomize.nav_title.trim().is_empty() {
            return Err(KustdocError::config("kustomize.nav_title must not be empty"));
        }
        if self.kustomize.kustomize_path.trim().is_empty() {
            return Err(KustdocError::config(
                "kustomize.kustomize_path must not be empty",
            ));
        }
        if self.kustomize.render_concurrency == 0 {
            return Err(KustdocError::config(
                "kustomize.render_concurrency must be at least 1",
            ));
        }
        let section = self.site.section.trim_matches('/');
        if section.is_empty() || section.contains("..") {
            return Err(KustdocError::config(format!(
                "site.section '{}' is not a usable page prefix",
                self.site.section
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Build config (runtime, paths resolved against the project root)
// ---------------------------------------------------------------------------

/// Runtime build configuration with every path resolved.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory the config file lives in.
    pub project_root: PathBuf,
    /// Authored pages.
    pub docs_dir: PathBuf,
    /// Output directory.
    pub site_dir: PathBuf,
    /// Page path prefix for generated pages (no leading/trailing `/`).
    pub section: String,
    /// Build tool executable.
    pub kustomize_path: PathBuf,
    /// Extra directive lookup bases.
    pub kustomize_dirs: Vec<PathBuf>,
    /// Whether directives are rendered at all.
    pub enable_rendering: bool,
    /// Discovery root, if discovery is enabled.
    pub auto_nav_path: Option<PathBuf>,
    /// Label of the generated navigation section.
    pub nav_title: String,
    /// Repository URL for usage snippets.
    pub repo_url: Option<Url>,
    /// Maximum pages rendered at once.
    pub render_concurrency: usize,
    /// Navigation entries owned by the user.
    pub nav: Vec<NavNode>,
}

impl BuildConfig {
    /// Validate `config` and resolve its paths against `project_root`.
    pub fn resolve(config: &AppConfig, project_root: &Path) -> Result<Self> {
        config.validate()?;

        let join = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                project_root.join(p)
            }
        };

        let auto_nav_path = config.kustomize.auto_nav_path.as_deref().map(join);
        if let Some(path) = &auto_nav_path {
            if !path.is_dir() {
                return Err(KustdocError::config(format!(
                    "kustomize.auto_nav_path {} is not a directory",
                    path.display()
                )));
            }
        }

        Ok(Self {
            project_root: project_root.to_path_buf(),
            docs_dir: join(&config.site.docs_dir),
            site_dir: join(&config.site.site_dir),
            section: config.site.section.trim_matches('/').to_string(),
            kustomize_path: resolve_executable(&config.kustomize.kustomize_path, project_root),
            kustomize_dirs: config.kustomize.kustomize_dirs.iter().map(|p| join(p)).collect(),
            enable_rendering: config.kustomize.enable_rendering,
            auto_nav_path,
            nav_title: config.kustomize.nav_title.clone(),
            repo_url: config.kustomize.repo_url.clone(),
            render_concurrency: config.kustomize.render_concurrency,
            nav: config.nav.clone(),
        })
    }
}

/// A bare program name stays as-is for `PATH` lookup; anything with a
/// separator is treated as a path relative to the project root.
fn resolve_executable(value: &str, project_root: &Path) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() || path.components().count() <= 1 {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the project config.
///
/// With an explicit path the file must exist. Without one, `kustdoc.toml` in
/// the current directory is used when present, else defaults. Returns the
/// config together with the directory relative paths resolve against.
pub fn load_config(explicit: Option<&Path>) -> Result<(AppConfig, PathBuf)> {
    if let Some(path) = explicit {
        let config = load_config_from(path)?;
        return Ok((config, parent_dir(path)));
    }

    let cwd = std::env::current_dir().map_err(|e| KustdocError::io(".", e))?;
    let path = cwd.join(CONFIG_FILE_NAME);

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok((AppConfig::default(), cwd));
    }

    let config = load_config_from(&path)?;
    Ok((config, cwd))
}

/// Load the project config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| KustdocError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| KustdocError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file into `dir`. Refuses to overwrite.
/// Returns the path to the created file.
pub fn init_config(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| KustdocError::io(dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(KustdocError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| KustdocError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| KustdocError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
