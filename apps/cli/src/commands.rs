//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use kustdoc_core::page::block_markup;
use kustdoc_core::{
    BuildReport, Kustomize, OverrideSpec, ProgressReporter, RenderRequest, build_site, nav,
    render::render,
};
use kustdoc_discovery::discover;
use kustdoc_markdown::{TABLE_STYLE, table_id};
use kustdoc_shared::{AppConfig, Bundle, BuildConfig, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// kustdoc: documentation pages for Kustomize bundles.
#[derive(Parser)]
#[command(
    name = "kustdoc",
    version,
    about = "Generate documentation pages and navigation for Kustomize bundles.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Path to kustdoc.toml (defaults to ./kustdoc.toml when present).
    #[arg(short, long, env = "KUSTDOC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the documentation site.
    Build {
        /// Leave `kustomize` directives unrendered.
        #[arg(long)]
        no_render: bool,

        /// Override the number of pages rendered at once.
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Print the bundle tree found under a directory.
    Discover {
        /// Directory to scan (defaults to `kustomize.auto_nav_path`).
        path: Option<PathBuf>,

        /// Print the generated navigation as JSON instead.
        #[arg(long)]
        json: bool,
    },

    /// Render one bundle to stdout.
    Render {
        /// Bundle directory.
        path: PathBuf,

        /// Emit the resource table instead of YAML.
        #[arg(long)]
        analyze: bool,

        /// YAML file with an override document to merge.
        #[arg(long = "override", value_name = "FILE")]
        override_file: Option<PathBuf>,
    },

    /// Validate the config and check that kustomize can be run.
    Check,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a kustdoc.toml with defaults into the current directory.
    Init,
    /// Show the loaded configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "kustdoc=info",
        1 => "kustdoc=debug",
        _ => "kustdoc=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Build {
            no_render,
            concurrency,
        } => cmd_build(config_path, no_render, concurrency).await,
        Command::Discover { path, json } => cmd_discover(config_path, path.as_deref(), json),
        Command::Render {
            path,
            analyze,
            override_file,
        } => cmd_render(config_path, &path, analyze, override_file.as_deref()),
        Command::Check => cmd_check(config_path),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

/// Load and resolve the project config.
fn resolve_config(config_path: Option<&Path>) -> Result<BuildConfig> {
    let (app, project_root) = load_config(config_path)?;
    Ok(BuildConfig::resolve(&app, &project_root)?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(
    config_path: Option<&Path>,
    no_render: bool,
    concurrency: Option<usize>,
) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if no_render {
        config.enable_rendering = false;
    }
    if let Some(n) = concurrency {
        if n == 0 {
            return Err(eyre!("--concurrency must be at least 1"));
        }
        config.render_concurrency = n;
    }

    let kustomize = Kustomize::new(&config.kustomize_path);
    if config.enable_rendering {
        match kustomize.probe() {
            Ok(version) => info!(%version, "kustomize found"),
            Err(e) => warn!(error = %e, "kustomize is not usable, directives will render as errors"),
        }
    }

    info!(
        site_dir = %config.site_dir.display(),
        rendering = config.enable_rendering,
        "building site"
    );

    let reporter = CliProgress::new();
    let report = build_site(&config, Arc::new(kustomize), &reporter).await?;

    println!();
    println!("  Site built.");
    println!("  Pages:    {} ({} generated)", report.page_count, report.generated_count);
    println!("  Bundles:  {}", report.bundle_count);
    println!("  Failures: {}", report.failures.len());
    println!("  Warnings: {}", report.warnings.len());
    println!("  Path:     {}", report.site_dir.display());
    println!("  Time:     {:.1}s", report.elapsed.as_secs_f64());
    println!();

    for failure in &report.failures {
        println!("  ! {} [{}]: {}", failure.page, failure.bundle, failure.message);
    }

    Ok(())
}

fn cmd_discover(config_path: Option<&Path>, path: Option<&Path>, json: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    let root = match path {
        Some(p) => p.to_path_buf(),
        None => config
            .auto_nav_path
            .clone()
            .ok_or_else(|| eyre!("no path given and kustomize.auto_nav_path is not set"))?,
    };

    let discovery = discover(&root)?;

    if json {
        let tree = nav::build_nav(&discovery.bundles, &config.nav_title, &config.section);
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        println!("{} ({} bundles)", root.display(), discovery.bundle_count());
        for bundle in &discovery.bundles {
            print_bundle(bundle, 1);
        }
    }

    for warning in &discovery.warnings {
        warn!(%warning, "discovery warning");
    }
    Ok(())
}

fn print_bundle(bundle: &Bundle, depth: usize) {
    let rel = if bundle.rel_path.is_empty() { "." } else { &bundle.rel_path };
    println!("{}{} ({rel})", "  ".repeat(depth), bundle.title);
    for child in &bundle.children {
        print_bundle(child, depth + 1);
    }
}

fn cmd_render(
    config_path: Option<&Path>,
    path: &Path,
    analyze: bool,
    override_file: Option<&Path>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let overrides = match override_file {
        Some(file) => {
            let text = std::fs::read_to_string(file)
                .map_err(|e| eyre!("cannot read override file {}: {e}", file.display()))?;
            Some(OverrideSpec::parse(&text)?)
        }
        None => None,
    };

    let request = RenderRequest {
        bundle_path: path.to_path_buf(),
        analyze,
        overrides,
    };
    let tool = Kustomize::new(&config.kustomize_path);
    let result = render(&tool, &request)?;

    for skip in &result.skips {
        warn!(index = skip.index, reason = %skip.reason, "skipped document in build output");
    }

    if analyze {
        print!("{}", block_markup(&result, true, &table_id("render", 0)));
        println!("{TABLE_STYLE}");
    } else {
        print!("{}", result.final_text);
    }
    Ok(())
}

fn cmd_check(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    println!("  Config:    ok");
    println!("  Docs:      {}", config.docs_dir.display());
    println!("  Site:      {}", config.site_dir.display());
    match &config.auto_nav_path {
        Some(p) => println!("  Discovery: {}", p.display()),
        None => println!("  Discovery: off"),
    }

    let kustomize = Kustomize::new(&config.kustomize_path);
    match kustomize.probe() {
        Ok(version) => {
            println!("  Kustomize: {version}");
            Ok(())
        }
        Err(e) if config.enable_rendering => Err(eyre!(
            "kustomize at '{}' is not usable: {e}",
            kustomize.executable().display()
        )),
        Err(e) => {
            println!("  Kustomize: not usable ({e}); rendering is disabled");
            Ok(())
        }
    }
}

fn cmd_config_init() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let path = init_config(&cwd)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let (config, _): (AppConfig, PathBuf) = load_config(config_path)?;
    config.validate()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_rendered(&self, path: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Rendering [{current}/{total}] {path}"));
    }

    fn done(&self, _report: &BuildReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_build_flags() {
        let cli = Cli::try_parse_from(["kustdoc", "-vv", "build", "--no-render", "--concurrency", "2"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Build {
                no_render,
                concurrency,
            } => {
                assert!(no_render);
                assert_eq!(concurrency, Some(2));
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn parses_render_with_override() {
        let cli = Cli::try_parse_from([
            "kustdoc",
            "render",
            "overlays/prod",
            "--analyze",
            "--override",
            "patch.yaml",
        ])
        .unwrap();
        match cli.command {
            Command::Render {
                path,
                analyze,
                override_file,
            } => {
                assert_eq!(path, PathBuf::from("overlays/prod"));
                assert!(analyze);
                assert_eq!(override_file, Some(PathBuf::from("patch.yaml")));
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["kustdoc", "check", "--config", "ci/kustdoc.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("ci/kustdoc.toml")));
    }
}
