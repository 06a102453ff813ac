//! kustdoc CLI: documentation pages for Kustomize bundles.
//!
//! Discovers bundles, renders them through `kustomize build`, and writes a
//! Markdown site with navigation and a manifest.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
