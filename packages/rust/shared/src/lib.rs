//! Shared types, error model, and configuration for kustdoc.
//!
//! This crate is the foundation depended on by all other kustdoc crates.
//! It provides:
//! - [`KustdocError`]: the unified error type
//! - Domain types ([`Bundle`], [`Record`], [`NavNode`], [`SiteManifest`])
//! - Configuration ([`AppConfig`], [`BuildConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BuildConfig, CONFIG_FILE_NAME, KustomizeConfig, SiteConfig, init_config,
    load_config, load_config_from,
};
pub use error::{KustdocError, Result};
pub use types::{
    BlockFailure, Bundle, CURRENT_SCHEMA_VERSION, ManifestPage, NavNode, Record, SiteManifest,
};
