//! Rendering and site assembly for kustdoc.
//!
//! This crate ties together discovery, the `kustomize` render pipeline
//! (build → override merge → parse), directive expansion, and output
//! writing into one `build_site` workflow.

pub mod build;
pub mod document;
pub mod generate;
pub mod nav;
pub mod overlay;
pub mod page;
pub mod render;
pub mod site;

pub use build::{BuildTool, Kustomize};
pub use document::{ParseSkip, Parsed};
pub use overlay::OverrideSpec;
pub use render::{RenderRequest, RenderResult};
pub use site::{BuildReport, ProgressReporter, SilentProgress, build_site};
