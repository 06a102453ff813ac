//! Error types for kustdoc.
//!
//! Library crates use [`KustdocError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all kustdoc operations.
#[derive(Debug, thiserror::Error)]
pub enum KustdocError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// YAML or directive parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The external build tool exited non-zero or could not be started.
    ///
    /// `diagnostic` is the tool's stderr, kept verbatim.
    #[error("kustomize build failed for {path:?}: {diagnostic}")]
    BuildTool { path: PathBuf, diagnostic: String },

    /// Bundle discovery could not start (missing or non-directory root).
    #[error("discovery error: {0}")]
    Discovery(String),

    /// A page render task died before producing output.
    #[error("render error: {0}")]
    Render(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad override, invalid manifest, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, KustdocError>;

impl KustdocError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a build tool error carrying the tool's diagnostic output.
    pub fn build_tool(path: impl Into<PathBuf>, diagnostic: impl Into<String>) -> Self {
        Self::BuildTool {
            path: path.into(),
            diagnostic: diagnostic.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = KustdocError::config("nav_title must not be empty");
        assert_eq!(err.to_string(), "config error: nav_title must not be empty");

        let err = KustdocError::validation("override has no kind");
        assert!(err.to_string().contains("override has no kind"));
    }

    #[test]
    fn build_tool_error_keeps_diagnostic_verbatim() {
        let diagnostic = "Error: accumulating resources:\n  missing file 'deploy.yaml'\n";
        let err = KustdocError::build_tool("overlays/prod", diagnostic);
        match &err {
            KustdocError::BuildTool { diagnostic: d, .. } => assert_eq!(d, diagnostic),
            other => panic!("unexpected variant: {other:?}"),
        }
        assert!(err.to_string().contains("missing file 'deploy.yaml'"));
    }
}
