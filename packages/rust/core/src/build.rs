//! The external `kustomize` invocation.
//!
//! A build is one blocking call with no retry. Whatever the tool prints to
//! stderr on failure is carried through verbatim in
//! [`KustdocError::BuildTool`].

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, instrument};

use kustdoc_shared::{KustdocError, Result};

/// Produces the raw multi-document YAML for a bundle directory.
pub trait BuildTool: Send + Sync {
    /// Build the bundle at `dir`.
    fn build(&self, dir: &Path) -> Result<String>;
}

/// The real `kustomize` executable.
#[derive(Debug, Clone)]
pub struct Kustomize {
    executable: PathBuf,
}

impl Kustomize {
    /// Use `executable`; a bare name is looked up on `PATH`.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// The configured executable.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Run `kustomize version` and return its output, trimmed.
    pub fn probe(&self) -> Result<String> {
        let mut command = Command::new(&self.executable);
        command.arg("version");
        run(&self.executable, &self.executable, command).map(|out| out.trim().to_string())
    }
}

impl BuildTool for Kustomize {
    #[instrument(skip_all, fields(dir = %dir.display()))]
    fn build(&self, dir: &Path) -> Result<String> {
        let mut command = Command::new(&self.executable);
        command.arg("build").arg(dir);
        let stdout = run(&self.executable, dir, command)?;
        debug!(bytes = stdout.len(), "kustomize build finished");
        Ok(stdout)
    }
}

/// Run `command` to completion and return its stdout.
///
/// `subject` names what the error is about (the bundle directory for builds).
fn run(executable: &Path, subject: &Path, mut command: Command) -> Result<String> {
    let output = command.output().map_err(|e| {
        KustdocError::build_tool(
            subject,
            format!("failed to run {}: {e}", executable.display()),
        )
    })?;
    collect(executable, subject, output)
}

fn collect(executable: &Path, subject: &Path, output: Output) -> Result<String> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let diagnostic = if stderr.trim().is_empty() {
            format!("{} exited with {}", executable.display(), output.status)
        } else {
            stderr
        };
        return Err(KustdocError::build_tool(subject, diagnostic));
    }

    String::from_utf8(output.stdout).map_err(|e| {
        KustdocError::build_tool(
            subject,
            format!("{} printed invalid UTF-8: {e}", executable.display()),
        )
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory build tool keyed by directory.
    #[derive(Default)]
    pub(crate) struct FakeTool {
        outputs: HashMap<PathBuf, std::result::Result<String, String>>,
        pub(crate) calls: Mutex<Vec<PathBuf>>,
    }

    impl FakeTool {
        pub(crate) fn with(mut self, dir: impl Into<PathBuf>, yaml: &str) -> Self {
            self.outputs.insert(dir.into(), Ok(yaml.to_string()));
            self
        }

        pub(crate) fn failing(mut self, dir: impl Into<PathBuf>, stderr: &str) -> Self {
            self.outputs.insert(dir.into(), Err(stderr.to_string()));
            self
        }
    }

    impl BuildTool for FakeTool {
        fn build(&self, dir: &Path) -> Result<String> {
            self.calls.lock().unwrap().push(dir.to_path_buf());
            match self.outputs.get(dir) {
                Some(Ok(yaml)) => Ok(yaml.clone()),
                Some(Err(stderr)) => Err(KustdocError::build_tool(dir, stderr.clone())),
                None => Err(KustdocError::build_tool(dir, "no such bundle")),
            }
        }
    }

    #[cfg(unix)]
    fn sh(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[cfg(unix)]
    #[test]
    fn stdout_is_returned_on_success() {
        let out = run(Path::new("sh"), Path::new("base"), sh("printf 'kind: A\\n'")).unwrap();
        assert_eq!(out, "kind: A\n");
    }

    #[cfg(unix)]
    #[test]
    fn stderr_is_kept_verbatim_on_failure() {
        let err = run(
            Path::new("kustomize"),
            Path::new("overlays/prod"),
            sh("printf 'Error: missing resource\\n  at deploy.yaml\\n' >&2; exit 3"),
        )
        .unwrap_err();
        match err {
            KustdocError::BuildTool { path, diagnostic } => {
                assert_eq!(path, PathBuf::from("overlays/prod"));
                assert_eq!(diagnostic, "Error: missing resource\n  at deploy.yaml\n");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn silent_failure_reports_exit_status() {
        let err = run(Path::new("kustomize"), Path::new("base"), sh("exit 2")).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("kustomize exited with"), "{text}");
    }

    #[test]
    fn missing_executable_names_it() {
        let tool = Kustomize::new("/nonexistent/bin/kustomize-kustdoc-test");
        let err = tool.build(Path::new("base")).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("failed to run /nonexistent/bin/kustomize-kustdoc-test"), "{text}");

        assert!(tool.probe().is_err());
    }

    #[test]
    fn fake_tool_records_calls() {
        let tool = FakeTool::default()
            .with("base", "kind: A\n")
            .failing("broken", "boom\n");
        assert_eq!(tool.build(Path::new("base")).unwrap(), "kind: A\n");
        assert!(tool.build(Path::new("broken")).is_err());
        assert_eq!(tool.calls.lock().unwrap().len(), 2);
    }
}
