//! The render pipeline for one bundle: build, merge, parse.

use std::path::PathBuf;

use tracing::{debug, instrument};

use kustdoc_shared::{Record, Result};

use crate::build::BuildTool;
use crate::document::{self, ParseSkip};
use crate::overlay::{self, OverrideSpec};

/// One unit of render work, from a generated page or an authored directive.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Bundle directory handed to the build tool.
    pub bundle_path: PathBuf,
    /// Render a resource table instead of raw YAML.
    pub analyze: bool,
    /// Override merged into matching records.
    pub overrides: Option<OverrideSpec>,
}

/// Output of one [`RenderRequest`].
///
/// `final_text` and `records` describe the same content:
/// `document::parse(&final_text).records == records`.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderResult {
    /// The merged multi-document stream.
    pub final_text: String,
    /// The same stream, parsed.
    pub records: Vec<Record>,
    /// Documents from the build output that were dropped.
    pub skips: Vec<ParseSkip>,
}

/// Run the pipeline for `request`.
///
/// Only a build tool failure is an error; skipped documents and overrides
/// that match nothing are reported in the result.
#[instrument(skip_all, fields(bundle = %request.bundle_path.display(), analyze = request.analyze))]
pub fn render(tool: &dyn BuildTool, request: &RenderRequest) -> Result<RenderResult> {
    let raw = tool.build(&request.bundle_path)?;
    let parsed = document::parse(&raw);

    let records = match &request.overrides {
        Some(spec) => overlay::merge(parsed.records, spec),
        None => parsed.records,
    };
    let final_text = document::to_stream(&records);

    debug!(
        records = records.len(),
        skipped = parsed.skips.len(),
        "bundle rendered"
    );

    Ok(RenderResult {
        final_text,
        records,
        skips: parsed.skips,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::tests::FakeTool;

    const BUILD: &str = "\
apiVersion: v1
kind: Service
metadata:
  name: web
---
kind: Broken
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 2
";

    fn request(overrides: Option<&str>) -> RenderRequest {
        RenderRequest {
            bundle_path: PathBuf::from("/k/base"),
            analyze: true,
            overrides: overrides.map(|o| OverrideSpec::parse(o).unwrap()),
        }
    }

    #[test]
    fn final_text_roundtrips_to_records() {
        let tool = FakeTool::default().with("/k/base", BUILD);
        let result = render(&tool, &request(None)).unwrap();

        assert_eq!(result.records.len(), 2);
        assert_eq!(result.skips.len(), 1);
        assert_eq!(document::parse(&result.final_text).records, result.records);
        assert!(!result.final_text.contains("Broken"));
    }

    #[test]
    fn override_flows_into_final_text() {
        let tool = FakeTool::default().with("/k/base", BUILD);
        let result = render(
            &tool,
            &request(Some("kind: Deployment\nspec:\n  replicas: 5\n")),
        )
        .unwrap();

        assert!(result.final_text.contains("replicas: 5"));
        assert!(!result.final_text.contains("replicas: 2"));
        assert_eq!(document::parse(&result.final_text).records, result.records);
        assert_eq!(result.records[0].kind, "Service");
    }

    #[test]
    fn build_failure_is_an_error() {
        let tool = FakeTool::default().failing("/k/base", "Error: no kustomization\n");
        let err = render(&tool, &request(None)).unwrap_err();
        assert!(err.to_string().contains("Error: no kustomization"));
        assert_eq!(*tool.calls.lock().unwrap(), vec![PathBuf::from("/k/base")]);
    }

    #[test]
    fn empty_build_output_is_empty_result() {
        let tool = FakeTool::default().with("/k/base", "");
        let result = render(&tool, &request(None)).unwrap();
        assert!(result.records.is_empty());
        assert_eq!(result.final_text, "");
    }
}
