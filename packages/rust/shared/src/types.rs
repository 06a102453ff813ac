//! Core domain types for kustdoc builds.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version for the site manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// A directory recognized as a Kustomize bundle by its marker file.
///
/// Created by discovery and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bundle {
    /// Directory on disk.
    pub path: PathBuf,
    /// Path relative to the discovery root, `/`-separated (empty for the root).
    pub rel_path: String,
    /// Display title derived from the directory name(s).
    pub title: String,
    /// Contents of the co-located `README.md`, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// First H1 of the description, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    /// Nested bundles, ascending by directory name.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Bundle>,
}

impl Bundle {
    /// Visit this bundle and all descendants in pre-order.
    pub fn walk(&self) -> Vec<&Bundle> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(bundle) = stack.pop() {
            out.push(bundle);
            stack.extend(bundle.children.iter().rev());
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One resource document parsed out of a multi-document YAML stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// `apiVersion`, empty when the document has none.
    pub api_version: String,
    /// `kind`.
    pub kind: String,
    /// `metadata.name`.
    pub name: String,
    /// `metadata.namespace`: `None` when the field is absent, `Some("")` when empty.
    pub namespace: Option<String>,
    /// Source text of the document, one trailing newline.
    pub raw_text: String,
    /// Position in the accepted record sequence.
    pub ordinal: usize,
    /// Structured content.
    pub body: serde_yaml::Value,
}

impl Record {
    /// Split `apiVersion` into `(group, version)`; core types have an empty group.
    pub fn group_version(&self) -> (&str, &str) {
        match self.api_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", self.api_version.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// NavNode
// ---------------------------------------------------------------------------

/// A single entry in the site navigation (`nav.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NavNode {
    /// Display title.
    pub title: String,
    /// Page path within the site (e.g., `kustomize/base/index.md`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    /// Nested child entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavNode>,
}

impl NavNode {
    /// Create a leaf entry pointing at a page.
    pub fn page(title: impl Into<String>, page: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            page: Some(page.into()),
            children: Vec::new(),
        }
    }

    /// Depth of the subtree rooted here (a leaf has depth 1).
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            max = max.max(depth);
            stack.extend(node.children.iter().map(|c| (c, depth + 1)));
        }
        max
    }
}

// ---------------------------------------------------------------------------
// SiteManifest
// ---------------------------------------------------------------------------

/// The `manifest.json` structure written at the root of the output directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Tool version that produced the output.
    pub tool_version: String,
    /// When the build finished.
    pub generated_at: DateTime<Utc>,
    /// Total number of pages written.
    pub page_count: usize,
    /// Every page written, in output order.
    pub pages: Vec<ManifestPage>,
    /// Directive blocks that rendered as an error notice.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<BlockFailure>,
    /// Discovery warnings collected during the build.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// One page entry in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestPage {
    /// Page path within the site.
    pub path: String,
    /// Page title, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// SHA-256 of the written content.
    pub sha256: String,
    /// Whether the page was generated from a discovered bundle.
    pub generated: bool,
}

/// A directive block that could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockFailure {
    /// Page containing the block.
    pub page: String,
    /// Bundle path as written in the directive.
    pub bundle: String,
    /// Error text shown in the page.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(rel: &str, children: Vec<Bundle>) -> Bundle {
        Bundle {
            path: PathBuf::from("/k").join(rel),
            rel_path: rel.into(),
            title: rel.into(),
            description: None,
            heading: None,
            children,
        }
    }

    #[test]
    fn bundle_walk_is_preorder() {
        let tree = bundle(
            "a",
            vec![bundle("a/b", vec![bundle("a/b/c", vec![])]), bundle("a/d", vec![])],
        );
        let order: Vec<_> = tree.walk().iter().map(|b| b.rel_path.as_str()).collect();
        assert_eq!(order, vec!["a", "a/b", "a/b/c", "a/d"]);
    }

    #[test]
    fn group_version_splits_api_version() {
        let mut record = Record {
            api_version: "apps/v1".into(),
            kind: "Deployment".into(),
            name: "web".into(),
            namespace: None,
            raw_text: String::new(),
            ordinal: 0,
            body: serde_yaml::Value::Null,
        };
        assert_eq!(record.group_version(), ("apps", "v1"));

        record.api_version = "v1".into();
        assert_eq!(record.group_version(), ("", "v1"));
    }

    #[test]
    fn nav_node_serialization() {
        let nav = NavNode {
            title: "Kustomize".into(),
            page: Some("kustomize/index.md".into()),
            children: vec![NavNode::page("Base", "kustomize/base/index.md")],
        };

        let json = serde_json::to_string(&nav).expect("serialize");
        let parsed: NavNode = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, nav);
        assert_eq!(parsed.depth(), 2);
    }

    #[test]
    fn manifest_serialization() {
        let manifest = SiteManifest {
            schema_version: CURRENT_SCHEMA_VERSION,
            tool_version: "0.1.0".into(),
            generated_at: Utc::now(),
            page_count: 1,
            pages: vec![ManifestPage {
                path: "index.md".into(),
                title: Some("Home".into()),
                sha256: "abc".into(),
                generated: false,
            }],
            failures: vec![],
            warnings: vec![],
        };

        let json = serde_json::to_string_pretty(&manifest).expect("serialize");
        assert!(!json.contains("failures"));
        let parsed: SiteManifest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(parsed.pages[0].path, "index.md");
    }
}
