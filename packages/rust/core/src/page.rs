//! Directive expansion for whole pages.
//!
//! Each `kustomize` block on a page is resolved to a bundle directory, run
//! through the render pipeline, and replaced with either a resource table or
//! a YAML block. A block that cannot be rendered turns into a visible error
//! notice in place; the rest of the page is unaffected.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use kustdoc_markdown::{
    Directive, TABLE_STYLE, error_notice, expand_directives, fenced, page_slug, render_table,
    table_id,
};
use kustdoc_shared::{BlockFailure, KustdocError};

use crate::build::BuildTool;
use crate::overlay::OverrideSpec;
use crate::render::{RenderRequest, RenderResult, render};

/// Heading placed above every resource table.
pub const RESOURCES_HEADING: &str = "## Resources";

// ---------------------------------------------------------------------------
// Path resolution
// ---------------------------------------------------------------------------

/// Maps the path written in a directive to a bundle directory.
///
/// Lookup order: a discovered bundle's relative path, an existing absolute
/// directory, a directory under the project root, then a directory under
/// each configured search root.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    project_root: PathBuf,
    search_dirs: Vec<PathBuf>,
    discovered: HashMap<String, PathBuf>,
}

impl PathResolver {
    /// A resolver rooted at `project_root`.
    pub fn new(project_root: impl Into<PathBuf>, search_dirs: Vec<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            search_dirs,
            discovered: HashMap::new(),
        }
    }

    /// Register a discovered bundle under `key`.
    pub fn insert_discovered(&mut self, key: impl Into<String>, path: impl Into<PathBuf>) {
        self.discovered.insert(key.into(), path.into());
    }

    /// Resolve `raw`, or `None` when no candidate is a directory.
    pub fn resolve(&self, raw: &str) -> Option<PathBuf> {
        let trimmed = raw.trim();
        if let Some(path) = self.discovered.get(trimmed.trim_end_matches('/')) {
            return Some(path.clone());
        }

        let candidate = Path::new(trimmed);
        if candidate.is_absolute() {
            return candidate.is_dir().then(|| candidate.to_path_buf());
        }

        std::iter::once(&self.project_root)
            .chain(self.search_dirs.iter())
            .map(|root| root.join(candidate))
            .find(|path| path.is_dir())
    }
}

// ---------------------------------------------------------------------------
// Page rendering
// ---------------------------------------------------------------------------

/// A page after directive expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Page content with every directive replaced.
    pub content: String,
    /// Blocks that became error notices.
    pub failures: Vec<BlockFailure>,
    /// Number of directives expanded.
    pub blocks: usize,
}

/// Why a block could not be rendered: a one-line summary and the detail
/// shown verbatim beneath it.
#[derive(Debug)]
struct BlockError {
    summary: String,
    detail: String,
}

/// Expands the directives of one page at a time. Shared across render tasks.
pub struct PageRenderer {
    tool: Arc<dyn BuildTool>,
    resolver: PathResolver,
    enabled: bool,
}

impl PageRenderer {
    /// With `enabled` false, pages pass through untouched.
    pub fn new(tool: Arc<dyn BuildTool>, resolver: PathResolver, enabled: bool) -> Self {
        Self {
            tool,
            resolver,
            enabled,
        }
    }

    /// Expand every directive in `markdown`, which lives at `page_path`.
    #[instrument(skip_all, fields(page = %page_path))]
    pub fn render_page(&self, page_path: &str, markdown: &str) -> RenderedPage {
        if !self.enabled {
            return RenderedPage {
                content: markdown.to_string(),
                failures: Vec::new(),
                blocks: 0,
            };
        }

        let slug = page_slug(page_path);
        let mut failures = Vec::new();
        let mut blocks = 0;
        let mut tables = 0;

        let mut content = expand_directives(markdown, |ordinal, directive| {
            blocks += 1;
            match self.render_block(directive, &table_id(&slug, ordinal)) {
                Ok((markup, is_table)) => {
                    tables += usize::from(is_table);
                    markup
                }
                Err(e) => {
                    warn!(bundle = %directive.path, summary = %e.summary, "directive failed");
                    let message = match e.detail.trim_end() {
                        "" => e.summary.clone(),
                        detail => format!("{}: {detail}", e.summary),
                    };
                    failures.push(BlockFailure {
                        page: page_path.to_string(),
                        bundle: directive.path.clone(),
                        message,
                    });
                    error_notice(&e.summary, &e.detail)
                }
            }
        });

        if tables > 0 {
            if !content.ends_with('\n') {
                content.push('\n');
            }
            content.push('\n');
            content.push_str(TABLE_STYLE);
            content.push('\n');
        }

        debug!(blocks, tables, failures = failures.len(), "page expanded");
        RenderedPage {
            content,
            failures,
            blocks,
        }
    }

    /// Render one directive; the flag says whether the markup is a table.
    fn render_block(
        &self,
        directive: &Directive,
        table_id: &str,
    ) -> std::result::Result<(String, bool), BlockError> {
        let bundle_path = self.resolver.resolve(&directive.path).ok_or_else(|| BlockError {
            summary: format!("bundle directory '{}' not found", directive.path),
            detail: String::new(),
        })?;

        let overrides = if directive.body.is_empty() {
            None
        } else {
            Some(OverrideSpec::parse(&directive.body).map_err(|e| BlockError {
                summary: format!("invalid override for '{}'", directive.path),
                detail: e.to_string(),
            })?)
        };

        let request = RenderRequest {
            bundle_path,
            analyze: directive.options.analyze,
            overrides,
        };

        let result = render(self.tool.as_ref(), &request).map_err(|e| match e {
            KustdocError::BuildTool { diagnostic, .. } => BlockError {
                summary: format!("kustomize build failed for '{}'", directive.path),
                detail: diagnostic,
            },
            other => BlockError {
                summary: format!("could not render '{}'", directive.path),
                detail: other.to_string(),
            },
        })?;

        for skip in &result.skips {
            warn!(bundle = %directive.path, index = skip.index, reason = %skip.reason, "skipped document in build output");
        }

        Ok((block_markup(&result, request.analyze, table_id), request.analyze))
    }
}

/// Markup for a rendered block: a headed resource table, or the final YAML.
pub fn block_markup(result: &RenderResult, analyze: bool, table_id: &str) -> String {
    if analyze {
        format!(
            "{RESOURCES_HEADING}\n\n{}",
            render_table(&result.records, table_id)
        )
    } else {
        fenced("yaml", &result.final_text)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::build::tests::FakeTool;

    const BUILD: &str = "apiVersion: v1\nkind: Service\nmetadata:\n  name: web\n";

    fn fixture() -> (TempDir, PathResolver) {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("apps/web")).unwrap();
        std::fs::create_dir_all(tmp.path().join("extra/db")).unwrap();
        let resolver = PathResolver::new(tmp.path(), vec![tmp.path().join("extra")]);
        (tmp, resolver)
    }

    fn renderer(tool: FakeTool, resolver: PathResolver) -> PageRenderer {
        PageRenderer::new(Arc::new(tool), resolver, true)
    }

    #[test]
    fn resolver_lookup_order() {
        let (tmp, mut resolver) = fixture();
        resolver.insert_discovered("base", "/discovered/base");

        assert_eq!(resolver.resolve("base"), Some(PathBuf::from("/discovered/base")));
        assert_eq!(resolver.resolve("base/"), Some(PathBuf::from("/discovered/base")));
        assert_eq!(resolver.resolve("apps/web"), Some(tmp.path().join("apps/web")));
        assert_eq!(resolver.resolve("db"), Some(tmp.path().join("extra/db")));

        let absolute = tmp.path().join("apps");
        assert_eq!(resolver.resolve(absolute.to_str().unwrap()), Some(absolute));
        assert_eq!(resolver.resolve("nope"), None);
        assert_eq!(resolver.resolve("/definitely/not/here"), None);
    }

    #[test]
    fn analyze_block_becomes_headed_table_with_style() {
        let (tmp, resolver) = fixture();
        let tool = FakeTool::default().with(tmp.path().join("apps/web"), BUILD);
        let page = renderer(tool, resolver).render_page(
            "guides/web.md",
            "# Web\n\n```kustomize apps/web [analyze=true]\n```\n\nAfter.\n",
        );

        assert!(page.failures.is_empty());
        assert_eq!(page.blocks, 1);
        assert!(page.content.starts_with("# Web\n\n## Resources\n\n<div class=\"kustdoc-resources\" id=\"kd-guides-web-1\">"));
        assert!(page.content.contains("After.\n"));
        assert_eq!(page.content.matches("<style>").count(), 1);
        assert!(page.content.trim_end().ends_with("</style>"));
    }

    #[test]
    fn plain_block_becomes_yaml_fence() {
        let (tmp, resolver) = fixture();
        let tool = FakeTool::default().with(tmp.path().join("apps/web"), BUILD);
        let page = renderer(tool, resolver)
            .render_page("p.md", "```kustomize apps/web\nkind: Service\nmetadata:\n  name: web\nspec:\n  type: NodePort\n```\n");

        assert!(page.content.starts_with("```yaml\n"));
        assert!(page.content.contains("type: NodePort"));
        assert!(!page.content.contains("<style>"));
    }

    #[test]
    fn failures_render_in_place_and_page_continues() {
        let (tmp, resolver) = fixture();
        let tool = FakeTool::default()
            .failing(tmp.path().join("apps/web"), "Error: accumulating resources\n")
            .with(tmp.path().join("extra/db"), BUILD);
        let md = "A\n```kustomize apps/web [analyze]\n```\nB\n```kustomize missing\n```\nC\n```kustomize db [analyze]\n```\n";
        let page = renderer(tool, resolver).render_page("ops.md", md);

        assert_eq!(page.blocks, 3);
        assert_eq!(page.failures.len(), 2);
        assert_eq!(page.failures[0].bundle, "apps/web");
        assert!(page.failures[0].message.contains("Error: accumulating resources"));
        assert_eq!(page.failures[1].bundle, "missing");
        assert_eq!(page.failures[1].message, "bundle directory 'missing' not found");

        assert!(page.content.contains("> **kustomize error:** kustomize build failed for 'apps/web'"));
        assert!(page.content.contains("Error: accumulating resources\n"));
        assert!(page.content.contains("> **kustomize error:** bundle directory 'missing' not found"));
        // the third block keeps its position-based id
        assert!(page.content.contains("id=\"kd-ops-3\""));
    }

    #[test]
    fn bad_override_is_a_block_failure() {
        let (_tmp, resolver) = fixture();
        let page = renderer(FakeTool::default(), resolver)
            .render_page("p.md", "```kustomize apps/web\nmetadata:\n  name: x\n```\n");
        assert_eq!(page.failures.len(), 1);
        assert!(page.content.contains("invalid override for 'apps/web'"));
    }

    #[test]
    fn disabled_rendering_passes_through() {
        let (_tmp, resolver) = fixture();
        let md = "```kustomize apps/web [analyze]\n```\n";
        let tool = FakeTool::default();
        let page = PageRenderer::new(Arc::new(tool), resolver, false).render_page("p.md", md);
        assert_eq!(page.content, md);
        assert_eq!(page.blocks, 0);
    }
}
