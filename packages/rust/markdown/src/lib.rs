//! Markdown page building blocks.
//!
//! Finds `kustomize` directives in pages, renders resource tables, and
//! provides the small pieces generated pages are composed from: YAML blocks,
//! inline error notices and frontmatter.

pub mod directive;
pub mod table;

pub use directive::{
    DIRECTIVE_KEYWORD, Directive, DirectiveOptions, expand_directives, find_directives,
};
pub use table::{TABLE_STYLE, render_table, table_id};

// ---------------------------------------------------------------------------
// Page identity
// ---------------------------------------------------------------------------

/// Turn a page path into an id-safe slug.
///
/// `kustomize/overlays/Staging_EU/index.md` becomes
/// `kustomize-overlays-staging-eu-index`.
pub fn page_slug(page_path: &str) -> String {
    let cleaned = page_path
        .trim_start_matches('/')
        .trim_end_matches('/')
        .trim_end_matches(".md");

    if cleaned.is_empty() {
        return "index".to_string();
    }

    let mut slug = String::with_capacity(cleaned.len());
    for c in cleaned.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

// ---------------------------------------------------------------------------
// Page pieces
// ---------------------------------------------------------------------------

/// Wrap text in a fenced block, lengthening the fence past any backtick run.
pub fn fenced(lang: &str, text: &str) -> String {
    let longest = text
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest.max(2) + 1);
    let body = text.trim_end_matches('\n');
    format!("{fence}{lang}\n{body}\n{fence}\n")
}

/// A visible error block that stands in for a directive that failed.
///
/// `detail` is shown verbatim (it is typically the build tool's stderr).
pub fn error_notice(summary: &str, detail: &str) -> String {
    let mut out = format!("> **kustomize error:** {summary}\n");
    if !detail.trim().is_empty() {
        out.push('\n');
        out.push_str(&fenced("text", detail));
    }
    out
}

/// Build a YAML frontmatter block.
pub fn frontmatter(title: &str, source: Option<&str>) -> String {
    let mut fm = String::from("---\n");
    fm.push_str(&format!("title: \"{}\"\n", escape_yaml_string(title)));
    if let Some(source) = source {
        fm.push_str(&format!("source: \"{}\"\n", escape_yaml_string(source)));
    }
    fm.push_str("---\n");
    fm
}

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape special characters in a YAML string value.
fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
