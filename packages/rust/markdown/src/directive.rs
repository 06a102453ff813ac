//! Inline `kustomize` directive blocks.
//!
//! A directive is a fenced block whose info string starts with `kustomize`:
//!
//! ````text
//! ```kustomize overlays/staging [analyze=true]
//! kind: Deployment
//! metadata:
//!   name: web
//! spec:
//!   replicas: 5
//! ```
//! ````
//!
//! The first argument is the bundle path, the optional bracketed list holds
//! options, and a non-empty body is an override document.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

/// Info-string keyword that marks a directive.
pub const DIRECTIVE_KEYWORD: &str = "kustomize";

/// Matches a whole directive block, from the opening fence to the closing one.
static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ms)^```kustomize[ \t]+([^\[\r\n]+?)(?:[ \t]*\[([^\]\r\n]*)\])?[ \t]*\r?\n(.*?)^```[ \t]*\r?$",
    )
    .expect("directive regex")
});

/// Options recognized in the bracketed list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveOptions {
    /// Render the resource table instead of the raw YAML.
    pub analyze: bool,
}

/// One directive found in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Bundle path as written.
    pub path: String,
    /// Parsed options.
    pub options: DirectiveOptions,
    /// Override document, trimmed and with `\n` line ends; empty when the
    /// block has no body.
    pub body: String,
    /// Byte range of the whole block in the page.
    pub range: Range<usize>,
}

impl Directive {
    /// Build the directive text for a bundle path.
    pub fn to_markdown(path: &str, analyze: bool) -> String {
        if analyze {
            format!("```{DIRECTIVE_KEYWORD} {path} [analyze=true]\n```\n")
        } else {
            format!("```{DIRECTIVE_KEYWORD} {path}\n```\n")
        }
    }
}

/// Find every directive in `markdown`, in page order.
pub fn find_directives(markdown: &str) -> Vec<Directive> {
    DIRECTIVE_RE
        .captures_iter(markdown)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Directive {
                path: caps[1].trim().to_string(),
                options: parse_options(caps.get(2).map(|m| m.as_str()).unwrap_or("")),
                body: caps[3].replace("\r\n", "\n").trim().to_string(),
                range: whole.range(),
            })
        })
        .collect()
}

/// Replace every directive with the output of `render`.
///
/// `render` receives the block's ordinal on the page (0-based) and the
/// directive. Text outside directives is copied unchanged.
pub fn expand_directives<F>(markdown: &str, mut render: F) -> String
where
    F: FnMut(usize, &Directive) -> String,
{
    let directives = find_directives(markdown);
    if directives.is_empty() {
        return markdown.to_string();
    }

    let mut out = String::with_capacity(markdown.len());
    let mut cursor = 0;
    for (ordinal, directive) in directives.iter().enumerate() {
        out.push_str(&markdown[cursor..directive.range.start]);
        out.push_str(render(ordinal, directive).trim_end_matches('\n'));
        cursor = directive.range.end;
    }
    out.push_str(&markdown[cursor..]);
    out
}

/// Parse `analyze=true, foo` style option lists. A bare name means `true`.
fn parse_options(raw: &str) -> DirectiveOptions {
    let mut options = DirectiveOptions::default();

    for option in raw.split(',').map(str::trim).filter(|o| !o.is_empty()) {
        let (key, value) = match option.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim().eq_ignore_ascii_case("true")),
            None => (option, true),
        };
        match key {
            "analyze" => options.analyze = value,
            other => warn!(option = other, "ignoring unknown kustomize directive option"),
        }
    }

    options
}
