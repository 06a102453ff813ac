//! Multi-document YAML stream parsing.
//!
//! `kustomize build` prints one resource per document, separated by `---`
//! lines. [`parse`] turns that stream into [`Record`]s in source order and
//! reports every document it had to skip. [`to_stream`] is the inverse.

use serde_yaml::Value;
use tracing::{debug, instrument};

use kustdoc_shared::Record;

/// Document separator, also used when re-joining records.
pub const SEPARATOR: &str = "---";

/// Parsed stream: accepted records plus the documents that were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parsed {
    /// Accepted records; `ordinal` counts from 0 in this order.
    pub records: Vec<Record>,
    /// Non-empty documents that did not become records.
    pub skips: Vec<ParseSkip>,
}

/// A document that was not accepted as a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSkip {
    /// Position among the stream's non-empty documents, from 0.
    pub index: usize,
    /// Why it was skipped.
    pub reason: String,
}

/// Identifying fields pulled out of a document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fields {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

/// Parse a multi-document YAML stream.
///
/// Empty and comment-only documents are ignored silently. A document that is
/// not a mapping, fails to parse, or lacks a string `kind` or
/// `metadata.name` is skipped and reported in [`Parsed::skips`]. Never fails.
#[instrument(skip_all, fields(bytes = text.len()))]
pub fn parse(text: &str) -> Parsed {
    let mut parsed = Parsed::default();

    for (index, segment) in split_documents(text).into_iter().enumerate() {
        match parse_document(&segment) {
            Ok((fields, body)) => {
                let ordinal = parsed.records.len();
                parsed.records.push(Record {
                    api_version: fields.api_version,
                    kind: fields.kind,
                    name: fields.name,
                    namespace: fields.namespace,
                    raw_text: segment,
                    ordinal,
                    body,
                });
            }
            Err(reason) => {
                debug!(index, %reason, "skipping document");
                parsed.skips.push(ParseSkip { index, reason });
            }
        }
    }

    debug!(
        records = parsed.records.len(),
        skipped = parsed.skips.len(),
        "parsed YAML stream"
    );
    parsed
}

/// Join records back into a stream that [`parse`] reads as the same records.
pub fn to_stream(records: &[Record]) -> String {
    records
        .iter()
        .map(|r| r.raw_text.as_str())
        .collect::<Vec<_>>()
        .join(&format!("{SEPARATOR}\n"))
}

/// Normalize one document's text: no leading or trailing blank lines, exactly
/// one trailing newline. A leading separator line is dropped.
pub(crate) fn normalize_document(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().collect();
    if lines.first().is_some_and(|l| separator_rest(l).is_some()) {
        lines.remove(0);
    }
    trim_blank_edges(&lines)
}

/// Parse a normalized document into its identifying fields and body.
pub(crate) fn parse_document(text: &str) -> std::result::Result<(Fields, Value), String> {
    let body: Value = serde_yaml::from_str(text).map_err(|e| format!("invalid YAML: {e}"))?;
    let fields = extract_fields(&body)?;
    Ok((fields, body))
}

/// Pull `apiVersion`, `kind`, `metadata.name` and `metadata.namespace` out of
/// a document body.
pub(crate) fn extract_fields(body: &Value) -> std::result::Result<Fields, String> {
    if !body.is_mapping() {
        return Err("document is not a mapping".to_string());
    }

    let kind = non_empty_str(body.get("kind")).ok_or("missing string field 'kind'")?;
    let metadata = body.get("metadata");
    let name = non_empty_str(metadata.and_then(|m| m.get("name")))
        .ok_or("missing string field 'metadata.name'")?;
    let api_version = body
        .get("apiVersion")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let namespace = metadata
        .and_then(|m| m.get("namespace"))
        .map(scalar_text);

    Ok(Fields {
        api_version: api_version.to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        namespace,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Split a stream into normalized, non-empty documents.
fn split_documents(text: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        match separator_rest(line) {
            Some(rest) => {
                push_document(&mut documents, &current);
                current.clear();
                // `--- {inline: doc}` carries content on the separator line.
                if !rest.is_empty() && !rest.starts_with('#') {
                    current.push(rest);
                }
            }
            None => current.push(line),
        }
    }
    push_document(&mut documents, &current);

    documents
}

fn push_document(documents: &mut Vec<String>, lines: &[&str]) {
    let has_content = lines.iter().any(|l| {
        let t = l.trim();
        !t.is_empty() && !t.starts_with('#') && t != "..."
    });
    if has_content {
        documents.push(trim_blank_edges(lines));
    }
}

/// If `line` is a document separator, the trimmed text after it.
fn separator_rest(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(SEPARATOR)?;
    if rest.is_empty() {
        return Some("");
    }
    if rest.starts_with([' ', '\t']) {
        return Some(rest.trim());
    }
    None
}

fn trim_blank_edges(lines: &[&str]) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => {
            let mut text = lines[start..=end].join("\n");
            text.push('\n');
            text
        }
        _ => String::new(),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Text of a scalar namespace value; null reads as the empty string.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
