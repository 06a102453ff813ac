//! Resource table rendering.
//!
//! Every record gets a summary row and a collapsed detail row holding its
//! YAML. The rows of one record share an id of the form `<table_id>-<n>`,
//! `n` counting from 1 in record order. Expanding a row needs no script: a
//! checkbox bound to a label carries the state and [`TABLE_STYLE`] shows the
//! detail row with `:has()`.
//!
//! Output is a single raw HTML block with no blank lines, so Markdown
//! renderers pass it through untouched.

use kustdoc_shared::Record;

use crate::escape_html;

/// Stylesheet for the resource tables. Emit once per page.
pub const TABLE_STYLE: &str = r#"<style>
.kustdoc-resources table { border-collapse: collapse; width: 100%; }
.kustdoc-resources th { text-align: left; padding: 8px; }
.kustdoc-resources td { text-align: left; vertical-align: top; padding: 8px; word-wrap: break-word; max-width: 250px; }
.kustdoc-resources .kustdoc-summary { border-bottom: 1px solid #ddd; }
.kustdoc-resources .kustdoc-api { display: block; margin-top: 2px; color: #777; font-size: 0.8em; }
.kustdoc-resources .kustdoc-toggle { position: absolute; opacity: 0; pointer-events: none; }
.kustdoc-resources .kustdoc-toggle + label { display: inline-block; padding: 4px 8px; border: 1px solid #c5d6e8; border-radius: 3px; cursor: pointer; user-select: none; font-size: 12px; }
.kustdoc-resources .kustdoc-toggle + label::before { content: "\25BC  "; }
.kustdoc-resources .kustdoc-toggle:checked + label::before { content: "\25B2  "; }
.kustdoc-resources .kustdoc-toggle:focus-visible + label { outline: 2px solid #0366d6; }
.kustdoc-resources .kustdoc-detail { display: none; }
.kustdoc-resources .kustdoc-resource:has(.kustdoc-toggle:checked) .kustdoc-detail { display: table-row; }
.kustdoc-resources .kustdoc-detail pre { margin: 0; }
</style>"#;

/// Build the table id for the `block`-th directive on a page.
///
/// `page_slug` keeps ids unique across pages that end up on one document;
/// `block` keeps two tables on the same page apart.
pub fn table_id(page_slug: &str, block: usize) -> String {
    format!("kd-{page_slug}-{}", block + 1)
}

/// Render `records` as an expandable resource table.
///
/// Rows follow `ordinal`, never kind or name.
pub fn render_table(records: &[Record], table_id: &str) -> String {
    if records.is_empty() {
        return "No resources found.\n".to_string();
    }

    let mut ordered: Vec<&Record> = records.iter().collect();
    ordered.sort_by_key(|r| r.ordinal);

    let mut html = String::new();
    html.push_str(&format!(
        "<div class=\"kustdoc-resources\" id=\"{table_id}\">\n<table>\n"
    ));
    html.push_str(
        "<thead><tr><th>Kind</th><th>Name</th><th>Namespace</th><th>Details</th></tr></thead>\n",
    );

    for (i, record) in ordered.iter().enumerate() {
        let id = format!("{table_id}-{}", i + 1);
        html.push_str(&resource_rows(record, &id));
    }

    html.push_str("</table>\n</div>\n");
    html
}

/// Summary and detail rows for one record, grouped in their own `<tbody>`.
fn resource_rows(record: &Record, id: &str) -> String {
    let (group, version) = record.group_version();
    let api_info = if group.trim().is_empty() {
        version.to_string()
    } else {
        format!("{group}/{version}")
    };

    let kind = escape_html(&record.kind);
    let name = escape_html(&record.name);
    let namespace = escape_html(record.namespace.as_deref().unwrap_or(""));
    let api_info = escape_html(&api_info);
    let yaml = preformatted(&record.raw_text);

    format!(
        "<tbody class=\"kustdoc-resource\" id=\"{id}\">\n\
         <tr class=\"kustdoc-summary\">\n\
         <td>{kind}<span class=\"kustdoc-api\">{api_info}</span></td>\n\
         <td title=\"{name}\">{name}</td>\n\
         <td title=\"{namespace}\">{namespace}</td>\n\
         <td><input type=\"checkbox\" class=\"kustdoc-toggle\" id=\"{id}-toggle\" aria-controls=\"{id}-detail\"><label for=\"{id}-toggle\" aria-label=\"Show YAML for {kind} {name}\">YAML</label></td>\n\
         </tr>\n\
         <tr class=\"kustdoc-detail\" id=\"{id}-detail\">\n\
         <td colspan=\"4\"><pre><code class=\"language-yaml\">{yaml}</code></pre></td>\n\
         </tr>\n\
         </tbody>\n"
    )
}

/// Escape YAML for a `<pre>` block. Blank lines would end the surrounding
/// HTML block in CommonMark, so they carry an encoded space instead. A
/// leading `#` is encoded too so comment lines are never read as headings.
fn preformatted(text: &str) -> String {
    escape_html(text.trim_end_matches('\n'))
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                "&#32;".to_string()
            } else if let Some(rest) = line.strip_prefix('#') {
                format!("&#35;{rest}")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
