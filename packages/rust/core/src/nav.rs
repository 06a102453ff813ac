//! Navigation tree builder.
//!
//! Turns the discovered bundle tree into the `nav.json` subtree for the
//! generated section. One node per bundle, nested exactly as the bundles
//! are.

use tracing::{debug, instrument};

use kustdoc_shared::{Bundle, NavNode};

/// Site path of the section overview page.
pub fn section_index_path(section: &str) -> String {
    if section.is_empty() {
        "index.md".to_string()
    } else {
        format!("{section}/index.md")
    }
}

/// Site path of the page generated for the bundle at `rel_path`.
///
/// The root bundle (empty `rel_path`) owns the section index.
pub fn bundle_page_path(section: &str, rel_path: &str) -> String {
    match (section.is_empty(), rel_path.is_empty()) {
        (_, true) => section_index_path(section),
        (true, false) => format!("{rel_path}/index.md"),
        (false, false) => format!("{section}/{rel_path}/index.md"),
    }
}

/// Build the navigation subtree for `bundles`.
///
/// The returned root is labeled `root_title` and points at the section
/// index. When the discovery root is itself a bundle, its children hang
/// directly off the root node.
#[instrument(skip_all, fields(root_title = %root_title, top_level = bundles.len()))]
pub fn build_nav(bundles: &[Bundle], root_title: &str, section: &str) -> NavNode {
    let children: Vec<NavNode> = match bundles {
        [root] if root.rel_path.is_empty() => root
            .children
            .iter()
            .map(|b| bundle_node(b, section))
            .collect(),
        _ => bundles.iter().map(|b| bundle_node(b, section)).collect(),
    };

    let nav = NavNode {
        title: root_title.to_string(),
        page: Some(section_index_path(section)),
        children,
    };
    debug!(depth = nav.depth(), "navigation built");
    nav
}

/// Append a generated subtree to the user's navigation.
///
/// Existing entries are left exactly as they are, even when one carries the
/// same title.
pub fn append_section(nav: &mut Vec<NavNode>, section: NavNode) {
    nav.push(section);
}

fn bundle_node(bundle: &Bundle, section: &str) -> NavNode {
    NavNode {
        title: bundle.title.clone(),
        page: Some(bundle_page_path(section, &bundle.rel_path)),
        children: bundle
            .children
            .iter()
            .map(|child| bundle_node(child, section))
            .collect(),
    }
}
