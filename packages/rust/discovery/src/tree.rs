//! Bundle tree assembly and title derivation.

use std::collections::HashMap;

use kustdoc_shared::Bundle;

use crate::Found;

/// Turn the flat list of marker directories into an ordered bundle tree.
///
/// Each bundle hangs off its nearest bundle ancestor; directories in between
/// that are not bundles contribute to the title instead of adding a level.
pub(crate) fn assemble(root_name: &str, mut found: Vec<Found>) -> Vec<Bundle> {
    // Segment-wise ordering puts every ancestor before its descendants.
    found.sort_by(|a, b| a.rel.cmp(&b.rel));

    let mut index: HashMap<Vec<String>, usize> = HashMap::with_capacity(found.len());
    let mut parents: Vec<Option<usize>> = Vec::with_capacity(found.len());
    let mut titles: Vec<String> = Vec::with_capacity(found.len());

    for (i, f) in found.iter().enumerate() {
        let parent = (0..f.rel.len())
            .rev()
            .find_map(|k| index.get(&f.rel[..k]).map(|&p| (p, k)));

        let title = match (&parent, f.rel.is_empty()) {
            (_, true) => title_from_segment(root_name),
            (Some((_, k)), false) => title_from_segments(&f.rel[*k..]),
            (None, false) => title_from_segments(&f.rel),
        };

        parents.push(parent.map(|(p, _)| p));
        titles.push(title);
        index.insert(f.rel.clone(), i);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); found.len()];
    let mut top = Vec::new();
    for (i, parent) in parents.iter().enumerate() {
        match parent {
            Some(p) => children[*p].push(i),
            None => top.push(i),
        }
    }

    // Children always sit at higher indices, so building back to front
    // finishes every subtree before its parent needs it.
    let mut built: Vec<Option<Bundle>> = vec![None; found.len()];
    for (i, f) in found.into_iter().enumerate().rev() {
        let kids = children[i]
            .iter()
            .filter_map(|&c| built[c].take())
            .collect();
        let heading = f.description.as_deref().and_then(readme_heading);
        built[i] = Some(Bundle {
            path: f.path,
            rel_path: f.rel.join("/"),
            title: std::mem::take(&mut titles[i]),
            description: f.description,
            heading,
            children: kids,
        });
    }

    top.into_iter().filter_map(|i| built[i].take()).collect()
}

/// Extract a human-readable title from one directory name.
///
/// Hyphens and underscores become spaces and each word is capitalized.
pub fn title_from_segment(segment: &str) -> String {
    segment
        .replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    format!("{upper}{}", chars.collect::<String>())
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_from_segments(segments: &[String]) -> String {
    segments
        .iter()
        .map(|s| title_from_segment(s))
        .collect::<Vec<_>>()
        .join(" > ")
}

/// First level-1 heading in a README, ignoring fenced code blocks.
pub fn readme_heading(content: &str) -> Option<String> {
    let mut in_code_block = false;

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("# ") {
            let title = rest.trim();
            if !title.is_empty() {
                return Some(title.to_string());
            }
        }
    }

    None
}
