//! Kustomize bundle discovery.
//!
//! Walks a directory tree looking for `kustomization.yaml` /
//! `kustomization.yml` markers and assembles the bundles it finds into an
//! ordered tree. Directories without a marker are still descended into, and a
//! bundle may contain further bundles.
//!
//! The walk uses an explicit stack, so pathological depth cannot exhaust the
//! call stack. Symlink loops and unreadable directories become
//! [`DiscoveryWarning`]s rather than errors.
//!
//! Symlinked directories are walked only after every real directory, so a
//! directory reachable both directly and through an alias is always claimed
//! by its real path and the alias gets the warning.

mod tree;

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use kustdoc_shared::{Bundle, KustdocError, Result};
use tracing::{debug, info, instrument};

pub use tree::{readme_heading, title_from_segment};

/// Marker file names, in lookup order. The first one present wins.
pub const MARKER_FILES: [&str; 2] = ["kustomization.yaml", "kustomization.yml"];

/// Description file included as page prose.
pub const DESCRIPTION_FILE: &str = "README.md";

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of scanning one discovery root.
#[derive(Debug, Clone)]
pub struct Discovery {
    /// The directory that was scanned.
    pub root: PathBuf,
    /// Top-level bundles, ascending by path. When the root itself is a bundle
    /// this holds exactly that bundle, with everything else nested inside it.
    pub bundles: Vec<Bundle>,
    /// Problems encountered along the way; traversal continued past each.
    pub warnings: Vec<DiscoveryWarning>,
}

impl Discovery {
    /// Total number of bundles in the tree.
    pub fn bundle_count(&self) -> usize {
        self.bundles.iter().map(|b| b.walk().len()).sum()
    }

    /// Whether the discovery root is itself a bundle.
    pub fn root_is_bundle(&self) -> bool {
        matches!(self.bundles.as_slice(), [only] if only.rel_path.is_empty())
    }
}

/// A non-fatal problem found while walking the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryWarning {
    /// Directory or file concerned.
    pub path: PathBuf,
    /// What went wrong.
    pub kind: WarningKind,
}

/// Category of a [`DiscoveryWarning`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    /// The directory could not be listed or resolved.
    Unreadable(String),
    /// The directory resolves to one already visited (symlink loop or alias).
    AlreadyVisited,
    /// The bundle's `README.md` exists but could not be read.
    UnreadableDescription(String),
}

impl fmt::Display for DiscoveryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path.display();
        match &self.kind {
            WarningKind::Unreadable(e) => write!(f, "{path}: unreadable directory ({e})"),
            WarningKind::AlreadyVisited => {
                write!(f, "{path}: already visited via another path (symlink loop?)")
            }
            WarningKind::UnreadableDescription(e) => {
                write!(f, "{path}: could not read {DESCRIPTION_FILE} ({e})")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// A marker directory found by the walk, before tree assembly.
#[derive(Debug)]
struct Found {
    rel: Vec<String>,
    path: PathBuf,
    description: Option<String>,
}

/// One pending directory on the work stack.
struct Frame {
    dir: PathBuf,
    rel: Vec<String>,
}

/// A subdirectory entry as listed by [`list_subdirs`].
struct Subdir {
    name: String,
    is_link: bool,
}

/// Discover every bundle below (and including) `root`.
///
/// Fails only when `root` itself is not a directory.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn discover(root: &Path) -> Result<Discovery> {
    if !root.is_dir() {
        return Err(KustdocError::Discovery(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    info!("scanning for kustomization files");

    let mut warnings = Vec::new();
    let mut found = Vec::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut stack = vec![Frame {
        dir: root.to_path_buf(),
        rel: Vec::new(),
    }];
    let mut linked: VecDeque<Frame> = VecDeque::new();

    while let Some(frame) = stack.pop().or_else(|| linked.pop_front()) {
        let canonical = match fs::canonicalize(&frame.dir) {
            Ok(p) => p,
            Err(e) => {
                warnings.push(DiscoveryWarning {
                    path: frame.dir,
                    kind: WarningKind::Unreadable(e.to_string()),
                });
                continue;
            }
        };
        if !visited.insert(canonical) {
            warnings.push(DiscoveryWarning {
                path: frame.dir,
                kind: WarningKind::AlreadyVisited,
            });
            continue;
        }

        let subdirs = match list_subdirs(&frame.dir) {
            Ok(names) => names,
            Err(e) => {
                warnings.push(DiscoveryWarning {
                    path: frame.dir,
                    kind: WarningKind::Unreadable(e.to_string()),
                });
                continue;
            }
        };

        if let Some(marker) = find_marker(&frame.dir) {
            debug!(dir = %frame.dir.display(), marker, "found bundle");
            let description = read_description(&frame.dir, &mut warnings);
            found.push(Found {
                rel: frame.rel.clone(),
                path: frame.dir.clone(),
                description,
            });
        }

        // Reverse push so the stack pops in ascending name order.
        for sub in subdirs.into_iter().rev() {
            let mut rel = frame.rel.clone();
            rel.push(sub.name.clone());
            let next = Frame {
                dir: frame.dir.join(&sub.name),
                rel,
            };
            if sub.is_link {
                linked.push_front(next);
            } else {
                stack.push(next);
            }
        }
    }

    let root_name = root
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default();
    let bundles = tree::assemble(&root_name, found);

    let discovery = Discovery {
        root: root.to_path_buf(),
        bundles,
        warnings,
    };

    for w in &discovery.warnings {
        debug!(warning = %w, "discovery warning");
    }
    info!(
        bundles = discovery.bundle_count(),
        warnings = discovery.warnings.len(),
        "discovery complete"
    );

    Ok(discovery)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Subdirectories of `dir` (following symlinks), sorted by name.
fn list_subdirs(dir: &Path) -> std::io::Result<Vec<Subdir>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let (is_dir, is_link) = match entry.file_type() {
            Ok(ft) if ft.is_dir() => (true, false),
            Ok(ft) if ft.is_symlink() => (entry.path().is_dir(), true),
            _ => (false, false),
        };
        if is_dir {
            names.push(Subdir {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_link,
            });
        }
    }
    names.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(names)
}

/// The marker file present in `dir`, if any.
fn find_marker(dir: &Path) -> Option<&'static str> {
    MARKER_FILES
        .into_iter()
        .find(|name| dir.join(name).is_file())
}

/// Read the bundle's `README.md`, recording a warning if it exists but fails.
fn read_description(dir: &Path, warnings: &mut Vec<DiscoveryWarning>) -> Option<String> {
    let path = dir.join(DESCRIPTION_FILE);
    if !path.is_file() {
        return None;
    }
    match fs::read_to_string(&path) {
        Ok(content) => Some(content),
        Err(e) => {
            warnings.push(DiscoveryWarning {
                path,
                kind: WarningKind::UnreadableDescription(e.to_string()),
            });
            None
        }
    }
}
