//! Resolution of relative file and directory names against search roots.
//!
//! A fragment such as `net/http` or `Foo.h` is looked up in each root in
//! configuration order: first directly under the root, then under every
//! directory below it, depth-first with siblings in name order. The first
//! existing path wins. Symlinked directories are not descended into.

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// What a resolved path must be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Anything that exists
    Any,
    /// A directory, following a final symlink
    Dir,
}

impl EntryKind {
    fn admits(self, path: &Path) -> bool {
        match self {
            Self::Any => path.symlink_metadata().is_ok(),
            Self::Dir => path.is_dir(),
        }
    }
}

/// Resolves `fragment` against `roots`.
///
/// An absolute fragment is returned unchanged without touching the
/// filesystem. An empty fragment never resolves. Directories that cannot
/// be read are logged and skipped.
#[must_use]
pub fn resolve<P: AsRef<Path>>(fragment: &str, roots: &[P], kind: EntryKind) -> Option<PathBuf> {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return None;
    }
    let as_path = Path::new(fragment);
    if as_path.is_absolute() {
        return Some(as_path.to_path_buf());
    }

    roots
        .iter()
        .find_map(|root| resolve_in(root.as_ref(), as_path, kind))
}

fn resolve_in(root: &Path, fragment: &Path, kind: EntryKind) -> Option<PathBuf> {
    let direct = root.join(fragment);
    if kind.admits(&direct) {
        return Some(direct);
    }

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {e}", root.display());
                continue;
            }
        };
        // The root itself was checked above
        if entry.depth() == 0 || !entry.file_type().is_some_and(|ft| ft.is_dir()) {
            continue;
        }
        let candidate = entry.path().join(fragment);
        if kind.admits(&candidate) {
            return Some(candidate);
        }
    }

    None
}
