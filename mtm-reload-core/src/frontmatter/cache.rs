//! Per-file frontmatter memory.
//!
//! The classifier needs the previous block of a file to diff against. The
//! cache keeps, for each path, the block of the last edit that committed.

use std::path::{Path, PathBuf};

use dashmap::DashMap;
use tracing::debug;

use super::{classify, Frontmatter, FrontmatterDiff};

#[derive(Debug, Default)]
pub struct FrontmatterCache {
    entries: DashMap<PathBuf, Frontmatter>,
}

impl FrontmatterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff the frontmatter of `source` against the last block committed
    /// for `path`, without storing it.
    ///
    /// The first observation of a path and any unparsable source both report
    /// no changes. The parsed block is returned so the caller can
    /// [`commit`](Self::commit) it once the edit has been accepted.
    pub fn diff(&self, path: &Path, source: &str) -> (FrontmatterDiff, Option<Frontmatter>) {
        let current = match Frontmatter::parse(source) {
            Ok(parsed) => parsed.unwrap_or_default(),
            Err(err) => {
                debug!(
                    path = %path.display(),
                    error = %err,
                    "frontmatter unreadable, skipping diff"
                );
                return (FrontmatterDiff::none(), None);
            }
        };

        let diff = classify(self.get(path).as_ref(), Some(&current));
        (diff, Some(current))
    }

    /// Make `frontmatter` the baseline for the next diff of `path`.
    pub fn commit(&self, path: &Path, frontmatter: Frontmatter) {
        self.entries.insert(path.to_path_buf(), frontmatter);
    }

    pub fn get(&self, path: &Path) -> Option<Frontmatter> {
        self.entries.get(path).map(|e| e.value().clone())
    }

    pub fn forget(&self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
