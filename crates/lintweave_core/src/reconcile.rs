//! Applying settled filesystem changes to the candidate set and result store.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::FileKey;
use crate::config::InclusionMode;
use crate::filter::PathFilter;
use crate::scanner::Scanner;
use crate::store::ResultStore;

/// Files a WholeFolder session dispatches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    files: BTreeSet<FileKey>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `file` was not already a candidate.
    pub fn insert(&mut self, file: FileKey) -> bool {
        self.files.insert(file)
    }

    pub fn remove(&mut self, file: &FileKey) -> bool {
        self.files.remove(file)
    }

    pub fn contains(&self, file: &FileKey) -> bool {
        self.files.contains(file)
    }

    pub fn any_under(&self, dir: &FileKey) -> bool {
        self.files.iter().any(|file| file.is_under(dir))
    }

    /// Removes candidates below `dir` that are not in `keep`. Returns the count.
    pub fn remove_under(&mut self, dir: &FileKey, keep: &HashSet<FileKey>) -> usize {
        let before = self.files.len();
        self.files
            .retain(|file| !file.is_under(dir) || keep.contains(file));
        before - self.files.len()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileKey> {
        self.files.iter()
    }

    /// Snapshot suitable for dispatch.
    pub fn to_batch(&self) -> Arc<[FileKey]> {
        self.files.iter().cloned().collect()
    }
}

impl FromIterator<FileKey> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = FileKey>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// WholeFolder only: the candidate set should be dispatched again.
    pub dispatch: bool,
    /// Engines whose results lost entries.
    pub evicted: BTreeSet<String>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        !self.dispatch && self.evicted.is_empty()
    }
}

/// Applies settled paths to the candidate set and result store.
///
/// Runs on the context that owns both. Filesystem errors are treated as "the
/// path is gone" and never surface.
#[derive(Debug, Clone)]
pub struct Reconciler {
    root: PathBuf,
    filter: Arc<PathFilter>,
    scanner: Scanner,
    mode: InclusionMode,
}

enum PathKind {
    File,
    Directory,
    Missing,
}

impl Reconciler {
    pub fn new(root: impl Into<PathBuf>, filter: Arc<PathFilter>, mode: InclusionMode) -> Self {
        let root = root.into();
        Self {
            scanner: Scanner::new(root.clone()),
            root,
            filter,
            mode,
        }
    }

    pub fn mode(&self) -> InclusionMode {
        self.mode
    }

    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    /// Initial candidate set: every in-scope file under the root.
    pub fn initial_candidates(&self) -> CandidateSet {
        self.scanner
            .scan_root(|key| self.filter.matches(key))
            .into_iter()
            .collect()
    }

    /// Keys for `paths` that are in scope and exist as regular files.
    pub fn touched<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) -> Vec<FileKey> {
        paths
            .into_iter()
            .filter_map(|path| {
                let key = FileKey::normalize(path, &self.root);
                let exists = matches!(self.kind_of(&key), PathKind::File);
                (exists && self.filter.matches(&key)).then_some(key)
            })
            .collect()
    }

    /// Reconciles one flushed batch of changed paths.
    pub fn reconcile(
        &self,
        paths: &[PathBuf],
        candidates: &mut CandidateSet,
        store: &mut ResultStore,
    ) -> Reconciliation {
        let mut outcome = Reconciliation::default();
        for path in paths {
            self.reconcile_path(path, candidates, store, &mut outcome);
        }
        if !outcome.is_empty() {
            debug!(
                paths = paths.len(),
                dispatch = outcome.dispatch,
                evicted = outcome.evicted.len(),
                "Reconciled changes"
            );
        }
        outcome
    }

    fn reconcile_path(
        &self,
        path: &Path,
        candidates: &mut CandidateSet,
        store: &mut ResultStore,
        outcome: &mut Reconciliation,
    ) {
        let key = FileKey::normalize(path, &self.root);

        match self.kind_of(&key) {
            PathKind::File => {
                if !self.filter.matches(&key) {
                    return;
                }
                if self.mode == InclusionMode::WholeFolder {
                    candidates.insert(key);
                    outcome.dispatch = true;
                }
            }
            PathKind::Directory => {
                let children = self.scanner.scan(&key.to_path(&self.root), |child| {
                    self.filter.matches(child)
                });
                self.reconcile_directory(&key, children, candidates, store, outcome);
            }
            PathKind::Missing => {
                if self.filter.matches(&key) {
                    if self.mode == InclusionMode::WholeFolder && candidates.remove(&key) {
                        outcome.dispatch = true;
                    }
                    outcome.evicted.extend(store.evict(&key));
                }

                // a deleted or renamed directory is a directory with no children
                if candidates.any_under(&key) || store.any_under(&key) {
                    self.reconcile_directory(&key, Vec::new(), candidates, store, outcome);
                }
            }
        }
    }

    fn reconcile_directory(
        &self,
        dir: &FileKey,
        children: Vec<FileKey>,
        candidates: &mut CandidateSet,
        store: &mut ResultStore,
        outcome: &mut Reconciliation,
    ) {
        let keep: HashSet<FileKey> = children.iter().cloned().collect();

        if self.mode == InclusionMode::WholeFolder {
            for child in children {
                if candidates.insert(child) {
                    outcome.dispatch = true;
                }
            }
            if candidates.remove_under(dir, &keep) > 0 {
                outcome.dispatch = true;
            }
        }

        outcome.evicted.extend(store.evict_under(dir, &keep));
    }

    fn kind_of(&self, key: &FileKey) -> PathKind {
        match fs::metadata(key.to_path(&self.root)) {
            Ok(meta) if meta.is_file() => PathKind::File,
            Ok(meta) if meta.is_dir() => PathKind::Directory,
            Ok(_) => PathKind::Missing,
            Err(e) => {
                debug!(path = %key, "Treating path as removed: {}", e);
                PathKind::Missing
            }
        }
    }
}
