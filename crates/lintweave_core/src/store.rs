//! Per-engine result sets.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;
use tracing::debug;

use crate::FileKey;
use crate::error::LintweaveError;

/// One engine's current findings, keyed by file.
pub type ResultSet = BTreeMap<FileKey, Value>;

/// Holds every engine's `ResultSet`.
///
/// Engines keep their registration order, which is also the order outputs
/// are reported in.
#[derive(Debug, Default)]
pub struct ResultStore {
    order: Vec<String>,
    sets: HashMap<String, ResultSet>,
}

impl ResultStore {
    /// Creates a store with an empty set per engine.
    pub fn new<I, S>(engines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut store = Self::default();
        for engine in engines {
            store.register(engine);
        }
        store
    }

    /// Adds an engine with an empty set. Registering twice is a no-op.
    pub fn register(&mut self, engine: impl Into<String>) {
        let engine = engine.into();
        if !self.sets.contains_key(&engine) {
            self.sets.insert(engine.clone(), ResultSet::new());
            self.order.push(engine);
        }
    }

    /// Engine names in registration order.
    pub fn engines(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Applies one batch result for `engine`.
    ///
    /// The batch is authoritative only over its own files: each batch file is
    /// set from `report` or, when absent from it, cleared. Files outside the
    /// batch are left alone, including report keys the batch never covered.
    /// Returns true when the set changed.
    pub fn apply(
        &mut self,
        engine: &str,
        batch: &[FileKey],
        mut report: BTreeMap<FileKey, Value>,
    ) -> Result<bool, LintweaveError> {
        let set = self.set_mut(engine)?;
        let mut changed = false;

        for file in batch {
            match report.remove(file) {
                Some(record) => {
                    if set.get(file) != Some(&record) {
                        set.insert(file.clone(), record);
                        changed = true;
                    }
                }
                None => changed |= set.remove(file).is_some(),
            }
        }

        if !report.is_empty() {
            debug!(
                engine,
                ignored = report.len(),
                "Ignoring reported files outside the batch"
            );
        }

        Ok(changed)
    }

    /// Records of `engine` in stable key order.
    pub fn records(&self, engine: &str) -> Result<Vec<Value>, LintweaveError> {
        Ok(self.set(engine)?.values().cloned().collect())
    }

    pub fn set(&self, engine: &str) -> Result<&ResultSet, LintweaveError> {
        self.sets
            .get(engine)
            .ok_or_else(|| LintweaveError::UnknownEngine(engine.to_string()))
    }

    fn set_mut(&mut self, engine: &str) -> Result<&mut ResultSet, LintweaveError> {
        self.sets
            .get_mut(engine)
            .ok_or_else(|| LintweaveError::UnknownEngine(engine.to_string()))
    }

    /// True when any engine holds an entry for `file`.
    pub fn contains(&self, file: &FileKey) -> bool {
        self.sets.values().any(|set| set.contains_key(file))
    }

    /// True when any engine holds an entry below `dir`.
    pub fn any_under(&self, dir: &FileKey) -> bool {
        self.sets
            .values()
            .any(|set| set.keys().any(|file| file.is_under(dir)))
    }

    /// Deletes `file` from every engine. Returns the engines that changed.
    pub fn evict(&mut self, file: &FileKey) -> Vec<String> {
        let mut changed = Vec::new();
        for engine in &self.order {
            if let Some(set) = self.sets.get_mut(engine)
                && set.remove(file).is_some()
            {
                changed.push(engine.clone());
            }
        }
        changed
    }

    /// Deletes every entry below `dir` that is not in `keep`, for every engine.
    ///
    /// Bypasses the batch rule. Returns the engines that changed.
    pub fn evict_under(&mut self, dir: &FileKey, keep: &HashSet<FileKey>) -> Vec<String> {
        let mut changed = Vec::new();
        for engine in &self.order {
            let Some(set) = self.sets.get_mut(engine) else {
                continue;
            };
            let before = set.len();
            set.retain(|file, _| !file.is_under(dir) || keep.contains(file));
            let evicted = before - set.len();
            if evicted > 0 {
                debug!(engine = %engine, dir = %dir, evicted, "Evicted stale results");
                changed.push(engine.clone());
            }
        }
        changed
    }

    /// Drops every engine's entries.
    pub fn clear(&mut self) {
        for set in self.sets.values_mut() {
            set.clear();
        }
    }
}
