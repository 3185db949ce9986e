//! Resolving configured engines.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use lintweave_engine::{CommandEngine, LintEngine};
use tracing::debug;

use crate::config::{EngineConfig, LintweaveConfig};
use crate::error::LintweaveError;

/// The engines of one session, in registration order.
///
/// Names are resolved here, once, so workers get a direct handle to their
/// engine rather than a name to look up.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: Vec<Arc<dyn LintEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every engine listed in `config`.
    pub fn from_config(config: &LintweaveConfig) -> Result<Self, LintweaveError> {
        let mut registry = Self::new();
        for engine in &config.engines {
            registry.register(build_engine(engine, config.base_dir.as_deref()))?;
        }
        Ok(registry)
    }

    /// Adds an engine. Names must be unique.
    pub fn register(&mut self, engine: Arc<dyn LintEngine>) -> Result<(), LintweaveError> {
        let name = engine.name();
        if name.trim().is_empty() {
            return Err(LintweaveError::config("Engine name must not be empty"));
        }
        if self.engines.iter().any(|e| e.name() == name) {
            return Err(LintweaveError::DuplicateEngine(name.to_string()));
        }

        debug!(engine = name, "Registered engine");
        self.engines.push(engine);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, engine: Arc<dyn LintEngine>) -> Result<Self, LintweaveError> {
        self.register(engine)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn LintEngine>, LintweaveError> {
        self.engines
            .iter()
            .find(|e| e.name() == name)
            .cloned()
            .ok_or_else(|| LintweaveError::UnknownEngine(name.to_string()))
    }

    /// Keeps only the named engines, in the given order.
    pub fn select(&self, names: &[String]) -> Result<Self, LintweaveError> {
        let mut seen = HashSet::new();
        let mut selected = Self::new();
        for name in names {
            if seen.insert(name.as_str()) {
                selected.engines.push(self.get(name)?);
            }
        }
        Ok(selected)
    }

    pub fn engines(&self) -> &[Arc<dyn LintEngine>] {
        &self.engines
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.engines.iter().map(|e| e.name())
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// A relative engine `cwd` is taken relative to the config file's directory.
fn build_engine(config: &EngineConfig, base_dir: Option<&Path>) -> Arc<dyn LintEngine> {
    match config {
        EngineConfig::Command(command) => {
            let mut command = command.clone();
            if let (Some(base), Some(cwd)) = (base_dir, &command.cwd)
                && cwd.is_relative()
            {
                command.cwd = Some(base.join(cwd));
            }
            Arc::new(CommandEngine::new(command))
        }
    }
}
