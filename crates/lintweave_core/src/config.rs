//! Orchestrator configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use jsonc_parser::ParseOptions;
use jsonschema::Validator;
use lintweave_engine::{CommandEngineConfig, DEFAULT_MAX_DEPTH, Mode};
use serde::{Deserialize, Serialize};

use crate::debounce::{DEFAULT_DEBOUNCE_MS, DEFAULT_TOUCH_DEBOUNCE_MS};
use crate::error::LintweaveError;

// Embed the schema
const SCHEMA_JSON: &str = include_str!("../../../schemas/v1/config.json");
static CONFIG_SCHEMA: LazyLock<Result<Validator, String>> = LazyLock::new(|| {
    let schema_json: serde_json::Value = serde_json::from_str(SCHEMA_JSON)
        .map_err(|e| format!("Invalid embedded config schema: {}", e))?;
    Validator::new(&schema_json).map_err(|e| format!("Invalid config schema compilation: {}", e))
});

/// Which files make up a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InclusionMode {
    /// Only files the host pipeline touched.
    #[default]
    #[serde(rename = "processedFiles", alias = "processedOnly")]
    ProcessedOnly,
    /// Every in-scope file under the working directory.
    #[serde(rename = "filesInFolder", alias = "wholeFolder")]
    WholeFolder,
}

/// Settings for one phase (build or serve).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub include_mode: InclusionMode,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_mode: InclusionMode::default(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Filesystem watcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    /// Use the polling backend instead of native notifications.
    #[serde(default)]
    pub poll: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll: false,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// A configured engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EngineConfig {
    /// External command, see `CommandEngine`.
    Command(CommandEngineConfig),
}

impl EngineConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Command(config) => &config.name,
        }
    }
}

/// Configuration for a lintweave session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintweaveConfig {
    /// File patterns to include.
    #[serde(default)]
    pub include: Vec<String>,

    /// File patterns to exclude.
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub build: PhaseConfig,

    #[serde(default)]
    pub serve: PhaseConfig,

    #[serde(default)]
    pub engines: Vec<EngineConfig>,

    /// Quiet window for filesystem events.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Quiet window for host "touched" notifications.
    #[serde(default = "default_touch_debounce_ms")]
    pub touch_debounce_ms: u64,

    /// How deep callables are stripped from engine payloads.
    #[serde(default = "default_max_sanitize_depth")]
    pub max_sanitize_depth: usize,

    #[serde(default)]
    pub watch: WatchConfig,

    /// Directory containing the configuration file. Relative engine `cwd`s
    /// resolve against it.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_touch_debounce_ms() -> u64 {
    DEFAULT_TOUCH_DEBOUNCE_MS
}

fn default_max_sanitize_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl LintweaveConfig {
    /// Configuration file names, in lookup order.
    pub const CONFIG_FILES: &'static [&'static str] = &[".lintweave.jsonc", ".lintweave.json"];

    /// Creates a new empty configuration.
    pub fn new() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            build: PhaseConfig::default(),
            serve: PhaseConfig::default(),
            engines: Vec::new(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            touch_debounce_ms: DEFAULT_TOUCH_DEBOUNCE_MS,
            max_sanitize_depth: DEFAULT_MAX_DEPTH,
            watch: WatchConfig::default(),
            base_dir: None,
        }
    }

    /// Finds a configuration file in `dir`.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        Self::CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Loads the configuration discovered in `dir`, or the defaults.
    pub fn load(dir: &Path) -> Result<Self, LintweaveError> {
        match Self::discover(dir) {
            Some(path) => Self::from_file(path),
            None => {
                let mut config = Self::new();
                config.base_dir = Some(dir.to_path_buf());
                Ok(config)
            }
        }
    }

    /// Loads configuration from a file.
    ///
    /// Comments and trailing commas are accepted.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LintweaveError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            LintweaveError::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_json(&content)?;
        if let Some(parent) = path.parent() {
            config.base_dir = Some(parent.to_path_buf());
        }

        Ok(config)
    }

    /// Parses configuration from JSON (with comments) and validates it
    /// against the embedded schema.
    pub fn from_json(json: &str) -> Result<Self, LintweaveError> {
        let value = jsonc_parser::parse_to_serde_value(json, &ParseOptions::default())
            .map_err(|e| LintweaveError::config(format!("Invalid JSON: {}", e)))?
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));

        let schema = CONFIG_SCHEMA
            .as_ref()
            .map_err(|e| LintweaveError::internal(e.clone()))?;

        if let Err(e) = schema.validate(&value) {
            return Err(LintweaveError::config(format!(
                "Config validation failed: {} at {}",
                e,
                e.instance_path()
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| LintweaveError::config(format!("Invalid config: {}", e)))
    }

    /// The phase settings for `mode`.
    pub fn phase(&self, mode: Mode) -> &PhaseConfig {
        match mode {
            Mode::Build => &self.build,
            Mode::Serve => &self.serve,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn touch_debounce(&self) -> Duration {
        Duration::from_millis(self.touch_debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.watch.poll_interval_ms)
    }
}

impl Default for LintweaveConfig {
    fn default() -> Self {
        Self::new()
    }
}
