//! Engine adapter for external lint commands.
//!
//! Runs a command with the batch files appended and groups its output lines
//! by the file path that prefixes them (`path:line:col message`, the shape
//! most compilers and linters print).

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::engine::{LintEngine, Report, ResultSink, WorkerContext};
use crate::error::EngineError;
use crate::file_key::FileKey;
use crate::payload::Payload;

/// Configuration for a `CommandEngine`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEngineConfig {
    /// Unique engine name.
    pub name: String,
    /// Program to run.
    pub command: String,
    /// Arguments placed before the file list.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory. Relative paths resolve against the directory of the
    /// config file, or the session root without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

impl CommandEngineConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Directories resolved by `prepare`.
#[derive(Debug, Clone)]
struct Dirs {
    /// Root the batch keys are relative to.
    root: PathBuf,
    /// Where the command runs.
    cwd: PathBuf,
}

/// Runs an external program per batch.
#[derive(Debug)]
pub struct CommandEngine {
    config: CommandEngineConfig,
    dirs: RwLock<Option<Dirs>>,
}

impl CommandEngine {
    pub fn new(config: CommandEngineConfig) -> Self {
        Self {
            config,
            dirs: RwLock::new(None),
        }
    }

    fn dirs(&self) -> Dirs {
        self.dirs.read().clone().unwrap_or_else(|| Dirs {
            root: PathBuf::from("."),
            cwd: self.config.cwd.clone().unwrap_or_else(|| PathBuf::from(".")),
        })
    }

    /// Runs the command over `files` and groups output lines per file.
    fn run(&self, files: &[FileKey]) -> Result<BTreeMap<FileKey, Vec<String>>, EngineError> {
        let mut grouped: BTreeMap<FileKey, Vec<String>> = BTreeMap::new();
        if files.is_empty() {
            return Ok(grouped);
        }

        let Dirs { root, cwd } = self.dirs();
        debug!(
            engine = %self.config.name,
            files = files.len(),
            "Running `{}`",
            self.config.command
        );

        let output = Command::new(&self.config.command)
            .args(&self.config.args)
            .args(files.iter().map(|f| f.to_path(&root)))
            .current_dir(&cwd)
            .output()
            .map_err(|e| {
                EngineError::analysis(format!("Failed to run `{}`: {}", self.config.command, e))
            })?;

        let batch: HashSet<&FileKey> = files.iter().collect();
        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            let Some(location) = split_location(line) else {
                continue;
            };
            let location = Path::new(location);
            let key = if location.is_absolute() {
                FileKey::normalize(location, &root)
            } else {
                FileKey::normalize(cwd.join(location), &root)
            };
            if batch.contains(&key) {
                grouped.entry(key).or_default().push(line.to_string());
            }
        }

        if !output.status.success() && grouped.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                return Err(EngineError::analysis(format!(
                    "`{}` exited with {}: {}",
                    self.config.command,
                    output.status,
                    stderr.trim()
                )));
            }
        }

        Ok(grouped)
    }
}

/// Returns the path part of `path:rest`, tolerating a leading drive letter.
fn split_location(line: &str) -> Option<&str> {
    let bytes = line.as_bytes();
    let skip = if bytes.len() > 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        2
    } else {
        0
    };
    let end = line[skip..].find(':')? + skip;
    let path = line[..end].trim();
    (!path.is_empty()).then_some(path)
}

fn record(file: &FileKey, lines: Vec<String>) -> Payload {
    Payload::object([
        ("file", Payload::string(file.as_str())),
        ("lines", Payload::from(lines)),
    ])
}

impl LintEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn prepare(&self, ctx: &WorkerContext) -> Result<(), EngineError> {
        if self.config.command.trim().is_empty() {
            return Err(EngineError::prepare(format!(
                "engine '{}' has no command configured",
                self.config.name
            )));
        }

        let cwd = match &self.config.cwd {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => ctx.working_directory.join(dir),
            None => ctx.working_directory.clone(),
        };
        if !cwd.is_dir() {
            return Err(EngineError::prepare(format!(
                "working directory {} does not exist",
                cwd.display()
            )));
        }

        info!(engine = %self.config.name, mode = %ctx.mode, "Command engine ready");
        *self.dirs.write() = Some(Dirs {
            root: ctx.working_directory.clone(),
            cwd,
        });
        Ok(())
    }

    fn format(&self, records: &[Value]) -> Result<String, EngineError> {
        let mut out = String::new();
        for record in records {
            let file = record.get("file").and_then(Value::as_str).unwrap_or("<unknown>");
            let _ = writeln!(out, "{}", file);
            for line in record
                .get("lines")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
            {
                let _ = writeln!(out, "  {}", line);
            }
        }
        Ok(out.trim_end().to_string())
    }

    fn lint_build(&self, files: &[FileKey]) -> Result<Vec<Payload>, EngineError> {
        Ok(self
            .run(files)?
            .into_iter()
            .map(|(file, lines)| record(&file, lines))
            .collect())
    }

    fn lint_serve(&self, files: &[FileKey], sink: ResultSink) -> Result<(), EngineError> {
        let mut report: Report = self
            .run(files)?
            .into_iter()
            .map(|(file, lines)| (file.as_str().to_string(), record(&file, lines)))
            .collect();
        sink.emit(Some(&mut report));
        Ok(())
    }
}
