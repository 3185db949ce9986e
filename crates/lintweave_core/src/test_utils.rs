//! Shared fakes for unit tests.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use lintweave_engine::{
    EngineError, FileKey, LintEngine, Payload, Report, ResultSink, WorkerContext,
};
use parking_lot::Mutex;
use serde_json::Value;

use crate::output::HostReporter;

/// Scriptable engine. Flags the files in its `flagged` set.
pub struct FakeEngine {
    name: String,
    delay: Duration,
    flagged: Mutex<BTreeSet<String>>,
    batches: Mutex<Vec<Vec<String>>>,
    fail_prepare: Option<String>,
    fail_lint: Option<String>,
    panic_lint: bool,
}

impl FakeEngine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            flagged: Mutex::new(BTreeSet::new()),
            batches: Mutex::new(Vec::new()),
            fail_prepare: None,
            fail_lint: None,
            panic_lint: false,
        }
    }

    pub fn flagging(self, files: &[&str]) -> Self {
        self.set_flagged(files);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_prepare(mut self, message: &str) -> Self {
        self.fail_prepare = Some(message.to_string());
        self
    }

    pub fn failing_lint(mut self, message: &str) -> Self {
        self.fail_lint = Some(message.to_string());
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_lint = true;
        self
    }

    pub fn set_flagged(&self, files: &[&str]) {
        *self.flagged.lock() = files.iter().map(|f| f.to_string()).collect();
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().clone()
    }

    pub fn into_arc(self) -> Arc<dyn LintEngine> {
        Arc::new(self)
    }

    fn analyse(&self, files: &[FileKey]) -> Result<Vec<(String, Payload)>, EngineError> {
        self.batches
            .lock()
            .push(files.iter().map(|f| f.as_str().to_string()).collect());

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.panic_lint {
            panic!("{} blew up", self.name);
        }
        if let Some(message) = &self.fail_lint {
            return Err(EngineError::analysis(message.clone()));
        }

        let flagged = self.flagged.lock();
        Ok(files
            .iter()
            .filter(|f| flagged.contains(f.as_str()))
            .map(|f| {
                let record = Payload::object([
                    ("file", Payload::string(f.as_str())),
                    ("message", Payload::string(format!("{} flagged", self.name))),
                    ("fix", Payload::callable(|p| p.clone())),
                ]);
                (f.as_str().to_string(), record)
            })
            .collect())
    }
}

impl LintEngine for FakeEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&self, _ctx: &WorkerContext) -> Result<(), EngineError> {
        match &self.fail_prepare {
            Some(message) => Err(EngineError::prepare(message.clone())),
            None => Ok(()),
        }
    }

    fn format(&self, records: &[Value]) -> Result<String, EngineError> {
        let lines: Vec<String> = records
            .iter()
            .map(|r| {
                format!(
                    "{}: {}",
                    r["file"].as_str().unwrap_or("?"),
                    r["message"].as_str().unwrap_or("?")
                )
            })
            .collect();
        Ok(lines.join("\n"))
    }

    fn lint_build(&self, files: &[FileKey]) -> Result<Vec<Payload>, EngineError> {
        Ok(self
            .analyse(files)?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    fn lint_serve(&self, files: &[FileKey], sink: ResultSink) -> Result<(), EngineError> {
        let mut report: Report = self.analyse(files)?.into_iter().collect();
        sink.emit(Some(&mut report));
        // the engine keeps its callables after emitting
        debug_assert!(report.values().all(|r| r.get("fix").is_some_and(Payload::is_callable)));
        Ok(())
    }
}

/// Reporter that records what it was told.
#[derive(Default)]
pub struct RecordingReporter {
    pub messages: Mutex<Vec<(Level, String)>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Warn,
    Error,
}

impl RecordingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages.lock().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.of(Level::Warn)
    }

    pub fn errors(&self) -> Vec<String> {
        self.of(Level::Error)
    }

    fn of(&self, level: Level) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl HostReporter for RecordingReporter {
    fn warn(&self, message: &str) {
        self.messages.lock().push((Level::Warn, message.to_string()));
    }

    fn error(&self, message: &str) {
        self.messages.lock().push((Level::Error, message.to_string()));
    }
}
