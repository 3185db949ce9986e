//! End-to-end build sessions and the worker boundary.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use lintweave_core::{
    BuildSession, EngineRegistry, HostReporter, LintEngine, LintweaveConfig, LintweaveError, Mode,
    ServeSession, SessionSettings, lint_folder,
};
use lintweave_engine::{EngineError, FileKey, Payload, Report, ResultSink};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;

#[derive(Default)]
struct Collected {
    messages: Mutex<Vec<String>>,
}

impl HostReporter for Collected {
    fn warn(&self, message: &str) {
        self.messages.lock().unwrap().push(format!("warn: {}", message));
    }

    fn error(&self, message: &str) {
        self.messages.lock().unwrap().push(format!("error: {}", message));
    }
}

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir
}

fn grep_config() -> LintweaveConfig {
    LintweaveConfig::from_json(
        r#"{
            "include": ["**/*.ts"],
            "engines": [
                { "kind": "command", "name": "todo", "command": "grep", "args": ["-Hn", "TODO"] },
                { "kind": "command", "name": "fixme", "command": "grep", "args": ["-Hn", "FIXME"] }
            ]
        }"#,
    )
    .unwrap()
}

#[tokio::test]
async fn lint_folder_reports_per_engine_in_registration_order() {
    let dir = project(&[
        ("src/a.ts", "// FIXME later\n"),
        ("src/b.ts", "// TODO soon\n"),
        ("notes.md", "TODO not in scope\n"),
    ]);
    let root = dir.path().canonicalize().unwrap();
    let config = grep_config();
    let registry = EngineRegistry::from_config(&config).unwrap();

    let outcome = lint_folder(&root, &registry, &config).await.unwrap();

    let engines: Vec<&str> = outcome.outputs.iter().map(|(e, _)| e.as_str()).collect();
    assert_eq!(engines, vec!["todo", "fixme"]);
    assert!(outcome.outputs[0].1.starts_with("src/b.ts\n"));
    assert!(!outcome.outputs[0].1.contains("notes.md"));
    assert!(outcome.outputs[1].1.starts_with("src/a.ts\n"));
    assert!(outcome.failures.is_empty());
}

#[tokio::test]
async fn build_session_fails_once_after_all_warnings() {
    let dir = project(&[("a.ts", "// TODO\n"), ("b.ts", "// FIXME\n"), ("c.ts", "ok\n")]);
    let root = dir.path().canonicalize().unwrap();
    let config = grep_config();
    let registry = EngineRegistry::from_config(&config).unwrap();
    let reporter = Arc::new(Collected::default());

    let settings = SessionSettings::from_config(&config, &root, Mode::Build).unwrap();
    let mut session = BuildSession::new(&registry, settings, reporter.clone());
    session.touched(&root.join("a.ts"));
    session.touched(&root.join("c.ts"));

    let err = session.finish().await.unwrap_err();
    assert!(matches!(err, LintweaveError::LintingFailed));

    let messages = reporter.messages.lock().unwrap().clone();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].starts_with("warn: a.ts\n"));
    assert_eq!(messages[1], "error: Linting failed, see above output");
}

/// Records carry live callables; checks they never reach the coordinator and
/// that the engine gets its own objects back intact.
struct FixingEngine {
    restored: Mutex<Vec<bool>>,
}

impl FixingEngine {
    fn record(file: &FileKey) -> Payload {
        Payload::object([
            ("file", Payload::string(file.as_str())),
            (
                "fixes",
                Payload::Array(vec![
                    Payload::callable(|p| p.clone()),
                    Payload::object([("apply", Payload::callable(|_| Payload::Null))]),
                ]),
            ),
        ])
    }

    fn intact(record: &Payload) -> bool {
        match record.get("fixes") {
            Some(Payload::Array(items)) => {
                items[0].is_callable() && items[1].get("apply").is_some_and(Payload::is_callable)
            }
            _ => false,
        }
    }
}

impl LintEngine for FixingEngine {
    fn name(&self) -> &str {
        "fixing"
    }

    fn format(&self, records: &[Value]) -> Result<String, EngineError> {
        let lines: Result<Vec<String>, _> = records.iter().map(serde_json::to_string).collect();
        Ok(lines?.join("\n"))
    }

    fn lint_build(&self, files: &[FileKey]) -> Result<Vec<Payload>, EngineError> {
        Ok(files.iter().map(Self::record).collect())
    }

    fn lint_serve(&self, files: &[FileKey], sink: ResultSink) -> Result<(), EngineError> {
        let mut report: Report = files
            .iter()
            .map(|f| (f.as_str().to_string(), Self::record(f)))
            .collect();
        sink.emit(Some(&mut report));
        let intact = report.values().all(Self::intact);
        self.restored.lock().unwrap().push(intact);
        Ok(())
    }
}

#[tokio::test]
async fn callables_are_stripped_on_the_wire_and_restored_for_the_engine() {
    let dir = project(&[("a.ts", "")]);
    let root = dir.path().canonicalize().unwrap();
    let engine = Arc::new(FixingEngine {
        restored: Mutex::new(Vec::new()),
    });
    let mut registry = EngineRegistry::new();
    registry.register(engine.clone()).unwrap();

    let settings = SessionSettings::new(&root).with_touch_debounce(std::time::Duration::ZERO);
    let handle = ServeSession::start(&registry, settings, Arc::new(Collected::default()))
        .await
        .unwrap();
    let mut live = handle.subscribe();

    handle.touched([root.join("a.ts")]).unwrap();
    handle.flush_touched().await.unwrap();

    let event = tokio::time::timeout(std::time::Duration::from_secs(10), live.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.data, r#"{"file":"a.ts","fixes":[null,{}]}"#);
    for _ in 0..100 {
        if !engine.restored.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(*engine.restored.lock().unwrap(), vec![true]);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn build_results_cross_the_boundary_without_callables() {
    let dir = project(&[("a.ts", "")]);
    let root = dir.path().canonicalize().unwrap();
    let mut registry = EngineRegistry::new();
    registry
        .register(Arc::new(FixingEngine {
            restored: Mutex::new(Vec::new()),
        }))
        .unwrap();

    let outcome = lint_folder(&root, &registry, &LintweaveConfig::new())
        .await
        .unwrap();
    assert_eq!(
        outcome.outputs,
        vec![(
            "fixing".to_string(),
            r#"{"file":"a.ts","fixes":[null,{}]}"#.to_string()
        )]
    );
}

#[test]
fn keys_are_root_relative() {
    let key = FileKey::normalize("/work/src\\a.ts", Path::new("/work"));
    assert_eq!(key.as_str(), "src/a.ts");
}
