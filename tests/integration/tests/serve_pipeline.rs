//! End-to-end serve sessions: real files, the polling watcher and a command
//! engine.

use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lintweave_core::watch::{FsWatcher, WatchOptions};
use lintweave_core::{
    EngineRegistry, InclusionMode, LintweaveConfig, Mode, ServeHandle, ServeSession,
    SessionSettings, TracingReporter,
};
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(20);

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        write(dir.path(), name, content);
    }
    dir
}

fn write(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn grep_config(include_mode: &str) -> LintweaveConfig {
    LintweaveConfig::from_json(&format!(
        r#"{{
            "include": ["**/*.ts"],
            "serve": {{ "includeMode": "{}" }},
            "touchDebounceMs": 20,
            "engines": [
                {{ "kind": "command", "name": "todo", "command": "grep", "args": ["-Hn", "TODO"] }}
            ]
        }}"#,
        include_mode
    ))
    .unwrap()
}

async fn start(root: &Path, config: &LintweaveConfig) -> ServeHandle {
    let root = root.canonicalize().unwrap();
    let registry = EngineRegistry::from_config(config).unwrap();
    let settings = SessionSettings::from_config(config, &root, Mode::Serve).unwrap();
    ServeSession::start(&registry, settings, Arc::new(TracingReporter))
        .await
        .unwrap()
}

async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    while !check().await {
        assert!(start.elapsed() < WAIT, "timed out waiting for: {}", what);
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

async fn outputs(handle: &ServeHandle) -> Vec<String> {
    handle.pull().await.unwrap()
}

#[tokio::test]
async fn whole_folder_follows_edits_and_deletions() {
    let dir = project(&[("src/a.ts", "// TODO one\n"), ("src/b.ts", "clean\n"), ("c.ts", "")]);
    let root = dir.path().canonicalize().unwrap();
    let handle = start(&root, &grep_config("filesInFolder")).await;

    let watcher = FsWatcher::new(
        &root,
        &WatchOptions {
            debounce: Duration::from_millis(50),
            poll: true,
            poll_interval: Duration::from_millis(50),
        },
    )
    .unwrap();
    let _watching = handle.watch(watcher);

    eventually("initial findings", || async {
        let out = outputs(&handle).await;
        out.len() == 1 && out[0].contains("src/a.ts") && out[0].contains("TODO one")
    })
    .await;

    write(&root, "src/b.ts", "// TODO two\n");
    eventually("new finding in edited file", || async {
        let out = outputs(&handle).await;
        out.len() == 1 && out[0].contains("TODO one") && out[0].contains("TODO two")
    })
    .await;

    write(&root, "src/a.ts", "done\n");
    eventually("fixed file drops out", || async {
        let out = outputs(&handle).await;
        out.len() == 1 && !out[0].contains("TODO one") && out[0].contains("TODO two")
    })
    .await;

    fs::remove_dir_all(root.join("src")).unwrap();
    eventually("deleted directory drops out", || async {
        outputs(&handle).await.is_empty()
    })
    .await;
    assert_eq!(handle.pull_json().await.unwrap(), "[]");

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn processed_only_lints_what_the_host_touched() {
    let dir = project(&[("a.ts", "// TODO a\n"), ("b.ts", "// TODO b\n")]);
    let root = dir.path().canonicalize().unwrap();
    let handle = start(&root, &grep_config("processedFiles")).await;
    let mut live = handle.subscribe();

    handle.touched([root.join("a.ts")]).unwrap();

    let event = tokio::time::timeout(WAIT, live.recv()).await.unwrap().unwrap();
    assert_eq!(event.event, "lint-warn");
    assert!(event.data.contains("TODO a"));
    assert!(!event.data.contains("TODO b"));
    assert_eq!(outputs(&handle).await, vec![event.data]);

    // deleting a processed file evicts its results without linting anything else
    fs::remove_file(root.join("a.ts")).unwrap();
    handle.settled(vec![root.join("a.ts")]).unwrap();
    eventually("evicted", || async { outputs(&handle).await.is_empty() }).await;

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn settings_follow_the_serve_phase() {
    let config = grep_config("filesInFolder");
    let settings = SessionSettings::from_config(&config, "/work", Mode::Serve).unwrap();
    assert_eq!(settings.include_mode, InclusionMode::WholeFolder);
    assert_eq!(settings.touch_debounce, Duration::from_millis(20));

    let build = SessionSettings::from_config(&config, "/work", Mode::Build).unwrap();
    assert_eq!(build.include_mode, InclusionMode::ProcessedOnly);
}
