//! Integration tests for the init command.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn lintweave_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_lintweave"))
}

mod init_command {
    use super::*;

    #[test]
    fn creates_new_config_file() {
        let temp_dir = TempDir::new().unwrap();

        lintweave_cmd()
            .current_dir(temp_dir.path())
            .arg("init")
            .assert()
            .success()
            .stderr(predicate::str::contains("Created .lintweave.jsonc"));

        let content = fs::read_to_string(temp_dir.path().join(".lintweave.jsonc")).unwrap();
        assert!(content.contains("engines"));
        assert!(content.contains("includeMode"));
    }

    #[test]
    fn created_config_is_accepted_by_lint() {
        let temp_dir = TempDir::new().unwrap();

        lintweave_cmd()
            .current_dir(temp_dir.path())
            .arg("init")
            .assert()
            .success();

        lintweave_cmd()
            .current_dir(temp_dir.path())
            .arg("lint")
            .assert()
            .success()
            .stderr(predicate::str::contains("Using config"));
    }

    #[test]
    fn fails_when_config_exists_without_force() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(".lintweave.jsonc");
        fs::write(&config_path, "{}").unwrap();

        lintweave_cmd()
            .current_dir(temp_dir.path())
            .arg("init")
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));

        assert_eq!(fs::read_to_string(&config_path).unwrap(), "{}");
    }

    #[test]
    fn overwrites_with_force() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(".lintweave.jsonc");
        fs::write(&config_path, "{}").unwrap();

        lintweave_cmd()
            .current_dir(temp_dir.path())
            .args(["init", "--force"])
            .assert()
            .success();

        assert!(fs::read_to_string(&config_path).unwrap().contains("engines"));
    }
}
