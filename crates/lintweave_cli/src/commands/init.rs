//! Init command implementation

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result};
use tracing::info;

use lintweave_core::LintweaveConfig;

const DEFAULT_CONFIG: &str = r#"{
  // Files to lint. Empty means every file outside "exclude".
  "include": ["src/**/*"],
  "exclude": ["**/node_modules/**", "**/target/**", "**/.git/**"],
  "build": { "enabled": true, "includeMode": "processedFiles" },
  "serve": { "enabled": true, "includeMode": "filesInFolder" },
  "engines": [
    // { "kind": "command", "name": "grep-todo", "command": "grep", "args": ["-Hn", "TODO"] }
  ]
}
"#;

pub fn run_init(force: bool) -> Result<()> {
    let config_path = PathBuf::from(LintweaveConfig::CONFIG_FILES[0]);
    write_config(&config_path, force)?;
    info!("Created {}", config_path.display());
    Ok(())
}

/// Writes the starter config to `config_path`.
fn write_config(config_path: &Path, force: bool) -> Result<()> {
    loop {
        let mut options = std::fs::OpenOptions::new();
        // create_new also refuses to follow a symlink planted at the path
        options.write(true).create_new(true);

        match options.open(config_path) {
            Ok(mut file) => {
                file.write_all(DEFAULT_CONFIG.as_bytes()).into_diagnostic()?;
                return Ok(());
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if !force {
                    return Err(miette::miette!(
                        "Config file already exists. Use --force to overwrite."
                    ));
                }

                match std::fs::remove_file(config_path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e).into_diagnostic(),
                }
            }
            Err(e) => return Err(e).into_diagnostic(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lintweave_core::{InclusionMode, Mode};
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = LintweaveConfig::from_json(DEFAULT_CONFIG).unwrap();

        assert!(config.engines.is_empty());
        assert_eq!(config.include, vec!["src/**/*"]);
        assert_eq!(
            config.phase(Mode::Build).include_mode,
            InclusionMode::ProcessedOnly
        );
        assert_eq!(
            config.phase(Mode::Serve).include_mode,
            InclusionMode::WholeFolder
        );
    }

    #[test]
    fn test_written_config_is_discovered() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LintweaveConfig::CONFIG_FILES[0]);

        write_config(&path, false).unwrap();

        assert_eq!(LintweaveConfig::discover(dir.path()), Some(path));
        let config = LintweaveConfig::load(dir.path()).unwrap();
        assert_eq!(config.base_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_force_replaces_existing_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(LintweaveConfig::CONFIG_FILES[0]);
        std::fs::write(&path, "{ \"include\": [\"old/**\"] }").unwrap();

        assert!(write_config(&path, false).is_err());
        write_config(&path, true).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG);
    }
}
