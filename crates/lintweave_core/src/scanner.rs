//! Recursive listing of in-scope files.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::FileKey;

/// Lists files below a directory as keys relative to a fixed root.
///
/// Holds no state between scans. Directory symlinks are never followed, so
/// link cycles terminate; symlinked files are listed.
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
}

impl Scanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scans `dir` (absolute, or relative to the root) and returns the sorted
    /// keys accepted by `predicate`. A missing directory yields nothing.
    pub fn scan(&self, dir: &Path, predicate: impl Fn(&FileKey) -> bool) -> Vec<FileKey> {
        let start = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.root.join(dir)
        };

        let mut files = Vec::new();
        for entry in WalkDir::new(&start).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry under {}: {}", start.display(), e);
                    continue;
                }
            };

            let file_type = entry.file_type();
            let is_file = file_type.is_file()
                || (file_type.is_symlink() && entry.path().is_file());
            if !is_file {
                continue;
            }

            let key = FileKey::normalize(entry.path(), &self.root);
            if predicate(&key) {
                files.push(key);
            }
        }

        files.sort();
        files.dedup();
        debug!(dir = %start.display(), files = files.len(), "Scanned directory");
        files
    }

    /// Scans the whole root.
    pub fn scan_root(&self, predicate: impl Fn(&FileKey) -> bool) -> Vec<FileKey> {
        self.scan(&self.root, predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::PathFilter;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn keys(items: &[FileKey]) -> Vec<&str> {
        items.iter().map(FileKey::as_str).collect()
    }

    #[test]
    fn test_scan_lists_filtered_files_sorted() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("src/b.ts"), "").unwrap();
        fs::write(root.join("src/a.ts"), "").unwrap();
        fs::write(root.join("src/nested/c.ts"), "").unwrap();
        fs::write(root.join("src/readme.md"), "").unwrap();
        fs::write(root.join("node_modules/pkg/index.ts"), "").unwrap();

        let filter = PathFilter::new(root, &["**/*.ts".to_string()], &[]).unwrap();
        let scanner = Scanner::new(root);
        let files = scanner.scan_root(|key| filter.matches(key));

        assert_eq!(keys(&files), vec!["src/a.ts", "src/b.ts", "src/nested/c.ts"]);
    }

    #[test]
    fn test_scan_subdirectory_keeps_root_relative_keys() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::write(root.join("a/1.ts"), "").unwrap();
        fs::write(root.join("b/1.ts"), "").unwrap();

        let scanner = Scanner::new(root);
        assert_eq!(keys(&scanner.scan(Path::new("a"), |_| true)), vec!["a/1.ts"]);
        assert_eq!(
            keys(&scanner.scan(&root.join("b"), |_| true)),
            vec!["b/1.ts"]
        );
    }

    #[test]
    fn test_scan_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let scanner = Scanner::new(dir.path());
        assert!(scanner.scan(Path::new("gone"), |_| true).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_does_not_follow_directory_symlinks() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("real")).unwrap();
        fs::write(root.join("real/a.ts"), "").unwrap();
        // loop back to the root
        std::os::unix::fs::symlink(root, root.join("real/loop")).unwrap();
        std::os::unix::fs::symlink(root.join("real/a.ts"), root.join("link.ts")).unwrap();

        let scanner = Scanner::new(root);
        let files = scanner.scan_root(|_| true);

        assert_eq!(keys(&files), vec!["link.ts", "real/a.ts"]);
    }
}
