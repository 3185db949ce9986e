//! Include/exclude path filter.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::FileKey;
use crate::error::LintweaveError;

/// Exclude patterns used when none are configured.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/node_modules/**",
    "**/target/**",
    "**/vendor/**",
    "**/.git/**",
];

/// Decides whether a path is in scope.
///
/// Patterns are matched against the root-relative `FileKey`, so `src/**/*.ts`
/// means the same thing wherever the process was started. Exclude wins over
/// include, and an empty include list matches everything.
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl PathFilter {
    /// Builds a filter rooted at `root`.
    ///
    /// An empty `exclude` falls back to [`DEFAULT_EXCLUDES`].
    pub fn new(
        root: impl Into<PathBuf>,
        include: &[String],
        exclude: &[String],
    ) -> Result<Self, LintweaveError> {
        let include_globs = build_globset(include.iter().map(String::as_str))?;
        let exclude_globs = if exclude.is_empty() {
            build_globset(DEFAULT_EXCLUDES.iter().copied())?
        } else {
            build_globset(exclude.iter().map(String::as_str))?
        };

        Ok(Self {
            root: root.into(),
            include: include_globs,
            exclude: exclude_globs,
        })
    }

    /// A filter that accepts everything outside the default excludes.
    pub fn permissive(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include: None,
            exclude: build_globset(DEFAULT_EXCLUDES.iter().copied()).ok().flatten(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true when `key` is in scope.
    pub fn matches(&self, key: &FileKey) -> bool {
        let candidate = Path::new(key.as_str());

        if self
            .exclude
            .as_ref()
            .is_some_and(|excludes| excludes.is_match(candidate))
        {
            return false;
        }

        self.include
            .as_ref()
            .is_none_or(|includes| includes.is_match(candidate))
    }

    /// Normalizes `path` against the filter root, then matches it.
    pub fn matches_path(&self, path: &Path) -> bool {
        self.matches(&FileKey::normalize(path, &self.root))
    }
}

fn build_globset<'a>(
    patterns: impl IntoIterator<Item = &'a str>,
) -> Result<Option<GlobSet>, LintweaveError> {
    let mut builder = GlobSetBuilder::new();
    let mut any = false;

    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            LintweaveError::config(format!("Invalid glob pattern '{}': {}", pattern, e))
        })?;
        builder.add(glob);
        any = true;
    }

    if !any {
        return Ok(None);
    }

    let globset = builder
        .build()
        .map_err(|e| LintweaveError::config(format!("Failed to build globset: {}", e)))?;
    Ok(Some(globset))
}
