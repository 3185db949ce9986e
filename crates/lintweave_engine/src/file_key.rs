//! Host-independent file identity.

use std::borrow::Borrow;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A file path normalized to a root-relative, forward-slash form.
///
/// Two raw encodings of the same file (`src\a.ts`, `./src/a.ts`,
/// `/work/src/a.ts` with root `/work`) normalize to the same key, and
/// normalizing a key again is a no-op. Relative inputs are resolved against
/// the root first; paths outside the root keep their absolute form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileKey(String);

impl FileKey {
    /// Normalizes `path` against `root`.
    pub fn normalize(path: impl AsRef<Path>, root: &Path) -> Self {
        let raw = path.as_ref().to_string_lossy();
        let (prefix, parts) = split(&raw);

        let root_raw = root.to_string_lossy();
        let (root_prefix, root_parts) = split(&root_raw);

        let (prefix, parts) = match (prefix, &root_prefix) {
            (Some(prefix), _) => (prefix, parts),
            (None, Some(root_prefix)) => (root_prefix.clone(), join(&root_parts, parts)),
            (None, None) => return Self::from_parts(None, &parts),
        };

        if root_prefix.as_deref() == Some(prefix.as_str())
            && parts.len() >= root_parts.len()
            && parts[..root_parts.len()] == root_parts[..]
        {
            return Self::from_parts(None, &parts[root_parts.len()..]);
        }

        Self::from_parts(Some(&prefix), &parts)
    }

    fn from_parts(prefix: Option<&str>, parts: &[String]) -> Self {
        let joined = parts.join("/");
        match prefix {
            Some(prefix) => Self(format!("{}{}", prefix, joined)),
            None if joined.is_empty() => Self(".".to_string()),
            None => Self(joined),
        }
    }

    /// Returns the normalized string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the key lies strictly below `dir`.
    ///
    /// The match is component-aware: `a/1.ts` is under `a`, `ab/1.ts` is not.
    pub fn is_under(&self, dir: &FileKey) -> bool {
        if dir.0 == "." {
            return !self.is_absolute() && self.0 != ".";
        }
        let dir = dir.0.trim_end_matches('/');
        self.0.len() > dir.len() + 1
            && self.0.starts_with(dir)
            && self.0.as_bytes()[dir.len()] == b'/'
    }

    /// Returns true for keys that lie outside the root they were normalized against.
    pub fn is_absolute(&self) -> bool {
        self.0.starts_with('/') || has_drive_prefix(&self.0)
    }

    /// Resolves the key back to a filesystem path.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        if self.is_absolute() {
            PathBuf::from(&self.0)
        } else if self.0 == "." {
            root.to_path_buf()
        } else {
            root.join(&self.0)
        }
    }
}

/// Splits a raw path into an absolute prefix (`/` or `C:/`) and lexically
/// resolved components.
fn split(raw: &str) -> (Option<String>, Vec<String>) {
    let unified = raw.replace('\\', "/");

    let (prefix, rest) = if has_drive_prefix(&unified) {
        let drive = unified[..2].to_ascii_uppercase();
        (Some(format!("{}/", drive)), &unified[2..])
    } else if let Some(rest) = unified.strip_prefix('/') {
        (Some("/".to_string()), rest)
    } else {
        (None, unified.as_str())
    };

    let mut parts: Vec<String> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if last != ".." => {
                    parts.pop();
                }
                // `/..` is `/`
                _ if prefix.is_some() => {}
                _ => parts.push("..".to_string()),
            },
            other => parts.push(other.to_string()),
        }
    }

    (prefix, parts)
}

/// Lexically joins relative `parts` onto an absolute base.
fn join(base: &[String], parts: Vec<String>) -> Vec<String> {
    let mut joined = base.to_vec();
    for part in parts {
        if part == ".." {
            joined.pop();
        } else {
            joined.push(part);
        }
    }
    joined
}

fn has_drive_prefix(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'/' || bytes[2] == b'\\')
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FileKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FileKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case::relative("src/a.ts", "src/a.ts")]
    #[case::dot_prefix("./src/a.ts", "src/a.ts")]
    #[case::backslashes("src\\nested\\a.ts", "src/nested/a.ts")]
    #[case::under_root("/work/src/a.ts", "src/a.ts")]
    #[case::parent_segments("/work/src/../lib/a.ts", "lib/a.ts")]
    #[case::duplicate_slashes("src//a.ts", "src/a.ts")]
    #[case::trailing_slash("src/dir/", "src/dir")]
    #[case::outside_root("/other/a.ts", "/other/a.ts")]
    #[case::root_itself("/work", ".")]
    #[case::escaping_relative("../a.ts", "/a.ts")]
    #[case::relative_through_root("../work/src/a.ts", "src/a.ts")]
    fn test_normalize(#[case] input: &str, #[case] expected: &str) {
        let key = FileKey::normalize(input, Path::new("/work"));
        assert_eq!(key.as_str(), expected);
    }

    #[rstest]
    #[case("src/a.ts")]
    #[case("./x/../y\\z.ts")]
    #[case("/work/a/b/c.ts")]
    #[case("/elsewhere/./b.ts")]
    #[case("../../up.ts")]
    #[case("C:\\work\\a.ts")]
    fn test_normalize_is_idempotent(#[case] input: &str) {
        let root = Path::new("/work");
        let once = FileKey::normalize(input, root);
        let twice = FileKey::normalize(once.as_str(), root);
        assert_eq!(once, twice);
        assert!(!once.as_str().contains('\\'));
    }

    #[test]
    fn test_normalize_windows_drive_under_root() {
        let key = FileKey::normalize("c:\\work\\src\\a.ts", Path::new("C:\\work"));
        assert_eq!(key.as_str(), "src/a.ts");
    }

    #[test]
    fn test_different_encodings_are_equal() {
        let root = Path::new("/work");
        let a = FileKey::normalize("/work/src/a.ts", root);
        let b = FileKey::normalize("src\\a.ts", root);
        let c = FileKey::normalize("./src/./a.ts", root);
        let d = FileKey::normalize("../work/src/a.ts", root);
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(c, d);
    }

    #[test]
    fn test_is_under_is_component_aware() {
        let root = Path::new("/work");
        let dir = FileKey::normalize("a", root);

        assert!(FileKey::normalize("a/1.ts", root).is_under(&dir));
        assert!(FileKey::normalize("a/deep/2.ts", root).is_under(&dir));
        assert!(!FileKey::normalize("ab/1.ts", root).is_under(&dir));
        assert!(!FileKey::normalize("a", root).is_under(&dir));
    }

    #[test]
    fn test_everything_relative_is_under_root_key() {
        let root = Path::new("/work");
        let dot = FileKey::normalize("/work", root);

        assert!(FileKey::normalize("x.ts", root).is_under(&dot));
        assert!(!FileKey::normalize("/other/x.ts", root).is_under(&dot));
    }

    #[test]
    fn test_to_path() {
        let root = Path::new("/work");
        assert_eq!(
            FileKey::normalize("src/a.ts", root).to_path(root),
            PathBuf::from("/work/src/a.ts")
        );
        assert_eq!(
            FileKey::normalize("/other/a.ts", root).to_path(root),
            PathBuf::from("/other/a.ts")
        );
    }
}
