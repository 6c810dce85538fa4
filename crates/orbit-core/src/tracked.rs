//! Paths registered for rust-analyzer.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths::resolve;

/// Suffix of an untrack argument that removes by prefix.
pub const PREFIX_MARKER: &str = "...";

/// Ordered set of absolute paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedPaths {
    paths: Vec<PathBuf>,
}

impl TrackedPaths {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `path`, resolved against `base`. It must exist.
    ///
    /// Returns whether the path was newly added.
    pub fn add(&mut self, base: &Path, path: &str) -> Result<bool> {
        let resolved = resolve(base, path);
        let canonical = resolved.canonicalize().map_err(|e| {
            Error::Directive(format!("cannot track {}: {e}", resolved.display()))
        })?;
        Ok(self.insert(canonical))
    }

    /// Track an absolute path without checking it.
    pub fn insert(&mut self, path: PathBuf) -> bool {
        if self.paths.contains(&path) {
            return false;
        }
        tracing::debug!(path = %path.display(), "tracking path");
        self.paths.push(path);
        true
    }

    /// Stop tracking `pattern`: an exact path, or a prefix ending in `...`.
    ///
    /// Returns the removed paths.
    pub fn remove(&mut self, base: &Path, pattern: &str) -> Vec<PathBuf> {
        let (pattern, by_prefix) = match pattern.strip_suffix(PREFIX_MARKER) {
            Some(prefix) => (prefix, true),
            None => (pattern, false),
        };
        let target = resolve(base, pattern);
        let canonical = target.canonicalize().unwrap_or_else(|_| target.clone());
        let target = target.to_string_lossy().into_owned();
        let canonical = canonical.to_string_lossy().into_owned();

        let mut removed = Vec::new();
        self.paths.retain(|path| {
            let text = path.to_string_lossy();
            let hit = if by_prefix {
                text.starts_with(&target) || text.starts_with(&canonical)
            } else {
                text == target || text == canonical
            };
            if hit {
                removed.push(path.clone());
            }
            !hit
        });
        removed
    }

    /// Tracked paths, in insertion order.
    pub fn list(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Whether `path` is tracked.
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// Number of tracked paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Stop tracking everything.
    pub fn clear(&mut self) {
        self.paths.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_requires_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracked = TrackedPaths::new();
        assert!(tracked.add(dir.path(), "missing").is_err());

        std::fs::create_dir(dir.path().join("lib")).unwrap();
        assert!(tracked.add(dir.path(), "lib").unwrap());
        assert!(!tracked.add(dir.path(), "lib").unwrap());
        assert_eq!(tracked.len(), 1);
        assert!(tracked.list()[0].is_absolute());
    }

    #[test]
    fn test_remove_exact_and_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        for name in ["a", "ab", "b"] {
            std::fs::create_dir(base.join(name)).unwrap();
        }
        let mut tracked = TrackedPaths::new();
        for name in ["a", "ab", "b"] {
            tracked.add(&base, name).unwrap();
        }

        assert_eq!(tracked.remove(&base, "b"), vec![base.join("b")]);
        assert!(tracked.remove(&base, "zzz").is_empty());
        assert_eq!(
            tracked.remove(&base, "a..."),
            vec![base.join("a"), base.join("ab")]
        );
        assert!(tracked.is_empty());
    }

    #[test]
    fn test_insert_and_clear() {
        let mut tracked = TrackedPaths::new();
        assert!(tracked.insert(PathBuf::from("/x/y")));
        assert!(tracked.contains(Path::new("/x/y")));
        tracked.clear();
        assert!(tracked.is_empty());
    }
}
