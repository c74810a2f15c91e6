use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ReleaseError, Result};
use crate::git::WorkingCopy;

/// Mock working copy for testing without an actual clone.
///
/// Each ref owns a set of files; checking out a ref makes its files visible.
/// Writes go to the currently checked-out ref. Clones share state.
#[derive(Debug, Clone)]
pub struct MockWorkingCopy {
    inner: Arc<Mutex<MockInner>>,
    root: PathBuf,
}

#[derive(Debug, Default)]
struct MockInner {
    refs: HashMap<String, HashMap<String, String>>,
    current: Option<String>,
    dirty: bool,
    pulls: usize,
    checkouts: Vec<String>,
}

impl MockWorkingCopy {
    pub fn new() -> Self {
        MockWorkingCopy {
            inner: Arc::new(Mutex::new(MockInner::default())),
            root: PathBuf::from("bigbang"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add `path` with `contents` at `reference`
    pub fn with_file(
        self,
        reference: impl Into<String>,
        path: impl Into<String>,
        contents: impl Into<String>,
    ) -> Self {
        self.lock()
            .refs
            .entry(reference.into())
            .or_default()
            .insert(path.into(), contents.into());
        self
    }

    /// Mark the working copy as having pending changes
    pub fn dirty(self) -> Self {
        self.lock().dirty = true;
        self
    }

    /// Refs checked out so far, in order
    pub fn checkouts(&self) -> Vec<String> {
        self.lock().checkouts.clone()
    }

    pub fn pull_count(&self) -> usize {
        self.lock().pulls
    }

    pub fn current_ref(&self) -> Option<String> {
        self.lock().current.clone()
    }

    /// Contents of `path` at `reference`, regardless of what is checked out
    pub fn file_at(&self, reference: &str, path: &str) -> Option<String> {
        self.lock()
            .refs
            .get(reference)
            .and_then(|files| files.get(path))
            .cloned()
    }
}

impl Default for MockWorkingCopy {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(path: &str) -> ReleaseError {
    ReleaseError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("{} not found", path),
    ))
}

impl WorkingCopy for MockWorkingCopy {
    fn path(&self) -> &Path {
        &self.root
    }

    fn is_dirty(&self) -> Result<bool> {
        Ok(self.lock().dirty)
    }

    fn pull(&self) -> Result<()> {
        self.lock().pulls += 1;
        Ok(())
    }

    fn checkout_ref(&self, reference: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.dirty {
            return Err(ReleaseError::DirtyWorkingCopy(self.root.display().to_string()));
        }
        if !inner.refs.contains_key(reference) {
            return Err(ReleaseError::Git(git2::Error::from_str(&format!(
                "revspec '{}' not found",
                reference
            ))));
        }
        inner.current = Some(reference.to_string());
        inner.checkouts.push(reference.to_string());
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<String> {
        let inner = self.lock();
        inner
            .current
            .as_ref()
            .and_then(|current| inner.refs.get(current))
            .and_then(|files| files.get(path))
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    fn write_file(&self, path: &str, contents: &str) -> Result<()> {
        let mut inner = self.lock();
        let current = inner.current.clone().ok_or_else(|| not_found(path))?;
        inner
            .refs
            .entry(current)
            .or_default()
            .insert(path.to_string(), contents.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_follow_checkout() {
        let wc = MockWorkingCopy::new()
            .with_file("1.52.0", "chart/values.yaml", "old")
            .with_file("release-1.53.x", "chart/values.yaml", "new");

        wc.checkout_ref("1.52.0").unwrap();
        assert_eq!(wc.read_file("chart/values.yaml").unwrap(), "old");
        wc.checkout_ref("release-1.53.x").unwrap();
        assert_eq!(wc.read_file("chart/values.yaml").unwrap(), "new");
        assert_eq!(wc.checkouts(), vec!["1.52.0", "release-1.53.x"]);
    }

    #[test]
    fn test_write_goes_to_current_ref() {
        let wc = MockWorkingCopy::new().with_file("master", "chart/Chart.yaml", "version: 1");
        wc.checkout_ref("master").unwrap();
        wc.write_file("chart/Chart.yaml", "version: 2").unwrap();
        assert_eq!(
            wc.file_at("master", "chart/Chart.yaml").as_deref(),
            Some("version: 2")
        );
    }

    #[test]
    fn test_dirty_blocks_checkout() {
        let wc = MockWorkingCopy::new().with_file("master", "a", "b").dirty();
        assert!(matches!(
            wc.checkout_ref("master"),
            Err(ReleaseError::DirtyWorkingCopy(_))
        ));
    }

    #[test]
    fn test_unknown_ref() {
        let wc = MockWorkingCopy::new();
        assert!(matches!(wc.checkout_ref("nope"), Err(ReleaseError::Git(_))));
    }
}
