//! forge::mock
//!
//! In-memory forge for deterministic testing.
//!
//! # Example
//!
//! ```
//! use bb_release::domain::TagRecord;
//! use bb_release::forge::{MockForge, SourceForge};
//!
//! let forge = MockForge::new()
//!     .with_release(TagRecord::new("1.52.0", "abc1234", "Jane Doe"))
//!     .with_branch("release-1.52.x", "abc1234");
//!
//! assert!(forge.branch_exists("release-1.52.x").unwrap());
//! assert!(!forge.branch_exists("release-1.53.x").unwrap());
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::traits::{Branch, ChangeRequest, ForgeError, SourceForge};
use crate::domain::TagRecord;

/// Mock forge for testing.
///
/// Clones share state, so a test can keep a handle to inspect created branches.
#[derive(Debug, Clone, Default)]
pub struct MockForge {
    inner: Arc<Mutex<MockForgeInner>>,
}

#[derive(Debug, Default)]
struct MockForgeInner {
    releases: Vec<TagRecord>,
    branches: HashMap<String, String>,
    change_requests: HashMap<String, Vec<ChangeRequest>>,
    reject_credentials: bool,
    created_branches: Vec<(String, String)>,
}

impl MockForge {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockForgeInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a release; releases are reported in insertion order (newest first)
    pub fn with_release(self, record: TagRecord) -> Self {
        self.lock().releases.push(record);
        self
    }

    pub fn with_branch(self, name: impl Into<String>, commit_id: impl Into<String>) -> Self {
        self.lock().branches.insert(name.into(), commit_id.into());
        self
    }

    pub fn with_change_request(self, milestone: impl Into<String>, cr: ChangeRequest) -> Self {
        self.lock()
            .change_requests
            .entry(milestone.into())
            .or_default()
            .push(cr);
        self
    }

    /// Make `authenticate` report invalid credentials
    pub fn rejecting_credentials(self) -> Self {
        self.lock().reject_credentials = true;
        self
    }

    /// Branches created through the forge, as `(name, reference)`
    pub fn created_branches(&self) -> Vec<(String, String)> {
        self.lock().created_branches.clone()
    }
}

impl SourceForge for MockForge {
    fn authenticate(&self) -> Result<bool, ForgeError> {
        Ok(!self.lock().reject_credentials)
    }

    fn list_releases(&self) -> Result<Vec<TagRecord>, ForgeError> {
        Ok(self.lock().releases.clone())
    }

    fn get_branch(&self, name: &str) -> Result<Option<Branch>, ForgeError> {
        Ok(self.lock().branches.get(name).map(|commit_id| Branch {
            name: name.to_string(),
            commit_id: commit_id.clone(),
        }))
    }

    fn create_branch(&self, name: &str, reference: &str) -> Result<Branch, ForgeError> {
        let mut inner = self.lock();
        if inner.branches.contains_key(name) {
            return Err(ForgeError::AlreadyExists(format!("branch {}", name)));
        }

        let commit_id = inner
            .branches
            .get(reference)
            .cloned()
            .unwrap_or_else(|| reference.to_string());
        inner.branches.insert(name.to_string(), commit_id.clone());
        inner
            .created_branches
            .push((name.to_string(), reference.to_string()));

        Ok(Branch {
            name: name.to_string(),
            commit_id,
        })
    }

    fn list_merged_change_requests(
        &self,
        milestone: &str,
    ) -> Result<Vec<ChangeRequest>, ForgeError> {
        Ok(self
            .lock()
            .change_requests
            .get(milestone)
            .cloned()
            .unwrap_or_default())
    }
}
