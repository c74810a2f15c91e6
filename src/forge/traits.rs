//! forge::traits
//!
//! Trait definition for the self-hosted source forge that publishes the
//! distribution's releases, branches and merge requests.
//!
//! # Design
//!
//! Execution is strictly sequential, so the trait is synchronous. Every
//! method returns `Result` so API failures surface to the caller, who decides
//! whether they are fatal for the run.

use thiserror::Error;

use crate::domain::TagRecord;

/// Errors from forge operations.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The resource to create already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),
}

/// A branch on the forge and the commit it points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    /// Short id of the branch head
    pub commit_id: String,
}

/// A merged change request (merge request) attached to a milestone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequest {
    pub iid: u64,
    pub title: String,
    pub web_url: String,
    pub author: Option<String>,
}

/// The source forge hosting the distribution's monorepo.
///
/// # Implementations
///
/// - [`GitLabForge`](super::GitLabForge): GitLab v4 REST API over blocking `reqwest`
/// - [`MockForge`](super::MockForge): in-memory forge for tests
pub trait SourceForge {
    /// Check that the configured credentials can access the project.
    ///
    /// Returns `Ok(false)` when the forge rejects the credentials; transport
    /// failures are errors.
    fn authenticate(&self) -> Result<bool, ForgeError>;

    /// Every published release, newest first.
    fn list_releases(&self) -> Result<Vec<TagRecord>, ForgeError>;

    /// Look up a branch, `Ok(None)` when it does not exist.
    fn get_branch(&self, name: &str) -> Result<Option<Branch>, ForgeError>;

    /// Create `name` from `reference` (a branch, tag or commit).
    fn create_branch(&self, name: &str, reference: &str) -> Result<Branch, ForgeError>;

    /// Merged change requests of a milestone, ordered by last update.
    fn list_merged_change_requests(&self, milestone: &str)
        -> Result<Vec<ChangeRequest>, ForgeError>;

    /// Whether a branch exists.
    fn branch_exists(&self, name: &str) -> Result<bool, ForgeError> {
        Ok(self.get_branch(name)?.is_some())
    }
}
