use thiserror::Error;

use crate::forge::ForgeError;

/// Unified error type for bb-release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Forge error: {0}")]
    Forge(#[from] ForgeError),

    #[error("YAML error: {0}")]
    Yaml(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Version parsing error: {0}")]
    Version(String),

    #[error("No release found (every release tag matched prerelease marker '{marker}')")]
    NoReleaseFound { marker: String },

    #[error(
        "Tag {tag} release hash {release_commit} != {branch} branch hash {branch_commit}, \
         get in contact with the previous release engineer: {author}"
    )]
    ReleaseMismatch {
        tag: String,
        branch: String,
        release_commit: String,
        branch_commit: String,
        author: String,
    },

    #[error("Release branch '{0}' not found")]
    BranchNotFound(String),

    #[error("{package}@{tag} Chart not found")]
    ChartNotFound { package: String, tag: String },

    #[error("{package}@{tag} CHANGELOG not found")]
    ChangelogNotFound { package: String, tag: String },

    #[error("Failed to parse CHANGELOG: {0}")]
    ChangelogParse(String),

    #[error("Working copy at {0} has pending changes, please commit or stash them")]
    DirtyWorkingCopy(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for ReleaseError {
    fn from(err: serde_yaml::Error) -> Self {
        ReleaseError::Yaml(err.to_string())
    }
}

/// Convenience type alias for Results in bb-release
pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        ReleaseError::Config(msg.into())
    }

    /// Create a version error with context
    pub fn version(msg: impl Into<String>) -> Self {
        ReleaseError::Version(msg.into())
    }

    /// Create a YAML error with context
    pub fn yaml(msg: impl Into<String>) -> Self {
        ReleaseError::Yaml(msg.into())
    }

    /// Create a changelog parse error with context
    pub fn changelog(msg: impl Into<String>) -> Self {
        ReleaseError::ChangelogParse(msg.into())
    }
}
