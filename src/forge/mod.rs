//! Source forge abstraction layer
//!
//! The release workflow talks to the forge through the [SourceForge] trait:
//!
//! - [gitlab::GitLabForge]: GitLab v4 REST API implementation
//! - [mock::MockForge]: in-memory implementation for testing

pub mod gitlab;
pub mod mock;
pub mod traits;

pub use gitlab::GitLabForge;
pub use mock::MockForge;
pub use traits::{Branch, ChangeRequest, ForgeError, SourceForge};
