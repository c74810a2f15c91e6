//! Working copy abstraction layer
//!
//! The release workflow reads manifests and rewrites version references
//! through the [WorkingCopy] trait, so it can be driven against a real
//! checkout or an in-memory fake.
//!
//! - [repository::Git2WorkingCopy]: a local clone, using the `git2` crate
//! - [mock::MockWorkingCopy]: in-memory files per ref, for testing
//!
//! ```rust
//! # use bb_release::git::WorkingCopy;
//! # fn example<W: WorkingCopy>(wc: &W) -> bb_release::Result<()> {
//! wc.checkout_ref("release-1.53.x")?;
//! let values = wc.read_file("chart/values.yaml")?;
//! # let _ = values;
//! # Ok(())
//! # }
//! ```

pub mod mock;
pub mod repository;

pub use mock::MockWorkingCopy;
pub use repository::Git2WorkingCopy;

use std::path::Path;

use crate::error::Result;

/// Path of the package manifest inside the distribution repository
pub const VALUES_PATH: &str = "chart/values.yaml";

/// Local checkout of the distribution repository
///
/// File paths are relative to the repository root and use `/` separators.
pub trait WorkingCopy {
    /// Root directory of the checkout
    fn path(&self) -> &Path;

    /// Whether tracked files have uncommitted modifications
    fn is_dirty(&self) -> Result<bool>;

    /// Fetch from `origin` and fast-forward the current branch
    fn pull(&self) -> Result<()>;

    /// Switch to a branch, tag or commit.
    ///
    /// Fails with [crate::ReleaseError::DirtyWorkingCopy] when there are pending changes.
    fn checkout_ref(&self, reference: &str) -> Result<()>;

    fn read_file(&self, path: &str) -> Result<String>;

    fn write_file(&self, path: &str, contents: &str) -> Result<()>;
}
