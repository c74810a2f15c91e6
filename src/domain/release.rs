//! Release identity resolution from the forge's release history

use crate::domain::version::{FloatingAlias, ReleaseVersion, VersionBump};
use crate::error::{ReleaseError, Result};

/// A published release as reported by the forge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub tag_name: String,
    /// Short id of the tagged commit
    pub commit_id: String,
    /// Author of the tagged commit
    pub author_name: String,
}

impl TagRecord {
    pub fn new(
        tag_name: impl Into<String>,
        commit_id: impl Into<String>,
        author_name: impl Into<String>,
    ) -> Self {
        TagRecord {
            tag_name: tag_name.into(),
            commit_id: commit_id.into(),
            author_name: author_name.into(),
        }
    }
}

/// Version, floating alias and release branch of one release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseIdentity {
    pub tag: ReleaseVersion,
    pub alias: FloatingAlias,
    pub branch_name: String,
}

impl ReleaseIdentity {
    pub fn new(tag: ReleaseVersion, precision: VersionBump) -> Self {
        let alias = tag.alias(precision);
        let branch_name = alias.branch_name();
        ReleaseIdentity {
            tag,
            alias,
            branch_name,
        }
    }
}

/// The last published release together with the tag it was resolved from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousRelease {
    pub identity: ReleaseIdentity,
    pub record: TagRecord,
}

/// Finds the most recent non-prerelease entry in `history` (newest first).
///
/// Any tag whose name contains `prerelease_marker` is skipped. The alias
/// precision is inferred from the trailing zeros of the version.
pub fn resolve_previous(history: &[TagRecord], prerelease_marker: &str) -> Result<PreviousRelease> {
    let record = history
        .iter()
        .find(|record| !is_prerelease(&record.tag_name, prerelease_marker))
        .ok_or_else(|| ReleaseError::NoReleaseFound {
            marker: prerelease_marker.to_string(),
        })?;

    let tag = ReleaseVersion::parse(&record.tag_name)?;
    let precision = tag.precision();

    Ok(PreviousRelease {
        identity: ReleaseIdentity::new(tag, precision),
        record: record.clone(),
    })
}

/// Applies `bump` to the previous release; the bump kind is the alias precision.
pub fn resolve_next(previous: &ReleaseIdentity, bump: VersionBump) -> ReleaseIdentity {
    ReleaseIdentity::new(previous.tag.bump(bump), bump)
}

/// Checks that the previous release branch still points at the tagged commit.
pub fn verify_previous_release(
    previous: &PreviousRelease,
    floating_branch_commit: &str,
    release_commit: &str,
) -> Result<()> {
    if floating_branch_commit == release_commit {
        return Ok(());
    }

    Err(ReleaseError::ReleaseMismatch {
        tag: previous.identity.tag.to_string(),
        branch: previous.identity.branch_name.clone(),
        release_commit: release_commit.to_string(),
        branch_commit: floating_branch_commit.to_string(),
        author: previous.record.author_name.clone(),
    })
}

fn is_prerelease(tag_name: &str, marker: &str) -> bool {
    !marker.is_empty() && tag_name.contains(marker)
}
