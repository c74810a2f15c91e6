use std::fmt;

/// Non-fatal conditions met while preparing a release.
/// These are reported to the operator; the run continues.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryWarning {
    /// A package was left out of the release notes
    PackageSkipped {
        package: String,
        tag: String,
        reason: String,
    },
    /// A renamed package has no title override under its new name
    TitleOverrideMissing { original: String, renamed: String },
    /// Packages present in the previous release but not in this one
    RemovedPackages { names: Vec<String> },
    /// The previous release's floating branch does not exist on the forge
    FloatingBranchMissing { branch: String },
    /// The previous release tag and its floating branch point at different commits
    ReleaseMismatch {
        tag: String,
        branch: String,
        release_commit: String,
        branch_commit: String,
        author: String,
    },
}

impl fmt::Display for BoundaryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryWarning::PackageSkipped {
                package,
                tag,
                reason,
            } => {
                write!(f, "Skipping {}@{}: {}", package, tag, reason)
            }
            BoundaryWarning::TitleOverrideMissing { original, renamed } => {
                write!(
                    f,
                    "Package '{}' renamed to '{}' but no override for '{}' exists; \
                     keeping derived title",
                    original, renamed, renamed
                )
            }
            BoundaryWarning::RemovedPackages { names } => {
                write!(
                    f,
                    "Removed since the previous release (not listed): {}",
                    names.join(", ")
                )
            }
            BoundaryWarning::FloatingBranchMissing { branch } => {
                write!(f, "Branch '{}' not found on the forge", branch)
            }
            BoundaryWarning::ReleaseMismatch {
                tag,
                branch,
                release_commit,
                branch_commit,
                author,
            } => {
                write!(
                    f,
                    "Release {} ({}) does not match {} ({}); tagged by {}",
                    tag, release_commit, branch, branch_commit, author
                )
            }
        }
    }
}
