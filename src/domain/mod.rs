//! Domain logic - pure release rules independent of git, HTTP and the terminal

pub mod changelog;
pub mod chart;
pub mod manifest;
pub mod package;
pub mod release;
pub mod version;

pub use changelog::{Changelog, ChangelogRelease};
pub use chart::{format_app_versions, ChartMetadata};
pub use manifest::{DiffClassification, ManifestDiff, ManifestSnapshot};
pub use package::{PackageRecord, PackageType};
pub use release::{PreviousRelease, ReleaseIdentity, TagRecord};
pub use version::{FloatingAlias, ReleaseVersion, VersionBump};
