use crate::error::{ReleaseError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Release version of the distribution, backed by `semver::Version`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReleaseVersion(semver::Version);

impl ReleaseVersion {
    /// Create a new version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        ReleaseVersion(semver::Version::new(major, minor, patch))
    }

    /// Parse version from a tag string (e.g., "1.52.0" or "v1.52.0").
    ///
    /// At most one `v`/`V` prefix is accepted. Prerelease and build suffixes
    /// are rejected: a release tag is exactly `X.Y.Z`.
    pub fn parse(tag: &str) -> Result<Self> {
        let trimmed = tag.trim();
        let clean_tag = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let version = semver::Version::parse(clean_tag).map_err(|e| {
            ReleaseError::version(format!(
                "Invalid version format: '{}' - expected X.Y.Z ({})",
                tag, e
            ))
        })?;

        if !version.pre.is_empty() || !version.build.is_empty() {
            return Err(ReleaseError::version(format!(
                "Unexpected prerelease tag '{}' - release tags must be X.Y.Z",
                tag
            )));
        }

        Ok(ReleaseVersion(version))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    /// Bump version according to bump type
    pub fn bump(&self, bump_type: VersionBump) -> Self {
        match bump_type {
            VersionBump::Major => ReleaseVersion::new(self.major() + 1, 0, 0),
            VersionBump::Minor => ReleaseVersion::new(self.major(), self.minor() + 1, 0),
            VersionBump::Patch => {
                ReleaseVersion::new(self.major(), self.minor(), self.patch() + 1)
            }
        }
    }

    /// Infer which kind of release produced this version from its trailing zeros
    pub fn precision(&self) -> VersionBump {
        if self.patch() != 0 {
            VersionBump::Patch
        } else if self.minor() != 0 {
            VersionBump::Minor
        } else {
            VersionBump::Major
        }
    }

    /// Floating alias at the given precision
    pub fn alias(&self, precision: VersionBump) -> FloatingAlias {
        FloatingAlias::new(self, precision)
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReleaseVersion {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        ReleaseVersion::parse(s)
    }
}

/// Version bump type, also used as the precision of a release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionBump {
    Major,
    Minor,
    Patch,
}

impl FromStr for VersionBump {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "major" => Ok(VersionBump::Major),
            "minor" => Ok(VersionBump::Minor),
            "patch" => Ok(VersionBump::Patch),
            other => Err(ReleaseError::version(format!(
                "Invalid release type: '{}' - expected major, minor or patch",
                other
            ))),
        }
    }
}

impl fmt::Display for VersionBump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionBump::Major => write!(f, "major"),
            VersionBump::Minor => write!(f, "minor"),
            VersionBump::Patch => write!(f, "patch"),
        }
    }
}

/// Version string with trailing components replaced by `x` (e.g. "1.4.x")
///
/// A patch release pins every component, so its alias is the full version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FloatingAlias(String);

impl FloatingAlias {
    pub fn new(version: &ReleaseVersion, precision: VersionBump) -> Self {
        let alias = match precision {
            VersionBump::Major => format!("{}.x.x", version.major()),
            VersionBump::Minor => format!("{}.{}.x", version.major(), version.minor()),
            VersionBump::Patch => version.to_string(),
        };
        FloatingAlias(alias)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the release branch tracking this alias
    pub fn branch_name(&self) -> String {
        format!("release-{}", self.0)
    }
}

impl fmt::Display for FloatingAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
