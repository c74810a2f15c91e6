use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::VersionBump;
use crate::error::{ReleaseError, Result};

/// Environment variable holding the forge token; wins over the config file.
pub const TOKEN_ENV_VAR: &str = "BB_RELEASE_TOKEN";

/// Represents the complete configuration for bb-release.
///
/// Built once at process entry and passed by reference to the workflow.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Path to the local clone of the distribution repository
    #[serde(default = "default_bb_path")]
    pub bb_path: PathBuf,

    #[serde(default = "default_release_type")]
    pub release_type: VersionBump,

    /// Ask for confirmation before branch creation and after mismatches
    #[serde(default = "default_true")]
    pub interactive: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub steps: Vec<Step>,

    /// Release tags containing this marker are never treated as the previous release
    #[serde(default = "default_prerelease_marker")]
    pub prerelease_marker: String,

    /// Branch new release branches are cut from
    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// Directory the release notes are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Packages flagged with a BETA badge, by manifest name
    #[serde(default)]
    pub beta_list: BTreeSet<String>,

    /// Display overrides keyed by manifest name
    #[serde(default)]
    pub package_overrides: BTreeMap<String, PackageOverride>,

    #[serde(default)]
    pub forge: ForgeConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Replacement name and title for a package in the release notes
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PackageOverride {
    pub name: String,
    pub title: String,
}

/// Connection settings for the source forge.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ForgeConfig {
    #[serde(default = "default_forge_url")]
    pub url: String,

    #[serde(default = "default_project_id")]
    pub project_id: u64,

    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ForgeConfig {
    /// The forge token, or a configuration error naming where to put it
    pub fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                ReleaseError::config(format!(
                    "no forge token configured; set forge.token or {}",
                    TOKEN_ENV_VAR
                ))
            })
    }
}

/// Settings for the package source cache.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Defaults to `~/.r2d2/cache`
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// A selectable step of the release workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    CheckLastRelease,
    CreateReleaseBranch,
    BuildReleaseNotes,
    UpgradeVersionReferences,
}

impl Step {
    pub const ALL: [Step; 4] = [
        Step::CheckLastRelease,
        Step::CreateReleaseBranch,
        Step::BuildReleaseNotes,
        Step::UpgradeVersionReferences,
    ];

    /// Human-readable description used in prompts
    pub fn description(&self) -> &'static str {
        match self {
            Step::CheckLastRelease => "Check last release SHAs",
            Step::CreateReleaseBranch => "Create release branch",
            Step::BuildReleaseNotes => "Build release notes",
            Step::UpgradeVersionReferences => "Upgrade version references",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::CheckLastRelease => "check-last-release",
            Step::CreateReleaseBranch => "create-release-branch",
            Step::BuildReleaseNotes => "build-release-notes",
            Step::UpgradeVersionReferences => "upgrade-version-references",
        };
        f.write_str(name)
    }
}

impl FromStr for Step {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        Step::ALL
            .iter()
            .copied()
            .find(|step| step.to_string() == s)
            .ok_or_else(|| ReleaseError::config(format!("Unknown step: '{}'", s)))
    }
}

fn default_true() -> bool {
    true
}

fn default_bb_path() -> PathBuf {
    PathBuf::from("../bigbang")
}

fn default_release_type() -> VersionBump {
    VersionBump::Minor
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_prerelease_marker() -> String {
    "rc".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_forge_url() -> String {
    "https://repo1.dso.mil".to_string()
}

fn default_project_id() -> u64 {
    2872
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ForgeConfig {
    fn default() -> Self {
        ForgeConfig {
            url: default_forge_url(),
            project_id: default_project_id(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: true,
            dir: None,
        }
    }
}

impl CacheConfig {
    /// Effective cache directory, `None` when caching is disabled or no home exists
    pub fn resolved_dir(&self) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        self.dir
            .clone()
            .or_else(crate::fetch::PackageCache::default_root)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bb_path: default_bb_path(),
            release_type: default_release_type(),
            interactive: true,
            log_level: default_log_level(),
            steps: Vec::new(),
            prerelease_marker: default_prerelease_marker(),
            default_branch: default_branch(),
            output_dir: default_output_dir(),
            beta_list: BTreeSet::new(),
            package_overrides: BTreeMap::new(),
            forge: ForgeConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ReleaseError::config(e.to_string()))
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `bb-release.toml` in current directory
/// 3. `bb-release/config.toml` in the user config directory
/// 4. Default configuration if no file found
///
/// The `BB_RELEASE_TOKEN` environment variable, when set, replaces the forge token.
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If file exists but cannot be read or parsed
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config_str = if let Some(path) = config_path {
        Some(fs::read_to_string(path)?)
    } else if Path::new("./bb-release.toml").exists() {
        Some(fs::read_to_string("./bb-release.toml")?)
    } else if let Some(config_dir) = dirs::config_dir() {
        let config_path = config_dir.join("bb-release").join("config.toml");
        if config_path.exists() {
            Some(fs::read_to_string(config_path)?)
        } else {
            None
        }
    } else {
        None
    };

    let mut config = match config_str {
        Some(text) => Config::from_toml(&text)?,
        None => Config::default(),
    };

    if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
        if !token.is_empty() {
            config.forge.token = Some(token);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bb_path, PathBuf::from("../bigbang"));
        assert_eq!(config.release_type, VersionBump::Minor);
        assert_eq!(config.prerelease_marker, "rc");
        assert_eq!(config.forge.project_id, 2872);
        assert!(config.cache.enabled);
        assert!(config.steps.is_empty());
    }

    #[test]
    fn test_empty_toml_matches_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_step_names_round_trip() {
        for step in Step::ALL {
            assert_eq!(step.to_string().parse::<Step>().unwrap(), step);
        }
        assert!("deploy".parse::<Step>().is_err());
    }

    #[test]
    fn test_require_token() {
        let mut forge = ForgeConfig::default();
        assert!(forge.require_token().is_err());
        forge.token = Some(String::new());
        assert!(forge.require_token().is_err());
        forge.token = Some("glpat-123".into());
        assert_eq!(forge.require_token().unwrap(), "glpat-123");
    }

    #[test]
    fn test_cache_disabled_has_no_dir() {
        let cache = CacheConfig {
            enabled: false,
            dir: Some(PathBuf::from("/tmp/x")),
        };
        assert_eq!(cache.resolved_dir(), None);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml("release_type = \"gigantic\"").unwrap_err();
        assert!(matches!(err, ReleaseError::Config(_)));
    }
}
