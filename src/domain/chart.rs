use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::Result;

/// Chart annotation listing the upstream application versions of a package
pub const APPLICATION_VERSIONS_ANNOTATION: &str = "bigbang.dev/applicationVersions";

/// The parts of a package's `Chart.yaml` the release notes need
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ChartMetadata {
    #[serde(default)]
    pub annotations: BTreeMap<String, serde_yaml::Value>,
}

impl ChartMetadata {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Raw `name: version` lines of the application versions annotation
    pub fn application_versions(&self) -> &str {
        self.annotations
            .get(APPLICATION_VERSIONS_ANNOTATION)
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or("")
    }
}

/// Formats the application versions annotation for display.
///
/// A single pair shows only the quoted version; several pairs keep their names:
///
/// ```
/// use bb_release::domain::chart::format_app_versions;
///
/// assert_eq!(format_app_versions("- foo: v1.2.3"), ["`1.2.3`"]);
/// assert_eq!(
///     format_app_versions("- a: v1.0.0\n- b: v2.0.0"),
///     ["a `1.0.0`", "b `2.0.0`"]
/// );
/// ```
pub fn format_app_versions(raw: &str) -> Vec<String> {
    let pairs: Vec<(&str, &str)> = raw
        .lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix("- ").unwrap_or(line)
        })
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(name, version)| {
            let version = version.trim();
            (name.trim(), version.strip_prefix('v').unwrap_or(version))
        })
        .collect();

    if pairs.len() == 1 {
        return vec![format!("`{}`", pairs[0].1)];
    }

    pairs
        .into_iter()
        .map(|(name, version)| format!("{} `{}`", name, version))
        .collect()
}
