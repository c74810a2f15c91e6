//! Package manifest snapshots and the diff between two of them

use std::collections::HashMap;
use std::fmt;

use serde_yaml::Value;
use tracing::{debug, warn};

use crate::domain::package::{PackageRecord, PackageType};
use crate::error::{ReleaseError, Result};

/// Packages declared by the distribution's values file at one revision.
///
/// Iteration follows manifest order: core packages as they appear at the top
/// level, then the entries under `addons`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestSnapshot {
    packages: Vec<PackageRecord>,
    index: HashMap<String, usize>,
}

impl ManifestSnapshot {
    /// Build a snapshot from records; a repeated name replaces the earlier record in place
    pub fn from_records(records: impl IntoIterator<Item = PackageRecord>) -> Self {
        let mut snapshot = ManifestSnapshot::default();
        for record in records {
            snapshot.insert(record);
        }
        snapshot
    }

    /// Parse the `chart/values.yaml` of the distribution
    pub fn from_values_yaml(text: &str) -> Result<Self> {
        let values: Value = serde_yaml::from_str(text)?;
        let mapping = values
            .as_mapping()
            .ok_or_else(|| ReleaseError::yaml("values file is not a mapping"))?;

        let mut snapshot = ManifestSnapshot::default();

        for (key, value) in mapping {
            if let Some(record) = git_package(key, value, PackageType::Core) {
                snapshot.insert(record);
            }
        }

        if let Some(addons) = values.get("addons").and_then(Value::as_mapping) {
            for (key, value) in addons {
                if let Some(record) = git_package(key, value, PackageType::Addon) {
                    snapshot.insert(record);
                }
            }
        }

        debug!(packages = snapshot.len(), "parsed manifest snapshot");
        Ok(snapshot)
    }

    fn insert(&mut self, record: PackageRecord) {
        match self.index.get(&record.name) {
            Some(&position) => self.packages[position] = record,
            None => {
                self.index.insert(record.name.clone(), self.packages.len());
                self.packages.push(record);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.index.get(name).map(|&position| &self.packages[position])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageRecord> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Extract a package from a `{ git: { repo, tag } }` block, if the value is one
fn git_package(key: &Value, value: &Value, package_type: PackageType) -> Option<PackageRecord> {
    let git = value.get("git")?;
    let repo = git.get("repo").and_then(Value::as_str)?;

    let tag = git
        .get("tag")
        .or_else(|| git.get("branch"))
        .and_then(Value::as_str);

    match tag {
        Some(tag) => Some(PackageRecord::from_git_source(repo, tag, package_type)),
        None => {
            warn!(
                key = key.as_str().unwrap_or("?"),
                repo, "package has neither a git tag nor a branch, ignoring"
            );
            None
        }
    }
}

/// How a current package relates to the previous snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffClassification {
    New,
    Updated { previous_tag: String },
    Unchanged,
}

impl DiffClassification {
    /// Badge label shown in the packages table, if any
    pub fn label(&self) -> Option<&'static str> {
        match self {
            DiffClassification::New => Some("New"),
            DiffClassification::Updated { .. } => Some("Updated"),
            DiffClassification::Unchanged => None,
        }
    }
}

impl fmt::Display for DiffClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffClassification::New => write!(f, "New"),
            DiffClassification::Updated { .. } => write!(f, "Updated"),
            DiffClassification::Unchanged => write!(f, "Unchanged"),
        }
    }
}

/// Classification of every package in the current snapshot, in manifest order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDiff {
    entries: Vec<(String, DiffClassification)>,
}

impl ManifestDiff {
    pub fn get(&self, name: &str) -> Option<&DiffClassification> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, classification)| classification)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DiffClassification)> {
        self.entries
            .iter()
            .map(|(name, classification)| (name.as_str(), classification))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Classify every current package against the previous snapshot by tag equality.
///
/// Packages only present in `previous` do not appear; see [`removed_packages`].
pub fn diff(current: &ManifestSnapshot, previous: &ManifestSnapshot) -> ManifestDiff {
    let entries = current
        .iter()
        .map(|pkg| {
            let classification = match previous.get(&pkg.name) {
                None => DiffClassification::New,
                Some(old) if old.tag != pkg.tag => DiffClassification::Updated {
                    previous_tag: old.tag.clone(),
                },
                Some(_) => DiffClassification::Unchanged,
            };
            (pkg.name.clone(), classification)
        })
        .collect();

    ManifestDiff { entries }
}

/// Names of packages present in `previous` but gone from `current`, in previous order
pub fn removed_packages(current: &ManifestSnapshot, previous: &ManifestSnapshot) -> Vec<String> {
    previous
        .iter()
        .filter(|pkg| !current.contains(&pkg.name))
        .map(|pkg| pkg.name.clone())
        .collect()
}
