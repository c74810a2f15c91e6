use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a package is part of the core distribution or an optional addon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageType {
    Core,
    Addon,
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageType::Core => write!(f, "Core"),
            PackageType::Addon => write!(f, "Addon"),
        }
    }
}

/// A package pinned by the distribution manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub title: String,
    pub repo_url: String,
    /// Git ref the package is pinned to
    pub tag: String,
    pub package_type: PackageType,
    pub override_applied: bool,
}

impl PackageRecord {
    /// Build a record from the package's git source, deriving name and title from the repo URL
    pub fn from_git_source(
        repo_url: impl Into<String>,
        tag: impl Into<String>,
        package_type: PackageType,
    ) -> Self {
        let repo_url = repo_url.into();
        let name = package_name_from_repo(&repo_url);
        let title = title_from_name(&name);

        PackageRecord {
            name,
            title,
            repo_url,
            tag: tag.into(),
            package_type,
            override_applied: false,
        }
    }

    /// Browsable project URL (repo URL without the `.git` suffix)
    pub fn web_url(&self) -> &str {
        self.repo_url
            .strip_suffix(".git")
            .unwrap_or(&self.repo_url)
    }
}

/// Last path segment of the repo URL up to its first `.`
///
/// `https://repo1.dso.mil/big-bang/product/packages/istio-controlplane.git` -> `istio-controlplane`
pub fn package_name_from_repo(repo_url: &str) -> String {
    let last_segment = repo_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(repo_url);

    last_segment
        .split('.')
        .next()
        .unwrap_or(last_segment)
        .to_string()
}

/// Human-readable title: dashes become spaces and every word is title-cased.
///
/// A letter is upper-cased when it follows a non-letter and lower-cased otherwise.
pub fn title_from_name(name: &str) -> String {
    let mut title = String::with_capacity(name.len());
    let mut previous_is_letter = false;

    for c in name.replace('-', " ").chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                title.extend(c.to_lowercase());
            } else {
                title.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            title.push(c);
            previous_is_letter = false;
        }
    }

    title
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_name_from_repo() {
        assert_eq!(
            package_name_from_repo(
                "https://repo1.dso.mil/big-bang/product/packages/istio-controlplane.git"
            ),
            "istio-controlplane"
        );
        assert_eq!(
            package_name_from_repo("https://repo1.dso.mil/platform-one/big-bang/apps/kyverno"),
            "kyverno"
        );
    }

    #[test]
    fn test_title_from_name() {
        assert_eq!(title_from_name("istio-controlplane"), "Istio Controlplane");
        assert_eq!(title_from_name("eck-operator"), "Eck Operator");
        assert_eq!(title_from_name("ARGOCD"), "Argocd");
        assert_eq!(title_from_name("k8s-tools"), "K8S Tools");
    }

    #[test]
    fn test_from_git_source() {
        let pkg = PackageRecord::from_git_source(
            "https://repo1.dso.mil/big-bang/apps/core/kiali.git",
            "1.60.0-bb.0",
            PackageType::Core,
        );
        assert_eq!(pkg.name, "kiali");
        assert_eq!(pkg.title, "Kiali");
        assert_eq!(pkg.web_url(), "https://repo1.dso.mil/big-bang/apps/core/kiali");
        assert!(!pkg.override_applied);
    }
}
