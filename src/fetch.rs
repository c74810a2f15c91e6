//! Per-package chart and changelog retrieval with an on-disk cache

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::domain::changelog::{self, Changelog};
use crate::domain::{ChartMetadata, PackageRecord};
use crate::error::{ReleaseError, Result};

/// Path of the chart metadata inside a package repository
pub const CHART_PATH: &str = "chart/Chart.yaml";

/// Path of the changelog inside a package repository
pub const CHANGELOG_PATH: &str = "CHANGELOG.md";

const CACHED_CHART: &str = "Chart.yaml";
const CACHED_CHANGELOG: &str = "CHANGELOG.md";

/// Retrieves a single file of a repository at a given ref
pub trait RawFetcher {
    /// Returns `Ok(None)` when the file does not exist at that ref
    fn fetch_raw(&self, repo_url: &str, reference: &str, path: &str) -> Result<Option<String>>;
}

/// Raw file URL on the forge.
///
/// `https://host/group/pkg.git` + `1.0.0` + `CHANGELOG.md` becomes
/// `https://host/group/pkg/-/raw/1.0.0/CHANGELOG.md`
pub fn raw_file_url(repo_url: &str, reference: &str, path: &str) -> String {
    let project = repo_url.strip_suffix(".git").unwrap_or(repo_url);
    format!(
        "{}/-/raw/{}/{}",
        project.trim_end_matches('/'),
        reference,
        path
    )
}

/// Fetches raw files over HTTP from the forge's `/-/raw/` endpoint
#[derive(Debug, Clone)]
pub struct HttpRawFetcher {
    client: Client,
}

impl HttpRawFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpRawFetcher { client })
    }
}

impl RawFetcher for HttpRawFetcher {
    fn fetch_raw(&self, repo_url: &str, reference: &str, path: &str) -> Result<Option<String>> {
        let url = raw_file_url(repo_url, reference, path);
        debug!(%url, "fetching raw file");

        let response = self.client.get(&url).send()?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            _ => Ok(Some(response.error_for_status()?.text()?)),
        }
    }
}

/// In-memory fetcher for tests, keyed by raw file URL
#[derive(Debug, Default)]
pub struct MockFetcher {
    files: HashMap<String, String>,
    requests: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(
        mut self,
        repo_url: &str,
        reference: &str,
        path: &str,
        contents: impl Into<String>,
    ) -> Self {
        self.files
            .insert(raw_file_url(repo_url, reference, path), contents.into());
        self
    }

    /// Register both the chart and the changelog of a package at `reference`
    pub fn with_package(
        self,
        repo_url: &str,
        reference: &str,
        chart: impl Into<String>,
        changelog: impl Into<String>,
    ) -> Self {
        self.with_file(repo_url, reference, CHART_PATH, chart)
            .with_file(repo_url, reference, CHANGELOG_PATH, changelog)
    }

    /// Number of `fetch_raw` calls served so far
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl RawFetcher for MockFetcher {
    fn fetch_raw(&self, repo_url: &str, reference: &str, path: &str) -> Result<Option<String>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .files
            .get(&raw_file_url(repo_url, reference, path))
            .cloned())
    }
}

/// Cached chart and normalized changelog of one package at one tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPackage {
    pub chart: String,
    pub changelog: String,
}

/// Directory-per-key cache of package sources, keyed `{name}_{tag}`.
///
/// An entry is complete once both files exist; incomplete entries are fetched
/// again. Files are written to a temporary name and renamed into place, so a
/// cached file is either absent or whole. Entries are never invalidated by age.
#[derive(Debug, Clone)]
pub struct PackageCache {
    root: PathBuf,
}

impl PackageCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        PackageCache { root: root.into() }
    }

    /// `~/.r2d2/cache`
    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".r2d2").join("cache"))
    }

    pub fn entry_dir(&self, name: &str, tag: &str) -> PathBuf {
        // refs may contain '/', which must not create nested directories
        self.root
            .join(format!("{}_{}", name, tag).replace(|c: char| c == '/' || c == '\\', "-"))
    }

    /// The cached entry, if both chart and changelog are present
    pub fn load(&self, name: &str, tag: &str) -> Result<Option<CachedPackage>> {
        let dir = self.entry_dir(name, tag);
        let chart_path = dir.join(CACHED_CHART);
        let changelog_path = dir.join(CACHED_CHANGELOG);

        if !(chart_path.exists() && changelog_path.exists()) {
            return Ok(None);
        }

        Ok(Some(CachedPackage {
            chart: fs::read_to_string(chart_path)?,
            changelog: fs::read_to_string(changelog_path)?,
        }))
    }

    pub fn store_chart(&self, name: &str, tag: &str, chart: &str) -> Result<()> {
        self.store(name, tag, CACHED_CHART, chart)
    }

    pub fn store_changelog(&self, name: &str, tag: &str, changelog: &str) -> Result<()> {
        self.store(name, tag, CACHED_CHANGELOG, changelog)
    }

    fn store(&self, name: &str, tag: &str, file: &str, contents: &str) -> Result<()> {
        let dir = self.entry_dir(name, tag);
        fs::create_dir_all(&dir)?;

        let partial = dir.join(format!(".{}.tmp", file));
        fs::write(&partial, contents)?;
        if let Err(e) = fs::rename(&partial, dir.join(file)) {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Parsed chart metadata and changelog of one package
#[derive(Debug, Clone, PartialEq)]
pub struct PackageData {
    pub chart: ChartMetadata,
    pub changelog: Changelog,
}

/// Load a package's chart and changelog at its pinned tag.
///
/// A complete cache entry short-circuits the network unless it no longer
/// parses, in which case it is fetched and written again. Fetched changelogs
/// are normalized before they are cached; the changelog is written last.
/// Cache write failures are logged and otherwise ignored.
pub fn fetch_package_data<F: RawFetcher + ?Sized>(
    fetcher: &F,
    cache: Option<&PackageCache>,
    pkg: &PackageRecord,
) -> Result<PackageData> {
    if let Some(cache) = cache {
        if let Some(cached) = cache.load(&pkg.name, &pkg.tag)? {
            match parse_package_sources(pkg, &cached.chart, &cached.changelog) {
                Ok(data) => {
                    debug!(package = %pkg.name, tag = %pkg.tag, "using cached package sources");
                    return Ok(data);
                }
                Err(e) => {
                    warn!(
                        package = %pkg.name,
                        tag = %pkg.tag,
                        error = %e,
                        "refetching unreadable cache entry"
                    );
                }
            }
        }
    }

    let chart = fetcher
        .fetch_raw(&pkg.repo_url, &pkg.tag, CHART_PATH)?
        .ok_or_else(|| ReleaseError::ChartNotFound {
            package: pkg.name.clone(),
            tag: pkg.tag.clone(),
        })?;
    if let Some(cache) = cache {
        if let Err(e) = cache.store_chart(&pkg.name, &pkg.tag, &chart) {
            warn!(package = %pkg.name, error = %e, "failed to cache chart");
        }
    }

    let raw_changelog = fetcher
        .fetch_raw(&pkg.repo_url, &pkg.tag, CHANGELOG_PATH)?
        .ok_or_else(|| ReleaseError::ChangelogNotFound {
            package: pkg.name.clone(),
            tag: pkg.tag.clone(),
        })?;
    let normalized = changelog::normalize(&raw_changelog);
    if let Some(cache) = cache {
        if let Err(e) = cache.store_changelog(&pkg.name, &pkg.tag, &normalized) {
            warn!(package = %pkg.name, error = %e, "failed to cache changelog");
        }
    }

    parse_package_sources(pkg, &chart, &normalized)
}

fn parse_package_sources(
    pkg: &PackageRecord,
    chart: &str,
    normalized_changelog: &str,
) -> Result<PackageData> {
    let chart = ChartMetadata::parse(chart).map_err(|e| match e {
        ReleaseError::Yaml(msg) => {
            ReleaseError::yaml(format!("{}@{} Chart.yaml: {}", pkg.name, pkg.tag, msg))
        }
        other => other,
    })?;
    let changelog = changelog::parse(normalized_changelog).map_err(|e| match e {
        ReleaseError::ChangelogParse(msg) => {
            ReleaseError::changelog(format!("{}@{}: {}", pkg.name, pkg.tag, msg))
        }
        other => other,
    })?;

    Ok(PackageData { chart, changelog })
}
