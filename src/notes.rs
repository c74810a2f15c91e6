//! Release note rendering
//!
//! Combines the manifest diff, per-package chart metadata and changelog
//! slices into the Markdown document published with a release. Output is a
//! pure function of its inputs: packages are visited in manifest order and
//! nothing time- or environment-dependent is written.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::boundary::BoundaryWarning;
use crate::config::{Config, PackageOverride};
use crate::domain::changelog::{self, strip_sentinel};
use crate::domain::manifest::{self, DiffClassification};
use crate::domain::{format_app_versions, ManifestSnapshot, PackageRecord, PackageType};
use crate::domain::{ReleaseIdentity, ReleaseVersion};
use crate::error::Result;
use crate::fetch::{fetch_package_data, PackageCache, RawFetcher};
use crate::forge::ChangeRequest;

const BADGE_BASE: &str = "https://img.shields.io/badge";
const TABLE_HEADERS: [&str; 4] = ["Package", "Type", "Package Version", "BB Version"];

/// `release-notes-{major}-{minor}-{patch}.md`
pub fn notes_file_name(version: &ReleaseVersion) -> String {
    format!(
        "release-notes-{}-{}-{}.md",
        version.major(),
        version.minor(),
        version.patch()
    )
}

/// A package whose pinned tag moved since the previous release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradedPackage {
    pub name: String,
    pub title: String,
    pub url: String,
    pub tag: String,
    pub last_tag: String,
    pub package_type: PackageType,
}

/// Changelog entries of one package between two releases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogDiff {
    pub title: String,
    pub body: String,
}

/// Everything the renderer needs besides package sources
#[derive(Debug, Clone, Copy)]
pub struct NotesInput<'a> {
    pub previous: &'a ReleaseIdentity,
    pub next: &'a ReleaseIdentity,
    pub current: &'a ManifestSnapshot,
    pub previous_snapshot: &'a ManifestSnapshot,
    /// Change requests merged into the next release's milestone
    pub change_requests: &'a [ChangeRequest],
}

/// The rendered document and what was learned while building it
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedNote {
    pub file_name: String,
    pub content: String,
    pub upgraded_packages: Vec<UpgradedPackage>,
    pub warnings: Vec<BoundaryWarning>,
}

impl RenderedNote {
    /// `name@tag` of every package left out of the notes
    pub fn skipped_packages(&self) -> Vec<String> {
        self.warnings
            .iter()
            .filter_map(|warning| match warning {
                BoundaryWarning::PackageSkipped { package, tag, .. } => {
                    Some(format!("{}@{}", package, tag))
                }
                _ => None,
            })
            .collect()
    }

    /// Write the document into `dir`, replacing any previous file of the same name
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.content)?;
        Ok(path)
    }
}

/// Renders release notes, fetching package sources through `fetcher` and `cache`
pub struct ReleaseNoteRenderer<'a, F: RawFetcher + ?Sized> {
    fetcher: &'a F,
    cache: Option<&'a PackageCache>,
    overrides: &'a BTreeMap<String, PackageOverride>,
    beta_list: &'a BTreeSet<String>,
}

impl<'a, F: RawFetcher + ?Sized> ReleaseNoteRenderer<'a, F> {
    pub fn new(fetcher: &'a F, cache: Option<&'a PackageCache>, config: &'a Config) -> Self {
        ReleaseNoteRenderer {
            fetcher,
            cache,
            overrides: &config.package_overrides,
            beta_list: &config.beta_list,
        }
    }

    pub fn render(&self, input: &NotesInput<'_>) -> RenderedNote {
        let diff = manifest::diff(input.current, input.previous_snapshot);
        let mut warnings = Vec::new();

        let removed = manifest::removed_packages(input.current, input.previous_snapshot);
        if !removed.is_empty() {
            warnings.push(BoundaryWarning::RemovedPackages { names: removed });
        }

        let mut rows = Vec::new();
        let mut upgraded_packages = Vec::new();
        let mut changelog_diffs: Vec<ChangelogDiff> = Vec::new();

        for pkg in input.current.iter() {
            let classification = diff
                .get(&pkg.name)
                .cloned()
                .unwrap_or(DiffClassification::New);
            match &classification {
                DiffClassification::New => info!(package = %pkg.name, "new package"),
                DiffClassification::Updated { previous_tag } => {
                    info!(
                        package = %pkg.name,
                        from = %previous_tag,
                        to = %pkg.tag,
                        "package changed"
                    )
                }
                DiffClassification::Unchanged => debug!(package = %pkg.name, "package unchanged"),
            }

            let data = match fetch_package_data(self.fetcher, self.cache, pkg) {
                Ok(data) => data,
                Err(e) => {
                    warn!(package = %pkg.name, tag = %pkg.tag, error = %e, "skipping package");
                    warnings.push(BoundaryWarning::PackageSkipped {
                        package: pkg.name.clone(),
                        tag: pkg.tag.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let display = self.apply_override(pkg, &mut warnings);
            let app_versions = format_app_versions(data.chart.application_versions());

            let mut package_cell = format!("[{}]({})", display.title, display.web_url());
            if let Some(label) = classification.label() {
                package_cell = format!("{} {}", badge(label, "informational"), package_cell);
            }
            if self.beta_list.contains(&pkg.name) {
                package_cell = format!("{} {}", package_cell, badge("BETA", "purple"));
            }
            rows.push([
                package_cell,
                display.package_type.to_string(),
                app_versions.join(" "),
                format!("`{}`", display.tag),
            ]);

            if let DiffClassification::Updated { previous_tag } = &classification {
                upgraded_packages.push(UpgradedPackage {
                    name: display.name.clone(),
                    title: display.title.clone(),
                    url: display.web_url().to_string(),
                    tag: display.tag.clone(),
                    last_tag: previous_tag.clone(),
                    package_type: display.package_type,
                });

                let slice = data.changelog.slice_between(previous_tag);
                let body = changelog::render_releases(&slice);
                match changelog_diffs.iter_mut().find(|d| d.title == display.title) {
                    Some(existing) => existing.body = body,
                    None => changelog_diffs.push(ChangelogDiff {
                        title: display.title.clone(),
                        body,
                    }),
                }
            }
        }

        let content = render_document(
            input,
            &render_table(&rows),
            &changelog_diffs,
            &upgraded_packages,
        );

        RenderedNote {
            file_name: notes_file_name(&input.next.tag),
            content,
            upgraded_packages,
            warnings,
        }
    }

    /// Substitute the display name, then look the title up under the new name
    fn apply_override(
        &self,
        pkg: &PackageRecord,
        warnings: &mut Vec<BoundaryWarning>,
    ) -> PackageRecord {
        let mut display = pkg.clone();
        let renamed = match self.overrides.get(&pkg.name) {
            Some(renamed) => renamed,
            None => return display,
        };

        display.name = renamed.name.clone();
        display.override_applied = true;
        match self.overrides.get(&display.name) {
            Some(entry) => display.title = entry.title.clone(),
            None => warnings.push(BoundaryWarning::TitleOverrideMissing {
                original: pkg.name.clone(),
                renamed: display.name.clone(),
            }),
        }
        display
    }
}

fn badge(label: &str, color: &str) -> String {
    format!(
        "![{}]({}/{}-{}?style=flat-square)",
        label, BADGE_BASE, label, color
    )
}

/// GitHub-flavoured pipe table, columns padded to their widest cell
fn render_table(rows: &[[String; 4]]) -> String {
    // headers carry two extra columns of padding
    let mut widths: Vec<usize> = TABLE_HEADERS
        .iter()
        .map(|header| header.chars().count() + 2)
        .collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(table_row(TABLE_HEADERS.iter().copied(), &widths));
    let separator: Vec<String> = widths.iter().map(|width| "-".repeat(width + 2)).collect();
    lines.push(format!("|{}|", separator.join("|")));
    for row in rows {
        lines.push(table_row(row.iter().map(String::as_str), &widths));
    }
    lines.join("\n")
}

fn table_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths.iter())
        .map(|(cell, width)| format!(" {:<width$} ", cell, width = width))
        .collect();
    format!("|{}|", padded.join("|"))
}

fn render_document(
    input: &NotesInput<'_>,
    table: &str,
    changelog_diffs: &[ChangelogDiff],
    upgraded_packages: &[UpgradedPackage],
) -> String {
    let previous = &input.previous.tag;
    let next = &input.next.tag;
    let mut out = String::new();

    out.push_str(&format!("# Release Notes - {}\n\n", next));

    out.push_str("## Upgrade Summary\n\n");
    out.push_str(&format!(
        "Big Bang `{}` upgrades from `{}` (`{}` follows `{}`).\n\n",
        next, previous, input.next.branch_name, input.previous.branch_name
    ));

    out.push_str("## Packages\n\n");
    out.push_str(table);
    out.push_str("\n\n");

    out.push_str("## Merge Requests\n\n");
    if input.change_requests.is_empty() {
        out.push_str(&format!("No merge requests were merged for milestone {}.\n\n", next));
    } else {
        for cr in input.change_requests {
            out.push_str(&format!("- [!{}]({}) {}\n", cr.iid, cr.web_url, cr.title));
        }
        out.push('\n');
    }

    out.push_str("## Package Changelogs\n\n");
    if changelog_diffs.is_empty() {
        out.push_str("No package changelogs for this release.\n\n");
    } else {
        for diff in changelog_diffs {
            out.push_str(&format!("### {}\n\n", diff.title));
            if !diff.body.is_empty() {
                // demote package release headers below the package heading
                for line in diff.body.lines() {
                    if line.starts_with('#') {
                        out.push_str("##");
                    }
                    out.push_str(line);
                    out.push('\n');
                }
                out.push('\n');
            }
        }
    }

    out.push_str("## Upgrade Notices\n\n");
    if upgraded_packages.is_empty() {
        out.push_str("No packages were upgraded in this release.\n");
    } else {
        for pkg in upgraded_packages {
            out.push_str(&format!(
                "- **{}** ({}): `{}` → `{}` ([compare]({}/-/compare/{}...{}))\n",
                pkg.title, pkg.package_type, pkg.last_tag, pkg.tag, pkg.url, pkg.last_tag, pkg.tag
            ));
        }
    }

    strip_sentinel(&out)
}
