//! Keep-a-Changelog dialect normalization and parsing
//!
//! Package changelogs are only loosely compliant: release headers often lack a
//! date and releases are sometimes separated by horizontal rules. Documents are
//! first normalized into a strict form (headers and bullets only, every release
//! header dated) and then parsed into an ordered list of releases.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ReleaseError, Result};

/// Date appended to release headers that carry none; stripped again on render
pub const SENTINEL_DATE: &str = "1970-01-01";

fn horizontal_rule() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^ {0,3}(?:(?:-[ \t]*){3,}|(?:\*[ \t]*){3,}|(?:_[ \t]*){3,})$")
            .expect("horizontal rule pattern is valid")
    })
}

fn release_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid"))
}

/// Rewrites a raw changelog into the strict dialect.
///
/// Separator lines are dropped, undated `## ` headers get the sentinel date,
/// and everything that is neither a header nor a bullet is discarded. The
/// retained lines are joined with a blank line between them.
pub fn normalize(raw: &str) -> String {
    raw.lines()
        .filter(|line| !horizontal_rule().is_match(line))
        .map(|line| {
            if line.starts_with("## ") && line.split('-').count() <= 3 {
                format!("{} - {}", line.trim_end(), SENTINEL_DATE)
            } else {
                line.to_string()
            }
        })
        .filter(|line| line.starts_with('#') || line.starts_with('-'))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Change lines grouped under one category header (e.g. "Added")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSection {
    /// `None` for entries listed before any category header
    pub category: Option<String>,
    pub entries: Vec<String>,
}

/// One release of a changelog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogRelease {
    pub version: String,
    pub release_date: Option<String>,
    pub sections: Vec<ChangeSection>,
}

impl ChangelogRelease {
    fn new(version: String, release_date: Option<String>) -> Self {
        ChangelogRelease {
            version,
            release_date,
            sections: Vec::new(),
        }
    }

    /// Whether this release is the one tagged `tag`
    pub fn matches_tag(&self, tag: &str) -> bool {
        version_key(&self.version) == version_key(tag)
    }

    fn push_entry(&mut self, entry: String) {
        match self.sections.last_mut() {
            Some(section) => section.entries.push(entry),
            None => self.sections.push(ChangeSection {
                category: None,
                entries: vec![entry],
            }),
        }
    }
}

/// Parsed changelog, newest release first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changelog {
    releases: Vec<ChangelogRelease>,
}

impl Changelog {
    /// Normalize and parse a raw changelog
    pub fn from_raw(raw: &str) -> Result<Self> {
        parse(&normalize(raw))
    }

    pub fn releases(&self) -> &[ChangelogRelease] {
        &self.releases
    }

    pub fn get(&self, tag: &str) -> Option<&ChangelogRelease> {
        self.releases.iter().find(|release| release.matches_tag(tag))
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// Releases newer than `stop_tag`, newest first.
    ///
    /// When `stop_tag` is not in the changelog every release is returned.
    pub fn slice_between(&self, stop_tag: &str) -> Vec<&ChangelogRelease> {
        self.releases
            .iter()
            .take_while(|release| !release.matches_tag(stop_tag))
            .collect()
    }
}

/// Parse a normalized changelog document
pub fn parse(normalized: &str) -> Result<Changelog> {
    let mut releases: Vec<ChangelogRelease> = Vec::new();

    for (number, line) in normalized.lines().enumerate() {
        let line_number = number + 1;

        if let Some(header) = line.strip_prefix('#') {
            let depth = 1 + header.chars().take_while(|c| *c == '#').count();
            let text = header.trim_start_matches('#').trim();

            match depth {
                1 => {}
                2 => releases.push(parse_release_header(text, line_number)?),
                _ => {
                    let release = releases.last_mut().ok_or_else(|| {
                        ReleaseError::changelog(format!(
                            "line {}: category '{}' before the first release header",
                            line_number, text
                        ))
                    })?;
                    release.sections.push(ChangeSection {
                        category: Some(text.to_string()),
                        entries: Vec::new(),
                    });
                }
            }
        } else if let Some(entry) = line.strip_prefix('-') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let release = releases.last_mut().ok_or_else(|| {
                ReleaseError::changelog(format!(
                    "line {}: entry '{}' before the first release header",
                    line_number, entry
                ))
            })?;
            release.push_entry(entry.to_string());
        }
    }

    Ok(Changelog { releases })
}

fn parse_release_header(text: &str, line_number: usize) -> Result<ChangelogRelease> {
    let mut tokens = text.split_whitespace();

    let version = tokens
        .next()
        .map(bracketed_version)
        .filter(|version| !version.is_empty() && version.chars().any(|c| c != '-'))
        .ok_or_else(|| {
            ReleaseError::changelog(format!(
                "line {}: release header without a version",
                line_number
            ))
        })?;

    let remainder: Vec<&str> = tokens.filter(|token| *token != "-").collect();
    if remainder.is_empty() {
        return Ok(ChangelogRelease::new(version.to_string(), None));
    }

    let date = remainder
        .iter()
        .find(|token| release_date().is_match(token))
        .ok_or_else(|| {
            ReleaseError::changelog(format!(
                "line {}: release header for {} has no valid date ('{}')",
                line_number,
                version,
                remainder.join(" ")
            ))
        })?;

    Ok(ChangelogRelease::new(
        version.to_string(),
        Some(date.to_string()),
    ))
}

/// `[1.2.3](link)` -> `1.2.3`, `[1.2.3]` -> `1.2.3`, `1.2.3` -> `1.2.3`
fn bracketed_version(token: &str) -> &str {
    match token.strip_prefix('[') {
        Some(rest) => rest.split(']').next().unwrap_or(rest),
        None => token,
    }
}

/// Comparison key for release versions and package tags
fn version_key(version: &str) -> &str {
    let version = bracketed_version(version.trim());
    version.strip_prefix('v').unwrap_or(version)
}

/// Render releases back to Markdown, with the sentinel date stripped out
pub fn render_releases(releases: &[&ChangelogRelease]) -> String {
    let mut blocks = Vec::with_capacity(releases.len());

    for release in releases {
        let mut lines = Vec::new();

        match &release.release_date {
            Some(date) => lines.push(format!("## [{}] - {}", release.version, date)),
            None => lines.push(format!("## [{}]", release.version)),
        }

        for section in &release.sections {
            if let Some(category) = &section.category {
                lines.push(format!("### {}", category));
            }
            for entry in &section.entries {
                lines.push(format!("- {}", entry));
            }
        }

        blocks.push(lines.join("\n"));
    }

    strip_sentinel(&blocks.join("\n\n"))
}

/// Remove every inserted sentinel date from rendered text
pub fn strip_sentinel(text: &str) -> String {
    text.replace(&format!(" - {}", SENTINEL_DATE), "")
        .replace(SENTINEL_DATE, "")
}
