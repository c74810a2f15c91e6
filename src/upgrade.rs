//! In-place rewrite of the distribution's own version references.
//!
//! Edits touch a single line so comments, key order and indentation of the
//! surrounding document survive.

use crate::domain::ReleaseVersion;
use crate::error::{ReleaseError, Result};
use crate::git::WorkingCopy;

pub const GITREPOSITORY_PATH: &str = "base/gitrepository.yaml";
pub const CHART_PATH: &str = "chart/Chart.yaml";

/// Set `spec.ref.tag` of a Flux `GitRepository` document
pub fn update_gitrepository_tag(text: &str, tag: &str) -> Result<String> {
    set_scalar(text, &["spec", "ref", "tag"], tag)
}

/// Set the top-level `version` of a Helm chart
pub fn update_chart_version(text: &str, version: &str) -> Result<String> {
    set_scalar(text, &["version"], version)
}

/// Rewrite both references on the checked-out branch.
///
/// Returns the paths that were written.
pub fn upgrade_version_references<W: WorkingCopy + ?Sized>(
    working_copy: &W,
    version: &ReleaseVersion,
) -> Result<Vec<String>> {
    let version = version.to_string();
    let mut touched = Vec::new();

    let gitrepository = working_copy.read_file(GITREPOSITORY_PATH)?;
    let updated = update_gitrepository_tag(&gitrepository, &version)
        .map_err(|e| in_file(GITREPOSITORY_PATH, e))?;
    working_copy.write_file(GITREPOSITORY_PATH, &updated)?;
    touched.push(GITREPOSITORY_PATH.to_string());

    let chart = working_copy.read_file(CHART_PATH)?;
    let updated = update_chart_version(&chart, &version).map_err(|e| in_file(CHART_PATH, e))?;
    working_copy.write_file(CHART_PATH, &updated)?;
    touched.push(CHART_PATH.to_string());

    Ok(touched)
}

fn in_file(path: &str, err: ReleaseError) -> ReleaseError {
    match err {
        ReleaseError::Yaml(msg) => ReleaseError::yaml(format!("{}: {}", path, msg)),
        other => other,
    }
}

fn set_scalar(text: &str, path: &[&str], value: &str) -> Result<String> {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let mut start = 0;
    let mut end = lines.len();

    for (depth, key) in path.iter().enumerate() {
        let found = find_key(&lines[start..end], key, depth == 0)
            .map(|offset| start + offset)
            .ok_or_else(|| {
                ReleaseError::yaml(format!("key '{}' not found", path[..=depth].join(".")))
            })?;

        if depth + 1 == path.len() {
            lines[found] = replace_value(&lines[found], key, value)?;
        } else {
            let indent = indent_of(&lines[found]);
            start = found + 1;
            end = block_end(&lines, start, indent);
        }
    }

    let mut out = lines.join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }

    // the edit must leave a loadable document
    serde_yaml::from_str::<serde_yaml::Value>(&out)?;
    Ok(out)
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn is_content(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

/// Index of `key:` among the direct children of a block
fn find_key(block: &[String], key: &str, top_level: bool) -> Option<usize> {
    let child_indent = if top_level {
        0
    } else {
        block.iter().find(|line| is_content(line)).map(|line| indent_of(line))?
    };

    block.iter().position(|line| {
        if !is_content(line) || indent_of(line) != child_indent {
            return false;
        }
        line.trim_start()
            .strip_prefix(key)
            .and_then(|rest| rest.strip_prefix(':'))
            .map_or(false, |rest| {
                rest.is_empty() || rest.starts_with(|c: char| c == ' ' || c == '\t')
            })
    })
}

/// First line after `start` that leaves the block opened at `indent`
fn block_end(lines: &[String], start: usize, indent: usize) -> usize {
    lines[start..]
        .iter()
        .position(|line| {
            line.starts_with("---") || (is_content(line) && indent_of(line) <= indent)
        })
        .map_or(lines.len(), |offset| start + offset)
}

fn replace_value(line: &str, key: &str, value: &str) -> Result<String> {
    let indent = &line[..indent_of(line)];
    let rest = line.trim_start()[key.len() + 1..].trim();

    let (current, comment) = match rest.find(" #") {
        Some(idx) => (rest[..idx].trim_end(), Some(&rest[idx..])),
        None if rest.starts_with('#') => ("", Some(rest)),
        None => (rest, None),
    };
    if current.is_empty() {
        return Err(ReleaseError::yaml(format!("key '{}' is not a scalar", key)));
    }

    let quoted = match current.chars().next() {
        Some('"') => format!("\"{}\"", value),
        Some('\'') => format!("'{}'", value),
        _ => value.to_string(),
    };

    let mut out = format!("{}{}: {}", indent, key, quoted);
    if let Some(comment) = comment {
        out.push(' ');
        out.push_str(comment.trim_start());
    }
    Ok(out)
}
