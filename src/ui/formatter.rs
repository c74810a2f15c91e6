//! Pure formatting functions for UI output.
//!
//! This module contains all display/formatting logic separated from user interaction.
//! Functions returning `String` are testable; the `display_*` wrappers print them.

use std::path::Path;

use console::style;

use crate::boundary::BoundaryWarning;
use crate::config::Step;
use crate::domain::{ReleaseIdentity, ReleaseVersion};

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Display a boundary warning to the user.
///
/// Shows a yellow warning icon followed by the warning message.
pub fn display_boundary_warning(warning: &BoundaryWarning) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), warning);
}

/// Summary of the release about to be prepared.
pub fn format_release_plan(
    previous: &ReleaseIdentity,
    next: &ReleaseIdentity,
    steps: &[Step],
) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", style("Release plan:").bold()));
    out.push_str(&format!(
        "  Previous: {} ({})\n",
        style(previous.tag.to_string()).red(),
        previous.branch_name
    ));
    out.push_str(&format!(
        "  Next:     {} ({})\n",
        style(next.tag.to_string()).green(),
        next.branch_name
    ));
    out.push_str("  Steps:\n");
    for step in steps {
        out.push_str(&format!("    - {}\n", step.description()));
    }
    out
}

pub fn display_release_plan(previous: &ReleaseIdentity, next: &ReleaseIdentity, steps: &[Step]) {
    println!("\n{}", format_release_plan(previous, next, steps));
}

/// Manual review checklist shown after version references were rewritten.
pub fn format_upgrade_instructions(
    bb_path: &Path,
    version: &ReleaseVersion,
    touched: &[String],
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n",
        style("Please review the changes to your local Big Bang and commit if correct").bold()
    ));
    for path in touched {
        out.push_str(&format!("  - {}\n", path));
    }
    out.push('\n');
    out.push_str(&format!("$ {}\n", style(format!("cd {}", bb_path.display())).yellow()));
    out.push_str(&format!("$ {}\n\n", style("git status").yellow()));
    out.push_str(&format!(
        "$ {}\n# Verify the above prints {}\n\n",
        style("yq \".spec.ref.tag\" base/gitrepository.yaml").yellow(),
        style(version).blue()
    ));
    out.push_str(&format!(
        "$ {}\n# Verify the above prints {}\n\n",
        style("yq \".version\" chart/Chart.yaml").yellow(),
        style(version).blue()
    ));
    out.push_str("Regenerate README.md with helm-docs before committing.\n\n");
    out.push_str(&format!(
        "Check the Big Bang MRs in the release notes to see if any packages have enabled\n\
         mTLS strict since last release, and update {} accordingly.\n",
        style("./Packages.md").blue()
    ));
    out
}

pub fn display_upgrade_instructions(bb_path: &Path, version: &ReleaseVersion, touched: &[String]) {
    println!("\n{}", format_upgrade_instructions(bb_path, version, touched));
}
