//! Main workflow orchestration logic
//!
//! Sequences the release steps against injected collaborators so the whole
//! run can be driven from tests with in-memory fakes. CLI argument parsing
//! stays in `main.rs`.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::boundary::BoundaryWarning;
use crate::config::{Config, Step};
use crate::domain::release::{resolve_next, resolve_previous, verify_previous_release};
use crate::domain::{ManifestSnapshot, PreviousRelease, ReleaseIdentity, VersionBump};
use crate::error::{ReleaseError, Result};
use crate::fetch::{PackageCache, RawFetcher};
use crate::forge::{ForgeError, SourceForge};
use crate::git::{WorkingCopy, VALUES_PATH};
use crate::notes::{NotesInput, ReleaseNoteRenderer};
use crate::ui::{self, Prompt};
use crate::upgrade;

/// Arguments for the release workflow
///
/// Mirrors the CLI Args but in a format suitable for orchestration logic.
/// Every `Option` left as `None` falls back to the configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReleaseWorkflowArgs {
    pub release_type: Option<VersionBump>,

    pub steps: Option<Vec<Step>>,

    /// Skip confirmation prompts
    pub assume_yes: bool,

    /// Print the notes instead of writing them; create and rewrite nothing
    pub dry_run: bool,
}

/// Result of a successful release workflow
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowResult {
    pub previous: ReleaseIdentity,
    pub next: ReleaseIdentity,
    pub release_branch: String,

    /// Where the notes were written, `None` when not built or on dry run
    pub notes_path: Option<PathBuf>,

    /// `name@tag` of packages left out of the notes
    pub skipped_packages: Vec<String>,

    /// Names of packages whose tag moved since the previous release
    pub upgraded_packages: Vec<String>,

    /// Files rewritten by the version reference upgrade
    pub updated_references: Vec<String>,

    pub warnings: Vec<BoundaryWarning>,
}

/// Main release workflow
///
/// Orchestrates the release:
/// 1. Require a clean working copy, check out and pull the default branch
/// 2. Authenticate against the forge
/// 3. Resolve previous and next release identities
/// 4. Run the selected steps in fixed order
///
/// A declined confirmation ends the run with [ReleaseError::Cancelled].
pub fn run_release_workflow<S, W, F, P>(
    args: &ReleaseWorkflowArgs,
    config: &Config,
    forge: &S,
    working_copy: &W,
    fetcher: &F,
    prompt: &P,
) -> Result<WorkflowResult>
where
    S: SourceForge + ?Sized,
    W: WorkingCopy + ?Sized,
    F: RawFetcher + ?Sized,
    P: Prompt + ?Sized,
{
    let steps = selected_steps(args, config)?;
    let interactive = config.interactive && !args.assume_yes;
    let release_type = args.release_type.unwrap_or(config.release_type);

    if working_copy.is_dirty()? {
        return Err(ReleaseError::DirtyWorkingCopy(
            working_copy.path().display().to_string(),
        ));
    }
    working_copy.checkout_ref(&config.default_branch)?;
    working_copy.pull()?;
    ui::display_success(&format!(
        "Switched to {} at {}",
        config.default_branch,
        working_copy.path().display()
    ));

    if !forge.authenticate()? {
        return Err(ForgeError::AuthFailed(format!(
            "invalid token for {} (project {})",
            config.forge.url, config.forge.project_id
        ))
        .into());
    }
    ui::display_success("Authenticated with the forge");

    let history = forge.list_releases()?;
    let previous = resolve_previous(&history, &config.prerelease_marker)?;
    let next = resolve_next(&previous.identity, release_type);
    ui::display_release_plan(&previous.identity, &next, &steps);

    let mut warnings = Vec::new();

    if steps.contains(&Step::CheckLastRelease) {
        check_last_release(forge, &previous, interactive, prompt, &mut warnings)?;
    }

    let needs_checkout =
        steps.contains(&Step::BuildReleaseNotes) || steps.contains(&Step::UpgradeVersionReferences);
    let release_branch = next.branch_name.clone();
    let current_ref = if steps.contains(&Step::CreateReleaseBranch) {
        prepare_release_branch(
            args,
            config,
            forge,
            working_copy,
            &release_branch,
            interactive,
            prompt,
        )?
    } else {
        if needs_checkout && !forge.branch_exists(&release_branch)? {
            return Err(ReleaseError::BranchNotFound(release_branch));
        }
        release_branch.clone()
    };

    let mut result = WorkflowResult {
        previous: previous.identity.clone(),
        next: next.clone(),
        release_branch,
        notes_path: None,
        skipped_packages: Vec::new(),
        upgraded_packages: Vec::new(),
        updated_references: Vec::new(),
        warnings: Vec::new(),
    };

    if steps.contains(&Step::BuildReleaseNotes) {
        working_copy.checkout_ref(&current_ref)?;
        let current = ManifestSnapshot::from_values_yaml(&working_copy.read_file(VALUES_PATH)?)?;
        ui::display_success(&format!("Read packages from {}", current_ref));

        let previous_tag = &previous.record.tag_name;
        working_copy.checkout_ref(previous_tag)?;
        let previous_snapshot =
            ManifestSnapshot::from_values_yaml(&working_copy.read_file(VALUES_PATH)?)?;
        ui::display_success(&format!("Read packages from {}", previous_tag));

        working_copy.checkout_ref(&current_ref)?;

        let change_requests = forge.list_merged_change_requests(&next.tag.to_string())?;
        debug!(count = change_requests.len(), "merged change requests");

        let cache = config.cache.resolved_dir().map(PackageCache::new);
        let renderer = ReleaseNoteRenderer::new(fetcher, cache.as_ref(), config);
        let note = renderer.render(&NotesInput {
            previous: &previous.identity,
            next: &next,
            current: &current,
            previous_snapshot: &previous_snapshot,
            change_requests: &change_requests,
        });

        for warning in &note.warnings {
            ui::display_boundary_warning(warning);
        }

        if args.dry_run {
            println!("{}", note.content);
        } else {
            let path = note.write_to(&config.output_dir)?;
            ui::display_success(&format!("Release notes written to {}", path.display()));
            result.notes_path = Some(path);
        }

        result.skipped_packages = note.skipped_packages();
        result.upgraded_packages = note
            .upgraded_packages
            .iter()
            .map(|pkg| pkg.name.clone())
            .collect();
        warnings.extend(note.warnings);
    }

    if steps.contains(&Step::UpgradeVersionReferences) {
        working_copy.checkout_ref(&current_ref)?;
        if args.dry_run {
            ui::display_status(&format!(
                "Dry run: would set {} and {} to {}",
                upgrade::GITREPOSITORY_PATH,
                upgrade::CHART_PATH,
                next.tag
            ));
        } else {
            let touched = upgrade::upgrade_version_references(working_copy, &next.tag)?;
            ui::display_upgrade_instructions(working_copy.path(), &next.tag, &touched);
            result.updated_references = touched;
        }
    }

    result.warnings = warnings;
    Ok(result)
}

/// Steps to run, in fixed order; CLI selection wins over configuration
fn selected_steps(args: &ReleaseWorkflowArgs, config: &Config) -> Result<Vec<Step>> {
    let requested = args.steps.as_ref().unwrap_or(&config.steps);
    let steps: Vec<Step> = Step::ALL
        .iter()
        .copied()
        .filter(|step| requested.contains(step))
        .collect();

    if steps.is_empty() {
        return Err(ReleaseError::config(format!(
            "no steps selected; choose from {}",
            Step::ALL
                .iter()
                .map(Step::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }
    Ok(steps)
}

fn check_last_release<S, P>(
    forge: &S,
    previous: &PreviousRelease,
    interactive: bool,
    prompt: &P,
    warnings: &mut Vec<BoundaryWarning>,
) -> Result<()>
where
    S: SourceForge + ?Sized,
    P: Prompt + ?Sized,
{
    let branch_name = &previous.identity.branch_name;
    let branch = match forge.get_branch(branch_name)? {
        Some(branch) => branch,
        None => {
            let e = ReleaseError::BranchNotFound(branch_name.clone());
            ui::display_error(&e.to_string());
            if !interactive {
                return Err(e);
            }
            if !prompt.confirm("Continue with the release anyway?")? {
                return Err(ReleaseError::Cancelled(format!(
                    "branch '{}' of the previous release is missing",
                    branch_name
                )));
            }
            warnings.push(BoundaryWarning::FloatingBranchMissing {
                branch: branch_name.clone(),
            });
            return Ok(());
        }
    };

    match verify_previous_release(previous, &branch.commit_id, &previous.record.commit_id) {
        Ok(()) => {
            ui::display_success(&format!(
                "Release {} matches {} ({})",
                previous.identity.tag, branch_name, branch.commit_id
            ));
            Ok(())
        }
        Err(e) => {
            ui::display_error(&e.to_string());
            if !interactive {
                return Err(e);
            }
            if !prompt.confirm("Continue with the release anyway?")? {
                return Err(ReleaseError::Cancelled(
                    "previous release does not match its branch".to_string(),
                ));
            }
            if let ReleaseError::ReleaseMismatch {
                tag,
                branch,
                release_commit,
                branch_commit,
                author,
            } = e
            {
                warnings.push(BoundaryWarning::ReleaseMismatch {
                    tag,
                    branch,
                    release_commit,
                    branch_commit,
                    author,
                });
            }
            Ok(())
        }
    }
}

/// Adopt or create the next release branch; returns the ref notes are built from
fn prepare_release_branch<S, W, P>(
    args: &ReleaseWorkflowArgs,
    config: &Config,
    forge: &S,
    working_copy: &W,
    release_branch: &str,
    interactive: bool,
    prompt: &P,
) -> Result<String>
where
    S: SourceForge + ?Sized,
    W: WorkingCopy + ?Sized,
    P: Prompt + ?Sized,
{
    if forge.branch_exists(release_branch)? {
        ui::display_status(&format!("Branch {} already exists, using it", release_branch));
        working_copy.checkout_ref(release_branch)?;
        working_copy.pull()?;
        return Ok(release_branch.to_string());
    }

    let question = format!(
        "Create branch {} from {}?",
        release_branch, config.default_branch
    );
    if interactive && !prompt.confirm(&question)? {
        return Err(ReleaseError::Cancelled(format!(
            "release branch {} was not created",
            release_branch
        )));
    }

    if args.dry_run {
        ui::display_status(&format!(
            "Dry run: would create {} from {}",
            release_branch, config.default_branch
        ));
        return Ok(config.default_branch.clone());
    }

    let branch = forge.create_branch(release_branch, &config.default_branch)?;
    info!(branch = %branch.name, commit = %branch.commit_id, "created release branch");
    ui::display_success(&format!("Created branch {} ({})", branch.name, branch.commit_id));

    working_copy.pull()?;
    working_copy.checkout_ref(release_branch)?;
    Ok(release_branch.to_string())
}
