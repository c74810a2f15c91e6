// tests/cli_orchestration_test.rs
use bb_release::cli::orchestration::{run_release_workflow, ReleaseWorkflowArgs};
use bb_release::config::{Config, Step};
use bb_release::domain::{TagRecord, VersionBump};
use bb_release::fetch::MockFetcher;
use bb_release::forge::{ChangeRequest, ForgeError, MockForge};
use bb_release::git::{MockWorkingCopy, VALUES_PATH};
use bb_release::ui::FixedPrompt;
use bb_release::upgrade::{CHART_PATH, GITREPOSITORY_PATH};
use bb_release::ReleaseError;
use tempfile::TempDir;

const FOO: &str = "https://repo1.dso.mil/big-bang/product/packages/foo.git";
const BAR: &str = "https://repo1.dso.mil/big-bang/product/packages/bar.git";

const FOO_CHANGELOG: &str = "\
# Changelog

---
## [v1.1.0] - 2023-02-01
### Changed
- Upgraded foo to 1.1.0
---
## [v1.0.0] - 2023-01-05
### Added
- Initial release
";

const BAR_CHANGELOG: &str = "\
## [v2.0.0] - 2023-01-01
### Changed
- Bar baseline
";

const GITREPOSITORY: &str = "\
apiVersion: source.toolkit.fluxcd.io/v1beta2
kind: GitRepository
metadata:
  name: bigbang
spec:
  ref:
    tag: \"1.52.0\"
";

const CHART: &str = "\
apiVersion: v2
name: bigbang
version: 1.52.0
";

fn values(foo_tag: &str) -> String {
    format!(
        "\
domain: bigbang.dev
foo:
  enabled: true
  git:
    repo: {}
    tag: \"{}\"
addons:
  bar:
    enabled: false
    git:
      repo: {}
      tag: \"v2.0.0\"
",
        FOO, foo_tag, BAR
    )
}

fn chart(app: &str) -> String {
    format!(
        "apiVersion: v2\nannotations:\n  bigbang.dev/applicationVersions: |\n    - {}\n",
        app
    )
}

fn forge() -> MockForge {
    MockForge::new()
        .with_release(TagRecord::new("1.53.0-rc.0", "ffff000", "Release Engineer"))
        .with_release(TagRecord::new("1.52.0", "abc1234", "Release Engineer"))
        .with_branch("master", "def5678")
        .with_branch("release-1.52.x", "abc1234")
        .with_change_request(
            "1.53.0",
            ChangeRequest {
                iid: 2710,
                title: "Update foo to v1.1.0".to_string(),
                web_url: "https://repo1.dso.mil/big-bang/bigbang/-/merge_requests/2710"
                    .to_string(),
                author: Some("Jane Doe".to_string()),
            },
        )
}

fn working_copy() -> MockWorkingCopy {
    let mut wc = MockWorkingCopy::new();
    for (reference, foo_tag) in [
        ("master", "v1.1.0"),
        ("release-1.53.x", "v1.1.0"),
        ("1.52.0", "v1.0.0"),
    ] {
        wc = wc
            .with_file(reference, VALUES_PATH, values(foo_tag))
            .with_file(reference, GITREPOSITORY_PATH, GITREPOSITORY)
            .with_file(reference, CHART_PATH, CHART);
    }
    wc
}

fn fetcher() -> MockFetcher {
    MockFetcher::new()
        .with_package(FOO, "v1.1.0", chart("Foo: v1.1.0"), FOO_CHANGELOG)
        .with_package(BAR, "v2.0.0", chart("Bar: 2.0.0"), BAR_CHANGELOG)
}

fn config(output_dir: &TempDir, steps: &[Step]) -> Config {
    let mut config = Config {
        interactive: false,
        release_type: VersionBump::Minor,
        output_dir: output_dir.path().to_path_buf(),
        steps: steps.to_vec(),
        ..Config::default()
    };
    config.cache.enabled = false;
    config
}

const NOTES_STEPS: [Step; 3] = [
    Step::CheckLastRelease,
    Step::CreateReleaseBranch,
    Step::BuildReleaseNotes,
];

// ============================================================================
// Full workflow
// ============================================================================

#[test]
fn test_minor_release_builds_notes_for_updated_package() {
    let dir = TempDir::new().unwrap();
    let forge = forge();
    let wc = working_copy();

    let result = run_release_workflow(
        &ReleaseWorkflowArgs::default(),
        &config(&dir, &NOTES_STEPS),
        &forge,
        &wc,
        &fetcher(),
        &FixedPrompt(true),
    )
    .unwrap();

    assert_eq!(result.previous.tag.to_string(), "1.52.0");
    assert_eq!(result.next.tag.to_string(), "1.53.0");
    assert_eq!(result.release_branch, "release-1.53.x");
    assert_eq!(result.upgraded_packages, vec!["foo".to_string()]);
    assert!(result.skipped_packages.is_empty());
    assert!(result.warnings.is_empty());
    assert_eq!(
        forge.created_branches(),
        vec![("release-1.53.x".to_string(), "master".to_string())]
    );

    let path = result.notes_path.expect("notes should be written");
    assert_eq!(path, dir.path().join("release-notes-1-53-0.md"));

    let content = std::fs::read_to_string(&path).unwrap();
    let updated_badge =
        "![Updated](https://img.shields.io/badge/Updated-informational?style=flat-square)";
    assert!(content.contains(&format!("{} [Foo]", updated_badge)));
    assert!(!content.contains(&format!("{} [Bar]", updated_badge)));
    assert!(content.contains("- Upgraded foo to 1.1.0"));
    assert!(!content.contains("Initial release"));
    assert!(content.contains("[!2710]"));
    assert!(!content.contains("1970-01-01"));
}

#[test]
fn test_workflow_starts_from_clean_default_branch() {
    let dir = TempDir::new().unwrap();
    let wc = working_copy();

    run_release_workflow(
        &ReleaseWorkflowArgs::default(),
        &config(&dir, &NOTES_STEPS),
        &forge(),
        &wc,
        &fetcher(),
        &FixedPrompt(true),
    )
    .unwrap();

    let checkouts = wc.checkouts();
    assert_eq!(checkouts.first().map(String::as_str), Some("master"));
    assert!(checkouts.iter().any(|r| r == "1.52.0"));
    // notes leave the release branch checked out
    assert_eq!(wc.current_ref().as_deref(), Some("release-1.53.x"));
    assert!(wc.pull_count() >= 2);
}

#[test]
fn test_two_runs_render_identical_notes() {
    let render = || {
        let dir = TempDir::new().unwrap();
        let result = run_release_workflow(
            &ReleaseWorkflowArgs::default(),
            &config(&dir, &NOTES_STEPS),
            &forge(),
            &working_copy(),
            &fetcher(),
            &FixedPrompt(true),
        )
        .unwrap();
        std::fs::read_to_string(result.notes_path.unwrap()).unwrap()
    };

    assert_eq!(render(), render());
}

#[test]
fn test_existing_release_branch_is_adopted() {
    let dir = TempDir::new().unwrap();
    let forge = forge().with_branch("release-1.53.x", "def5678");

    let result = run_release_workflow(
        &ReleaseWorkflowArgs::default(),
        &config(&dir, &NOTES_STEPS),
        &forge,
        &working_copy(),
        &fetcher(),
        &FixedPrompt(true),
    )
    .unwrap();

    assert!(forge.created_branches().is_empty());
    assert!(result.notes_path.is_some());
}

#[test]
fn test_dry_run_creates_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let forge = forge();
    let wc = working_copy();
    let args = ReleaseWorkflowArgs {
        dry_run: true,
        steps: Some(vec![
            Step::CreateReleaseBranch,
            Step::BuildReleaseNotes,
            Step::UpgradeVersionReferences,
        ]),
        ..Default::default()
    };

    let result = run_release_workflow(
        &args,
        &config(&dir, &[]),
        &forge,
        &wc,
        &fetcher(),
        &FixedPrompt(true),
    )
    .unwrap();

    assert!(forge.created_branches().is_empty());
    assert!(result.notes_path.is_none());
    assert!(result.updated_references.is_empty());
    assert_eq!(result.upgraded_packages, vec!["foo".to_string()]);
    assert!(!dir.path().join("release-notes-1-53-0.md").exists());
    assert_eq!(wc.file_at("master", CHART_PATH).as_deref(), Some(CHART));
}

#[test]
fn test_missing_package_sources_are_skipped() {
    let dir = TempDir::new().unwrap();
    let fetcher =
        MockFetcher::new().with_package(FOO, "v1.1.0", chart("Foo: v1.1.0"), FOO_CHANGELOG);

    let result = run_release_workflow(
        &ReleaseWorkflowArgs::default(),
        &config(&dir, &NOTES_STEPS),
        &forge(),
        &working_copy(),
        &fetcher,
        &FixedPrompt(true),
    )
    .unwrap();

    assert_eq!(result.skipped_packages, vec!["bar@v2.0.0".to_string()]);
    let content = std::fs::read_to_string(result.notes_path.unwrap()).unwrap();
    assert!(!content.contains("[Bar]"));
}

#[test]
fn test_upgrade_step_rewrites_version_references() {
    let dir = TempDir::new().unwrap();
    let forge = forge().with_branch("release-1.53.x", "def5678");
    let wc = working_copy();

    let result = run_release_workflow(
        &ReleaseWorkflowArgs::default(),
        &config(&dir, &[Step::UpgradeVersionReferences]),
        &forge,
        &wc,
        &fetcher(),
        &FixedPrompt(true),
    )
    .unwrap();

    assert_eq!(
        result.updated_references,
        vec![GITREPOSITORY_PATH.to_string(), CHART_PATH.to_string()]
    );
    assert!(wc
        .file_at("release-1.53.x", GITREPOSITORY_PATH)
        .unwrap()
        .contains("tag: \"1.53.0\""));
    assert!(wc
        .file_at("release-1.53.x", CHART_PATH)
        .unwrap()
        .contains("version: 1.53.0"));
    // other refs stay untouched
    assert_eq!(wc.file_at("master", CHART_PATH).as_deref(), Some(CHART));
}

#[test]
fn test_cli_release_type_overrides_config() {
    let dir = TempDir::new().unwrap();
    let args = ReleaseWorkflowArgs {
        release_type: Some(VersionBump::Patch),
        steps: Some(vec![Step::CheckLastRelease]),
        ..Default::default()
    };

    let result = run_release_workflow(
        &args,
        &config(&dir, &[]),
        &forge(),
        &working_copy(),
        &fetcher(),
        &FixedPrompt(true),
    )
    .unwrap();

    assert_eq!(result.next.tag.to_string(), "1.52.1");
    assert_eq!(result.release_branch, "release-1.52.1");
}

// ============================================================================
// Failures and boundary conditions
// ============================================================================

#[test]
fn test_dirty_working_copy_is_fatal() {
    let dir = TempDir::new().unwrap();
    let forge = forge();

    let err = run_release_workflow(
        &ReleaseWorkflowArgs::default(),
        &config(&dir, &NOTES_STEPS),
        &forge,
        &working_copy().dirty(),
        &fetcher(),
        &FixedPrompt(true),
    )
    .unwrap_err();

    assert!(matches!(err, ReleaseError::DirtyWorkingCopy(_)));
    assert!(forge.created_branches().is_empty());
}

#[test]
fn test_rejected_credentials_stop_the_run() {
    let dir = TempDir::new().unwrap();

    let err = run_release_workflow(
        &ReleaseWorkflowArgs::default(),
        &config(&dir, &NOTES_STEPS),
        &forge().rejecting_credentials(),
        &working_copy(),
        &fetcher(),
        &FixedPrompt(true),
    )
    .unwrap_err();

    assert!(matches!(err, ReleaseError::Forge(ForgeError::AuthFailed(_))));
}

#[test]
fn test_release_mismatch_fails_when_not_interactive() {
    let dir = TempDir::new().unwrap();
    let forge = forge().with_branch("release-1.52.x", "9999999");

    let err = run_release_workflow(
        &ReleaseWorkflowArgs::default(),
        &config(&dir, &NOTES_STEPS),
        &forge,
        &working_copy(),
        &fetcher(),
        &FixedPrompt(true),
    )
    .unwrap_err();

    match err {
        ReleaseError::ReleaseMismatch {
            release_commit,
            branch_commit,
            ..
        } => {
            assert_eq!(release_commit, "abc1234");
            assert_eq!(branch_commit, "9999999");
        }
        other => panic!("expected ReleaseMismatch, got {:?}", other),
    }
    assert!(forge.created_branches().is_empty());
}

#[test]
fn test_release_mismatch_declined_cancels() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir, &NOTES_STEPS);
    config.interactive = true;

    let err = run_release_workflow(
        &ReleaseWorkflowArgs::default(),
        &config,
        &forge().with_branch("release-1.52.x", "9999999"),
        &working_copy(),
        &fetcher(),
        &FixedPrompt(false),
    )
    .unwrap_err();

    assert!(matches!(err, ReleaseError::Cancelled(_)));
}

#[test]
fn test_release_mismatch_accepted_is_recorded() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir, &[Step::CheckLastRelease]);
    config.interactive = true;

    let result = run_release_workflow(
        &ReleaseWorkflowArgs::default(),
        &config,
        &forge().with_branch("release-1.52.x", "9999999"),
        &working_copy(),
        &fetcher(),
        &FixedPrompt(true),
    )
    .unwrap();

    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].to_string().contains("9999999"));
}

fn forge_without_floating_branch() -> MockForge {
    MockForge::new()
        .with_release(TagRecord::new("1.52.0", "abc1234", "Release Engineer"))
        .with_branch("master", "def5678")
}

#[test]
fn test_missing_floating_branch_fails_when_not_interactive() {
    let dir = TempDir::new().unwrap();

    let err = run_release_workflow(
        &ReleaseWorkflowArgs::default(),
        &config(&dir, &[Step::CheckLastRelease]),
        &forge_without_floating_branch(),
        &working_copy(),
        &fetcher(),
        &FixedPrompt(true),
    )
    .unwrap_err();

    match err {
        ReleaseError::BranchNotFound(branch) => assert_eq!(branch, "release-1.52.x"),
        other => panic!("expected BranchNotFound, got {:?}", other),
    }
}

#[test]
fn test_missing_floating_branch_declined_cancels() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir, &NOTES_STEPS);
    config.interactive = true;
    let forge = forge_without_floating_branch();

    let err = run_release_workflow(
        &ReleaseWorkflowArgs::default(),
        &config,
        &forge,
        &working_copy(),
        &fetcher(),
        &FixedPrompt(false),
    )
    .unwrap_err();

    assert!(matches!(err, ReleaseError::Cancelled(_)));
    assert!(forge.created_branches().is_empty());
}

#[test]
fn test_missing_floating_branch_accepted_is_recorded() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir, &[Step::CheckLastRelease]);
    config.interactive = true;

    let result = run_release_workflow(
        &ReleaseWorkflowArgs::default(),
        &config,
        &forge_without_floating_branch(),
        &working_copy(),
        &fetcher(),
        &FixedPrompt(true),
    )
    .unwrap();

    assert_eq!(result.warnings.len(), 1);
    assert_eq!(
        result.warnings[0].to_string(),
        "Branch 'release-1.52.x' not found on the forge"
    );
}

#[test]
fn test_notes_without_release_branch_fail() {
    let dir = TempDir::new().unwrap();

    let err = run_release_workflow(
        &ReleaseWorkflowArgs::default(),
        &config(&dir, &[Step::BuildReleaseNotes]),
        &forge(),
        &working_copy(),
        &fetcher(),
        &FixedPrompt(true),
    )
    .unwrap_err();

    match err {
        ReleaseError::BranchNotFound(branch) => assert_eq!(branch, "release-1.53.x"),
        other => panic!("expected BranchNotFound, got {:?}", other),
    }
}

#[test]
fn test_declined_branch_creation_cancels() {
    let dir = TempDir::new().unwrap();
    let forge = forge();
    let mut config = config(&dir, &[Step::CreateReleaseBranch]);
    config.interactive = true;

    let err = run_release_workflow(
        &ReleaseWorkflowArgs::default(),
        &config,
        &forge,
        &working_copy(),
        &fetcher(),
        &FixedPrompt(false),
    )
    .unwrap_err();

    assert!(matches!(err, ReleaseError::Cancelled(_)));
    assert!(forge.created_branches().is_empty());
}

#[test]
fn test_no_release_history_fails() {
    let dir = TempDir::new().unwrap();
    let forge = MockForge::new()
        .with_release(TagRecord::new("1.53.0-rc.0", "ffff000", "Release Engineer"))
        .with_branch("master", "def5678");

    let err = run_release_workflow(
        &ReleaseWorkflowArgs::default(),
        &config(&dir, &NOTES_STEPS),
        &forge,
        &working_copy(),
        &fetcher(),
        &FixedPrompt(true),
    )
    .unwrap_err();

    assert!(matches!(err, ReleaseError::NoReleaseFound { .. }));
}

#[test]
fn test_empty_step_selection_is_config_error() {
    let dir = TempDir::new().unwrap();

    let err = run_release_workflow(
        &ReleaseWorkflowArgs::default(),
        &config(&dir, &[]),
        &forge(),
        &working_copy(),
        &fetcher(),
        &FixedPrompt(true),
    )
    .unwrap_err();

    assert!(matches!(err, ReleaseError::Config(_)));
}
