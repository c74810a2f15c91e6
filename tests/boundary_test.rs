use bb_release::boundary::BoundaryWarning;
use bb_release::ui;

// ============================================================================
// BoundaryWarning Display Tests
// ============================================================================

#[test]
fn test_boundary_warning_package_skipped_display() {
    let warning = BoundaryWarning::PackageSkipped {
        package: "twistlock".to_string(),
        tag: "0.11.3-bb.0".to_string(),
        reason: "twistlock@0.11.3-bb.0 Chart not found".to_string(),
    };

    let display_msg = warning.to_string();
    assert!(
        display_msg.contains("twistlock@0.11.3-bb.0"),
        "Message should name package and tag, got: {}",
        display_msg
    );
    assert!(
        display_msg.contains("Chart not found"),
        "Message should carry the reason, got: {}",
        display_msg
    );
}

#[test]
fn test_boundary_warning_title_override_missing_display() {
    let warning = BoundaryWarning::TitleOverrideMissing {
        original: "kyverno-policies".to_string(),
        renamed: "kyverno-policy".to_string(),
    };

    let display_msg = warning.to_string();
    assert!(
        display_msg.contains("kyverno-policies") && display_msg.contains("kyverno-policy"),
        "Message should name both names, got: {}",
        display_msg
    );
}

#[test]
fn test_boundary_warning_floating_branch_missing_display() {
    let warning = BoundaryWarning::FloatingBranchMissing {
        branch: "release-1.52.x".to_string(),
    };

    assert_eq!(
        warning.to_string(),
        "Branch 'release-1.52.x' not found on the forge"
    );
}

#[test]
fn test_boundary_warning_removed_packages_display() {
    let warning = BoundaryWarning::RemovedPackages {
        names: vec!["sonarqube".to_string()],
    };

    assert!(warning.to_string().contains("sonarqube"));
}

#[test]
fn test_display_boundary_warning_does_not_panic() {
    // Visual verification test - output is printed to stderr
    ui::display_boundary_warning(&BoundaryWarning::FloatingBranchMissing {
        branch: "release-1.52.x".to_string(),
    });
}
