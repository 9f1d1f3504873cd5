use hdl_mirror::analyzer::TagReconciler;
use hdl_mirror::boundary::ReconcileWarning;
use hdl_mirror::git::{MockRepository, BASELINE_TAG};
use hdl_mirror::ui;

// ============================================================================
// ReconcileWarning Display Tests
// ============================================================================

#[test]
fn test_reconcile_warning_malformed_tag_display() {
    let warning = ReconcileWarning::MalformedTag {
        tag: "release-123".to_string(),
        reason: "release must start with a digit".to_string(),
    };

    let display_msg = warning.to_string();
    assert!(
        display_msg.contains("Ignoring tag 'release-123'"),
        "Message should name the ignored tag, got: {}",
        display_msg
    );
    assert!(
        display_msg.contains("release must start with a digit"),
        "Message should contain the reason, got: {}",
        display_msg
    );
}

#[test]
fn test_reconcile_warning_missing_baseline_display() {
    let warning = ReconcileWarning::MissingBaseline {
        tag: "v0.0".to_string(),
        commit: "abc1234def5678".to_string(),
    };

    let display_msg = warning.to_string();
    assert!(
        display_msg.contains("v0.0"),
        "Message should contain tag 'v0.0', got: {}",
        display_msg
    );
    assert!(
        display_msg.contains("abc1234") && !display_msg.contains("abc1234d"),
        "Message should contain the shortened hash only, got: {}",
        display_msg
    );
}

#[test]
fn test_reconcile_warning_short_commit_not_truncated() {
    let warning = ReconcileWarning::MissingBaseline {
        tag: "v0.0".to_string(),
        commit: "abc".to_string(),
    };
    assert!(warning.to_string().ends_with("abc"));
}

#[test]
fn test_reconcile_warning_missing_hosting_repo_display() {
    let warning = ReconcileWarning::MissingHostingRepo {
        slug: "litex-hub/pythondata-cpu-serv".to_string(),
    };

    let display_msg = warning.to_string();
    assert!(
        display_msg.contains("litex-hub/pythondata-cpu-serv"),
        "Message should contain the slug, got: {}",
        display_msg
    );
}

// ============================================================================
// Warnings derived from a reconciliation
// ============================================================================

#[test]
fn test_warnings_from_report_baseline_first() {
    let mut repo = MockRepository::new();
    repo.add_commit("1111111aaaa", "first");
    repo.add_commit("2222222bbbb", "second");
    repo.add_tag("not-a-version", "2222222bbbb");

    let report = TagReconciler::new(&repo).run("master").unwrap();
    let warnings = ReconcileWarning::from_report(&report, BASELINE_TAG);

    assert_eq!(
        warnings[0],
        ReconcileWarning::MissingBaseline {
            tag: "v0.0".to_string(),
            commit: "1111111aaaa".to_string(),
        }
    );
    assert!(matches!(
        &warnings[1],
        ReconcileWarning::MalformedTag { tag, .. } if tag == "not-a-version"
    ));
    assert_eq!(warnings.len(), 2);
}

#[test]
fn test_no_warnings_for_clean_repository() {
    let mut repo = MockRepository::new();
    repo.add_commit("1111111aaaa", "first");
    repo.add_tag("v0.0", "1111111aaaa");

    let report = TagReconciler::new(&repo).run("master").unwrap();
    assert!(ReconcileWarning::from_report(&report, BASELINE_TAG).is_empty());
}

#[test]
fn test_display_warning_does_not_panic() {
    // Visual verification test - output is printed to stderr
    ui::display_warning(&ReconcileWarning::MissingHostingRepo {
        slug: "org/repo".to_string(),
    });
}
