#[path = "common/mod.rs"]
mod common;

use common::*;
use replyrecon::{Reconciler, RunError};
use std::sync::Arc;

fn usernames(report: &replyrecon::ComparisonReport) -> Vec<String> {
    report.unique_to_first.iter().map(|r| r.username.to_string()).collect()
}

/// Demonstrates `run_comparison()` over two paged threads:
///   - u2 replied to both and is dropped
///   - u1 keeps the record from its first sighting
/// Outcome: [u1, u4] with full profile fields.
#[test]
fn keeps_first_post_repliers_absent_from_second() {
    let mut u1 = rec("u1");
    u1.display_name = "User One".into();
    u1.follower_count = 42;
    let f = Arc::new(
        StubFetcher::new()
            .page("a", None, vec![u1, rec("u2")], Some("a#1"))
            .page("a", Some("a#1"), vec![rec("u4"), rec("u2")], None)
            .thread("b", &[&["u2"], &["u3"]]),
    );
    let rec = Reconciler::with_parts(quiet_opts(), f.clone(), Arc::new(StubLookup::new()));

    let report = rec.run_comparison(&id("a"), &id("b")).unwrap();
    assert_eq!(usernames(&report), vec!["u1", "u4"]);
    assert_eq!(report.first_total, 3);
    assert_eq!(report.second_total, 2);
    assert_eq!(report.unique_to_first[0].display_name, "User One");
    assert_eq!(report.unique_to_first[0].follower_count, 42);
    assert_eq!(report.unique_to_first[0].profile_url(), "https://x.com/u1");
    assert_eq!(f.total_calls(), 4);
}

/// Swapping the posts swaps the answer.
#[test]
fn comparison_is_not_symmetric() {
    let f = Arc::new(StubFetcher::new().thread("a", &[&["u1", "u2"]]).thread("b", &[&["u2", "u3"]]));
    let rec = Reconciler::with_parts(quiet_opts(), f, Arc::new(StubLookup::new()));

    let ab = rec.run_comparison(&id("a"), &id("b")).unwrap();
    let ba = rec.run_comparison(&id("b"), &id("a")).unwrap();
    assert_eq!(usernames(&ab), vec!["u1"]);
    assert_eq!(usernames(&ba), vec!["u3"]);
}

/// With two workers both threads are read at once; order still follows the first post.
#[test]
fn both_posts_fetched_concurrently_give_the_same_answer() {
    let f = Arc::new(
        StubFetcher::new()
            .thread("a", &[&["u1", "u2"], &["u3"], &["u5"]])
            .thread("b", &[&["u3"], &["u9"]]),
    );
    let rec = Reconciler::with_parts(quiet_opts().with_fan_out(2), f, Arc::new(StubLookup::new()));
    let report = rec.run_comparison(&id("a"), &id("b")).unwrap();
    assert_eq!(usernames(&report), vec!["u1", "u2", "u5"]);
}

/// The error names the post that could not be read.
#[test]
fn unreadable_post_fails_the_comparison() {
    let f = Arc::new(StubFetcher::new().thread("a", &[&["u1"]]).fail_always("b", server_404));
    let rec = Reconciler::with_parts(quiet_opts(), f, Arc::new(StubLookup::new()));
    match rec.run_comparison(&id("a"), &id("b")) {
        Err(RunError::Accumulation { content_id, .. }) => assert_eq!(content_id, id("b")),
        other => panic!("expected Accumulation, got {other:?}"),
    }
}

/// A rejected key on one post cancels the other.
/// Outcome: the caller sees `Auth`, not the cancellation it caused.
#[test]
fn rejected_credential_wins_over_induced_cancellation() {
    let f = Arc::new(StubFetcher::new().fail_always("a", auth).thread("b", &[&["u1"], &["u2"], &["u3"]]));
    let rec = Reconciler::with_parts(quiet_opts().with_fan_out(2), f, Arc::new(StubLookup::new()));
    let err = rec.run_comparison(&id("a"), &id("b")).unwrap_err();
    assert!(matches!(err, RunError::Auth { .. }), "{err:?}");
}
