// crates/listing-gate-core/tests/supersede.rs
// ============================================================================
// Module: Read Supersession Tests
// Description: Tests for newest-wins read tickets per listing and viewer.
// ============================================================================
//! ## Overview
//! Validates that only the newest in-flight read for a `(listing, viewer)`
//! pair completes as current, and that pairs are tracked independently.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use listing_gate_core::ReadCoordinator;
use listing_gate_core::ReadOutcome;
use listing_gate_core::UserId;

#[test]
fn single_read_completes_as_current() {
    let reads = ReadCoordinator::new();
    let viewer = UserId::new("viewer-1");

    let ticket = reads.begin("pixel-quest", Some(&viewer));
    assert_eq!(reads.finish("pixel-quest", Some(&viewer), ticket), ReadOutcome::Current);
}

#[test]
fn newer_read_supersedes_the_older_in_flight_read() {
    let reads = ReadCoordinator::new();
    let viewer = UserId::new("viewer-1");

    let first = reads.begin("pixel-quest", Some(&viewer));
    let second = reads.begin("pixel-quest", Some(&viewer));

    // The stale read resolves later but must be discarded.
    assert_eq!(reads.finish("pixel-quest", Some(&viewer), first), ReadOutcome::Superseded);
    assert_eq!(reads.finish("pixel-quest", Some(&viewer), second), ReadOutcome::Current);
}

#[test]
fn pairs_are_tracked_independently() {
    let reads = ReadCoordinator::new();
    let viewer_a = UserId::new("viewer-a");
    let viewer_b = UserId::new("viewer-b");

    let ticket_a = reads.begin("pixel-quest", Some(&viewer_a));
    let ticket_b = reads.begin("pixel-quest", Some(&viewer_b));
    let ticket_other = reads.begin("other-app", Some(&viewer_a));
    let ticket_anon = reads.begin("pixel-quest", None);

    // A new read for one pair leaves every other pair current.
    let _superseding = reads.begin("pixel-quest", Some(&viewer_a));

    assert_eq!(reads.finish("pixel-quest", Some(&viewer_a), ticket_a), ReadOutcome::Superseded);
    assert_eq!(reads.finish("pixel-quest", Some(&viewer_b), ticket_b), ReadOutcome::Current);
    assert_eq!(reads.finish("other-app", Some(&viewer_a), ticket_other), ReadOutcome::Current);
    assert_eq!(reads.finish("pixel-quest", None, ticket_anon), ReadOutcome::Current);
}
