// crates/listing-gate-core/tests/admission.rs
// ============================================================================
// Module: Admission Tests
// Description: Tests for pin admission, capacity, rotation, and revocation.
// ============================================================================
//! ## Overview
//! Validates the admission state machine: capacity is never jointly
//! exceeded, rotation invalidates every prior session, revocation removes
//! exactly one session, idle sessions evict lazily, and wrong-pin attempts
//! rate limit per caller.

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

use std::sync::Arc;
use std::thread;

use listing_gate_core::AccessConfig;
use listing_gate_core::AccessMode;
use listing_gate_core::AdmissionError;
use listing_gate_core::AdmissionPolicy;
use listing_gate_core::EditorContext;
use listing_gate_core::InMemoryListingStore;
use listing_gate_core::InMemorySessionStore;
use listing_gate_core::ListingId;
use listing_gate_core::ListingRecord;
use listing_gate_core::ListingStore;
use listing_gate_core::Pin;
use listing_gate_core::PinAdmissionController;
use listing_gate_core::Slug;
use listing_gate_core::Timestamp;
use listing_gate_core::UserId;

// ============================================================================
// SECTION: Test Fixtures
// ============================================================================

struct Fixture {
    listings: Arc<InMemoryListingStore>,
    controller: PinAdmissionController,
}

fn fixture_with_policy(policy: AdmissionPolicy) -> Fixture {
    let listings = Arc::new(InMemoryListingStore::new());
    let sessions = Arc::new(InMemorySessionStore::new());
    let controller = PinAdmissionController::new(listings.clone(), sessions, policy);
    Fixture { listings, controller }
}

fn fixture() -> Fixture {
    fixture_with_policy(AdmissionPolicy::default())
}

fn seed_gated(fx: &Fixture, pin: &str, cap: u32) {
    let mut record = ListingRecord::new(
        ListingId::new("app-1"),
        Slug::new("pixel-quest"),
        UserId::new("owner-1"),
        "Pixel Quest",
        Timestamp::from_unix_millis(1_000),
    );
    record.access = AccessConfig {
        mode: AccessMode::Pin,
        pin: Some(Pin::new(pin)),
        max_concurrent_pins: cap,
    };
    fx.listings.save(&record).unwrap();
}

fn owner() -> EditorContext {
    EditorContext::user("owner-1")
}

fn at(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

// ============================================================================
// SECTION: Admission and Capacity
// ============================================================================

#[test]
fn admit_capacity_revoke_readmit_round_trip() {
    let fx = fixture();
    seed_gated(&fx, "1234", 1);

    let session_a = fx.controller.admit("pixel-quest", "1234", None, "ip-a", at(2_000)).unwrap();

    let err =
        fx.controller.admit("pixel-quest", "1234", None, "ip-b", at(2_100)).unwrap_err();
    assert!(matches!(err, AdmissionError::CapacityExceeded { cap: 1 }));

    fx.controller.revoke("pixel-quest", &owner(), &session_a.session_id).unwrap();

    let session_b = fx.controller.admit("pixel-quest", "1234", None, "ip-b", at(2_200)).unwrap();
    assert_ne!(session_a.session_id, session_b.session_id);
}

#[test]
fn wrong_pin_fails_without_minting_a_session() {
    let fx = fixture();
    seed_gated(&fx, "1234", 2);

    let err =
        fx.controller.admit("pixel-quest", "0000", None, "ip-a", at(2_000)).unwrap_err();
    assert!(matches!(err, AdmissionError::WrongPin));
    assert!(fx.controller.list_sessions("pixel-quest", &owner(), at(2_000)).unwrap().is_empty());
}

#[test]
fn ungated_listings_fail_not_gated() {
    let fx = fixture();
    let record = ListingRecord::new(
        ListingId::new("app-1"),
        Slug::new("pixel-quest"),
        UserId::new("owner-1"),
        "Pixel Quest",
        at(1_000),
    );
    fx.listings.save(&record).unwrap();

    let err =
        fx.controller.admit("pixel-quest", "1234", None, "ip-a", at(2_000)).unwrap_err();
    assert!(matches!(err, AdmissionError::NotGated));
}

#[test]
fn concurrent_admissions_never_exceed_the_cap() {
    let fx = fixture();
    let cap = 4_u32;
    seed_gated(&fx, "1234", cap);
    let controller = Arc::new(fx.controller);

    let mut handles = Vec::new();
    for n in 0..16 {
        let controller = controller.clone();
        handles.push(thread::spawn(move || {
            controller.admit("pixel-quest", "1234", None, &format!("ip-{n}"), at(2_000)).is_ok()
        }));
    }
    let admitted = handles
        .into_iter()
        .map(|handle| handle.join().unwrap_or(false))
        .filter(|ok| *ok)
        .count();
    assert_eq!(admitted, cap as usize);

    let live = controller.list_sessions("pixel-quest", &owner(), at(2_100)).unwrap();
    assert_eq!(live.len(), cap as usize);
}

// ============================================================================
// SECTION: Rotation
// ============================================================================

#[test]
fn rotate_invalidates_old_pin_and_all_sessions() {
    let fx = fixture();
    seed_gated(&fx, "1234", 5);

    let session = fx.controller.admit("pixel-quest", "1234", None, "ip-a", at(2_000)).unwrap();

    let new_pin = fx.controller.rotate("pixel-quest", &owner(), at(3_000)).unwrap();
    assert_ne!(new_pin, "1234");

    // Old pin no longer admits.
    let err =
        fx.controller.admit("pixel-quest", "1234", None, "ip-b", at(3_100)).unwrap_err();
    assert!(matches!(err, AdmissionError::WrongPin));

    // Pre-rotation sessions are gone.
    let err =
        fx.controller.heartbeat("pixel-quest", &session.session_id, at(3_200)).unwrap_err();
    assert!(matches!(err, AdmissionError::SessionNotFound));

    // New pin admits fresh viewers.
    assert!(fx.controller.admit("pixel-quest", &new_pin, None, "ip-c", at(3_300)).is_ok());
}

#[test]
fn rotate_requires_the_owner() {
    let fx = fixture();
    seed_gated(&fx, "1234", 5);

    let err = fx
        .controller
        .rotate("pixel-quest", &EditorContext::user("stranger"), at(2_000))
        .unwrap_err();
    assert!(matches!(err, AdmissionError::Unauthorized));
}

// ============================================================================
// SECTION: Revocation and Listing
// ============================================================================

#[test]
fn revoke_removes_exactly_one_session() {
    let fx = fixture();
    seed_gated(&fx, "1234", 5);

    let session_a = fx.controller.admit("pixel-quest", "1234", None, "ip-a", at(2_000)).unwrap();
    let session_b = fx.controller.admit("pixel-quest", "1234", None, "ip-b", at(2_100)).unwrap();

    fx.controller.revoke("pixel-quest", &owner(), &session_a.session_id).unwrap();

    let live = fx.controller.list_sessions("pixel-quest", &owner(), at(2_200)).unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].session_id, session_b.session_id);

    let err = fx
        .controller
        .revoke("pixel-quest", &owner(), &session_a.session_id)
        .unwrap_err();
    assert!(matches!(err, AdmissionError::SessionNotFound));
}

#[test]
fn idle_sessions_evict_lazily_and_free_capacity() {
    let fx = fixture_with_policy(AdmissionPolicy {
        session_ttl_ms: 1_000,
        ..AdmissionPolicy::default()
    });
    seed_gated(&fx, "1234", 1);

    let stale = fx.controller.admit("pixel-quest", "1234", None, "ip-a", at(2_000)).unwrap();

    // Within the TTL the cap is occupied.
    let err =
        fx.controller.admit("pixel-quest", "1234", None, "ip-b", at(2_500)).unwrap_err();
    assert!(matches!(err, AdmissionError::CapacityExceeded { .. }));

    // After the TTL the stale session is evicted at admission time.
    let fresh = fx.controller.admit("pixel-quest", "1234", None, "ip-b", at(4_000)).unwrap();
    assert_ne!(stale.session_id, fresh.session_id);

    let live = fx.controller.list_sessions("pixel-quest", &owner(), at(4_100)).unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].session_id, fresh.session_id);
}

#[test]
fn heartbeat_extends_a_session_lifetime() {
    let fx = fixture_with_policy(AdmissionPolicy {
        session_ttl_ms: 1_000,
        ..AdmissionPolicy::default()
    });
    seed_gated(&fx, "1234", 1);

    let session = fx.controller.admit("pixel-quest", "1234", None, "ip-a", at(2_000)).unwrap();
    fx.controller.heartbeat("pixel-quest", &session.session_id, at(2_900)).unwrap();

    // Still live past the original deadline thanks to the heartbeat.
    let live = fx.controller.list_sessions("pixel-quest", &owner(), at(3_500)).unwrap();
    assert_eq!(live.len(), 1);

    // An expired session fails the heartbeat and is removed.
    let err = fx
        .controller
        .heartbeat("pixel-quest", &session.session_id, at(10_000))
        .unwrap_err();
    assert!(matches!(err, AdmissionError::SessionNotFound));
}

// ============================================================================
// SECTION: Rate Limiting
// ============================================================================

#[test]
fn repeated_wrong_pins_rate_limit_per_caller() {
    let fx = fixture_with_policy(AdmissionPolicy {
        rate_limit_window_ms: 60_000,
        rate_limit_max_attempts: 3,
        ..AdmissionPolicy::default()
    });
    seed_gated(&fx, "1234", 5);

    for n in 0..3 {
        let err = fx
            .controller
            .admit("pixel-quest", "0000", None, "ip-a", at(2_000 + n))
            .unwrap_err();
        assert!(matches!(err, AdmissionError::WrongPin));
    }

    // Fourth attempt inside the window is cut off before pin comparison.
    let err =
        fx.controller.admit("pixel-quest", "1234", None, "ip-a", at(2_010)).unwrap_err();
    assert!(matches!(err, AdmissionError::TooManyAttempts));

    // A different caller is unaffected.
    assert!(fx.controller.admit("pixel-quest", "1234", None, "ip-b", at(2_020)).is_ok());

    // The window expires and the original caller may retry.
    assert!(fx.controller.admit("pixel-quest", "1234", None, "ip-a", at(70_000)).is_ok());
}
