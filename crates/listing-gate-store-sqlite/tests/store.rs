// crates/listing-gate-store-sqlite/tests/store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Tests for listing persistence and session admission atomicity.
// ============================================================================
//! ## Overview
//! Validates snapshot round-trips, monotonic version enforcement, slug
//! uniqueness, durable reopen, and the transactional evict-count-insert that
//! keeps concurrent admissions within the cap.

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
use listing_gate_core::AnonId;
use listing_gate_core::ListingId;
use listing_gate_core::ListingRecord;
use listing_gate_core::ListingStore;
use listing_gate_core::Pin;
use listing_gate_core::PinSession;
use listing_gate_core::SessionId;
use listing_gate_core::SessionStore;
use listing_gate_core::Slug;
use listing_gate_core::StoreError;
use listing_gate_core::Timestamp;
use listing_gate_core::UserId;
use listing_gate_store_sqlite::SqliteStore;
use listing_gate_store_sqlite::SqliteStoreConfig;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

fn sample_record(version: u64) -> ListingRecord {
    let mut record = ListingRecord::new(
        ListingId::new("app-1"),
        Slug::new("pixel-quest"),
        UserId::new("owner-1"),
        "Pixel Quest",
        Timestamp::from_unix_millis(1_000),
    );
    record.version = version;
    record.access = AccessConfig {
        mode: AccessMode::Pin,
        pin: Some(Pin::new("1234")),
        max_concurrent_pins: 3,
    };
    record
}

fn sample_session(n: u32, last_seen: i64) -> PinSession {
    PinSession {
        session_id: SessionId::new(format!("sess-{n}")),
        listing_id: ListingId::new("app-1"),
        anon_id: Some(AnonId::new(format!("anon-{n}"))),
        ip_hash: format!("hash-{n}"),
        created_at: Timestamp::from_unix_millis(last_seen),
        last_seen_at: Timestamp::from_unix_millis(last_seen),
    }
}

fn at(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

// ============================================================================
// SECTION: Listing Persistence
// ============================================================================

#[test]
fn listing_snapshots_round_trip_by_id_and_slug() {
    let store = SqliteStore::open_in_memory().unwrap();
    let record = sample_record(1);
    store.save(&record).unwrap();

    assert_eq!(ListingStore::get(&store, &record.id).unwrap(), Some(record.clone()));
    assert_eq!(ListingStore::resolve(&store, "pixel-quest").unwrap(), Some(record.clone()));
    assert_eq!(ListingStore::resolve(&store, "app-1").unwrap(), Some(record));
    assert_eq!(ListingStore::resolve(&store, "missing").unwrap(), None);
}

#[test]
fn non_monotonic_saves_are_rejected() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.save(&sample_record(3)).unwrap();

    let err = store.save(&sample_record(3)).unwrap_err();
    assert!(matches!(err, StoreError::VersionConflict { attempted: 3, stored: 3 }));

    let err = store.save(&sample_record(2)).unwrap_err();
    assert!(matches!(err, StoreError::VersionConflict { .. }));

    store.save(&sample_record(4)).unwrap();
    assert_eq!(
        ListingStore::get(&store, &ListingId::new("app-1")).unwrap().map(|r| r.version),
        Some(4)
    );
}

#[test]
fn slugs_stay_unique_across_listings() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.save(&sample_record(1)).unwrap();

    let mut other = sample_record(1);
    other.id = ListingId::new("app-2");
    let err = store.save(&other).unwrap_err();
    assert!(matches!(err, StoreError::SlugTaken { .. }));

    other.slug = Slug::new("other-quest");
    store.save(&other).unwrap();
}

#[test]
fn listings_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = SqliteStoreConfig::new(dir.path().join("store.db3"));

    {
        let store = SqliteStore::open(&config).unwrap();
        store.save(&sample_record(1)).unwrap();
        store.admit_within_cap(&sample_session(1, 5_000), at(0), 3).unwrap();
    }

    let reopened = SqliteStore::open(&config).unwrap();
    assert_eq!(
        ListingStore::get(&reopened, &ListingId::new("app-1")).unwrap().map(|r| r.version),
        Some(1)
    );
    let live = reopened.list_live(&ListingId::new("app-1"), at(0)).unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].session_id, SessionId::new("sess-1"));
}

#[test]
fn remove_deletes_the_row() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.save(&sample_record(1)).unwrap();

    assert!(ListingStore::remove(&store, &ListingId::new("app-1")).unwrap());
    assert!(!ListingStore::remove(&store, &ListingId::new("app-1")).unwrap());
    assert_eq!(ListingStore::get(&store, &ListingId::new("app-1")).unwrap(), None);
}

// ============================================================================
// SECTION: Session Admission
// ============================================================================

#[test]
fn admission_respects_the_cap_and_evicts_idle_sessions() {
    let store = SqliteStore::open_in_memory().unwrap();

    assert!(store.admit_within_cap(&sample_session(1, 1_000), at(0), 2).unwrap());
    assert!(store.admit_within_cap(&sample_session(2, 1_100), at(0), 2).unwrap());
    assert!(!store.admit_within_cap(&sample_session(3, 1_200), at(0), 2).unwrap());

    // With a cutoff past the first two sessions, admission evicts them and
    // the newcomer fits.
    assert!(store.admit_within_cap(&sample_session(4, 9_000), at(5_000), 2).unwrap());
    let live = store.list_live(&ListingId::new("app-1"), at(5_000)).unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].session_id, SessionId::new("sess-4"));
}

#[test]
fn concurrent_admissions_stay_within_the_cap() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let cap = 3_u32;

    let mut handles = Vec::new();
    for n in 0..12_u32 {
        let store = store.clone();
        handles.push(thread::spawn(move || {
            store.admit_within_cap(&sample_session(n, 1_000), at(0), cap).unwrap()
        }));
    }
    let admitted =
        handles.into_iter().map(|h| h.join().unwrap_or(false)).filter(|ok| *ok).count();
    assert_eq!(admitted, cap as usize);
    assert_eq!(store.list_live(&ListingId::new("app-1"), at(0)).unwrap().len(), cap as usize);
}

#[test]
fn touch_remove_and_remove_all_behave_per_contract() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.admit_within_cap(&sample_session(1, 1_000), at(0), 10).unwrap();
    store.admit_within_cap(&sample_session(2, 1_000), at(0), 10).unwrap();

    let listing = ListingId::new("app-1");
    assert!(store.touch(&listing, &SessionId::new("sess-1"), at(2_000)).unwrap());
    assert!(!store.touch(&listing, &SessionId::new("sess-9"), at(2_000)).unwrap());

    let refreshed =
        SessionStore::get(&store, &listing, &SessionId::new("sess-1")).unwrap().unwrap();
    assert_eq!(refreshed.last_seen_at, at(2_000));

    assert!(SessionStore::remove(&store, &listing, &SessionId::new("sess-2")).unwrap());
    assert!(!SessionStore::remove(&store, &listing, &SessionId::new("sess-2")).unwrap());

    store.admit_within_cap(&sample_session(3, 2_500), at(0), 10).unwrap();
    assert_eq!(store.remove_all(&listing).unwrap(), 2);
    assert!(store.list_live(&listing, at(0)).unwrap().is_empty());
}
