// crates/listing-gate-core/tests/assets_sync.rs
// ============================================================================
// Module: Asset Sync Tests
// Description: Tests for the atomic custom asset diff-and-sync contract.
// ============================================================================
//! ## Overview
//! Validates all-or-nothing commits, case-insensitive name uniqueness, the
//! set cap, idempotent resubmission, and storage release of displaced
//! content.

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
use std::sync::Mutex;

use listing_gate_core::AssetContent;
use listing_gate_core::ContentRef;
use listing_gate_core::DesiredAsset;
use listing_gate_core::EditorContext;
use listing_gate_core::InMemoryListingStore;
use listing_gate_core::InMemorySessionStore;
use listing_gate_core::ListingId;
use listing_gate_core::ListingLimits;
use listing_gate_core::ListingRecord;
use listing_gate_core::ListingStore;
use listing_gate_core::ObjectStorage;
use listing_gate_core::ReconcileError;
use listing_gate_core::ReconciliationEngine;
use listing_gate_core::Slug;
use listing_gate_core::StorageError;
use listing_gate_core::Timestamp;
use listing_gate_core::UserId;

// ============================================================================
// SECTION: Test Fixtures
// ============================================================================

/// Storage stub that records every released reference.
#[derive(Debug, Default)]
struct RecordingStorage {
    released: Mutex<Vec<String>>,
}

impl ObjectStorage for RecordingStorage {
    fn release(&self, content_ref: &ContentRef) -> Result<(), StorageError> {
        self.released.lock().unwrap().push(content_ref.as_str().to_string());
        Ok(())
    }
}

struct Fixture {
    listings: Arc<InMemoryListingStore>,
    storage: Arc<RecordingStorage>,
    engine: ReconciliationEngine,
}

fn fixture() -> Fixture {
    let listings = Arc::new(InMemoryListingStore::new());
    let sessions = Arc::new(InMemorySessionStore::new());
    let storage = Arc::new(RecordingStorage::default());
    let engine = ReconciliationEngine::new(
        listings.clone(),
        sessions,
        storage.clone(),
        ListingLimits::default(),
    );
    Fixture { listings, storage, engine }
}

fn seed_listing(fx: &Fixture) {
    let record = ListingRecord::new(
        ListingId::new("app-1"),
        Slug::new("pixel-quest"),
        UserId::new("owner-1"),
        "Pixel Quest",
        Timestamp::from_unix_millis(1_000),
    );
    fx.listings.save(&record).unwrap();
}

fn owner() -> EditorContext {
    EditorContext::user("owner-1")
}

fn at(millis: i64) -> Timestamp {
    Timestamp::from_unix_millis(millis)
}

fn png(content_ref: &str, size: u64) -> AssetContent {
    AssetContent {
        content_ref: ContentRef::new(content_ref),
        mime_type: "image/png".to_string(),
        size_bytes: size,
    }
}

fn upload(name: &str, content_ref: &str) -> DesiredAsset {
    DesiredAsset { id: None, name: name.to_string(), content: Some(png(content_ref, 4_096)) }
}

// ============================================================================
// SECTION: Create / Rename / Replace / Delete
// ============================================================================

#[test]
fn sync_creates_persists_and_returns_the_desired_set() {
    let fx = fixture();
    seed_listing(&fx);

    let desired = vec![upload("banner.png", "blob-1"), upload("tile.png", "blob-2")];
    let records = fx.engine.sync_assets("pixel-quest", &owner(), &desired, at(2_000)).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "banner.png");
    assert_eq!(records[1].name, "tile.png");
    assert!(!records[0].id.as_str().is_empty());

    let stored = fx.engine.fetch("pixel-quest", Some(&owner())).unwrap();
    assert_eq!(stored.custom_assets.records(), records.as_slice());
}

#[test]
fn sync_renames_by_id_without_reuploading() {
    let fx = fixture();
    seed_listing(&fx);

    let records = fx
        .engine
        .sync_assets("pixel-quest", &owner(), &[upload("banner.png", "blob-1")], at(2_000))
        .unwrap();
    let id = records[0].id.clone();

    let desired =
        vec![DesiredAsset { id: Some(id.clone()), name: "hero.png".to_string(), content: None }];
    let renamed = fx.engine.sync_assets("pixel-quest", &owner(), &desired, at(3_000)).unwrap();

    assert_eq!(renamed[0].id, id);
    assert_eq!(renamed[0].name, "hero.png");
    assert_eq!(renamed[0].content_ref, ContentRef::new("blob-1"));
    assert_eq!(renamed[0].updated_at, at(3_000));
}

#[test]
fn sync_replaces_content_under_the_same_id_and_releases_the_old_bytes() {
    let fx = fixture();
    seed_listing(&fx);

    let records = fx
        .engine
        .sync_assets("pixel-quest", &owner(), &[upload("banner.png", "blob-1")], at(2_000))
        .unwrap();
    let id = records[0].id.clone();

    let desired = vec![DesiredAsset {
        id: Some(id.clone()),
        name: "banner.png".to_string(),
        content: Some(png("blob-2", 8_192)),
    }];
    let replaced = fx.engine.sync_assets("pixel-quest", &owner(), &desired, at(3_000)).unwrap();

    assert_eq!(replaced[0].id, id);
    assert_eq!(replaced[0].content_ref, ContentRef::new("blob-2"));
    assert_eq!(replaced[0].size_bytes, 8_192);
    assert!(fx.storage.released.lock().unwrap().contains(&"blob-1".to_string()));
}

#[test]
fn sync_deletes_records_absent_from_the_desired_list() {
    let fx = fixture();
    seed_listing(&fx);

    let records = fx
        .engine
        .sync_assets(
            "pixel-quest",
            &owner(),
            &[upload("banner.png", "blob-1"), upload("tile.png", "blob-2")],
            at(2_000),
        )
        .unwrap();
    let keep = records[0].id.clone();

    let desired =
        vec![DesiredAsset { id: Some(keep), name: "banner.png".to_string(), content: None }];
    let remaining = fx.engine.sync_assets("pixel-quest", &owner(), &desired, at(3_000)).unwrap();

    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "banner.png");
    assert!(fx.storage.released.lock().unwrap().contains(&"blob-2".to_string()));
}

// ============================================================================
// SECTION: Validation and Atomicity
// ============================================================================

#[test]
fn duplicate_names_differing_only_in_case_fail_and_leave_the_set_unchanged() {
    let fx = fixture();
    seed_listing(&fx);

    fx.engine
        .sync_assets("pixel-quest", &owner(), &[upload("icon.png", "blob-0")], at(2_000))
        .unwrap();

    let desired = vec![upload("Banner.png", "blob-1"), upload("banner.PNG", "blob-2")];
    let err =
        fx.engine.sync_assets("pixel-quest", &owner(), &desired, at(3_000)).unwrap_err();
    assert!(matches!(err, ReconcileError::DuplicateName { .. }));

    let stored = fx.engine.fetch("pixel-quest", Some(&owner())).unwrap();
    assert_eq!(stored.custom_assets.len(), 1);
    assert_eq!(stored.custom_assets.records()[0].name, "icon.png");
}

#[test]
fn oversized_or_foreign_content_fails_before_any_commit() {
    let fx = fixture();
    seed_listing(&fx);

    let oversized = DesiredAsset {
        id: None,
        name: "huge.png".to_string(),
        content: Some(png("blob-big", 200 * 1_024)),
    };
    let err = fx
        .engine
        .sync_assets("pixel-quest", &owner(), &[oversized], at(2_000))
        .unwrap_err();
    assert!(matches!(err, ReconcileError::LimitExceeded { what: "custom_asset_bytes", .. }));

    let foreign = DesiredAsset {
        id: None,
        name: "clip.mp4".to_string(),
        content: Some(AssetContent {
            content_ref: ContentRef::new("blob-clip"),
            mime_type: "video/mp4".to_string(),
            size_bytes: 1_024,
        }),
    };
    let err =
        fx.engine.sync_assets("pixel-quest", &owner(), &[foreign], at(2_000)).unwrap_err();
    assert!(matches!(err, ReconcileError::ValidationFailed { field: "custom_assets", .. }));

    let stored = fx.engine.fetch("pixel-quest", Some(&owner())).unwrap();
    assert!(stored.custom_assets.is_empty());
}

#[test]
fn desired_list_over_the_cap_is_rejected() {
    let fx = fixture();
    seed_listing(&fx);

    let desired: Vec<DesiredAsset> =
        (0..31).map(|n| upload(&format!("asset-{n}.png"), &format!("blob-{n}"))).collect();
    let err = fx.engine.sync_assets("pixel-quest", &owner(), &desired, at(2_000)).unwrap_err();
    assert!(matches!(err, ReconcileError::LimitExceeded { what: "custom_assets", .. }));
}

#[test]
fn dangling_asset_references_are_rejected() {
    let fx = fixture();
    seed_listing(&fx);

    let desired = vec![DesiredAsset {
        id: Some(listing_gate_core::AssetId::new("ghost")),
        name: "ghost.png".to_string(),
        content: None,
    }];
    let err = fx.engine.sync_assets("pixel-quest", &owner(), &desired, at(2_000)).unwrap_err();
    assert!(matches!(err, ReconcileError::ValidationFailed { field: "custom_assets", .. }));
}

#[test]
fn names_are_sanitized_before_uniqueness_checks() {
    let fx = fixture();
    seed_listing(&fx);

    let desired = vec![upload("sub/dir\\banner.png", "blob-1")];
    let records = fx.engine.sync_assets("pixel-quest", &owner(), &desired, at(2_000)).unwrap();
    assert_eq!(records[0].name, "sub-dir-banner.png");
}

// ============================================================================
// SECTION: Idempotence
// ============================================================================

#[test]
fn resubmitting_the_committed_list_returns_byte_identical_records() {
    let fx = fixture();
    seed_listing(&fx);

    let desired = vec![upload("banner.png", "blob-1"), upload("tile.png", "blob-2")];
    let first = fx.engine.sync_assets("pixel-quest", &owner(), &desired, at(2_000)).unwrap();
    let version_after_first =
        fx.engine.fetch("pixel-quest", Some(&owner())).unwrap().version;

    // Same desired list again, later clock: nothing may change, including
    // updated_at stamps.
    let second = fx.engine.sync_assets("pixel-quest", &owner(), &desired, at(9_000)).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        fx.engine.fetch("pixel-quest", Some(&owner())).unwrap().version,
        version_after_first
    );

    // Keep-by-id resubmission is equally idempotent.
    let keeps: Vec<DesiredAsset> = first
        .iter()
        .map(|record| DesiredAsset {
            id: Some(record.id.clone()),
            name: record.name.clone(),
            content: None,
        })
        .collect();
    let third = fx.engine.sync_assets("pixel-quest", &owner(), &keeps, at(10_000)).unwrap();
    assert_eq!(first, third);
}
