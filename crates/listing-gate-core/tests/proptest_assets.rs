// crates/listing-gate-core/tests/proptest_assets.rs
// ============================================================================
// Module: Asset Property Tests
// Description: Property tests for name sanitization and sync planning.
// ============================================================================
//! ## Overview
//! Exercises the asset diff planner and name sanitizer across generated
//! inputs: planned sets always honor uniqueness and the cap, planning is
//! idempotent, and sanitized names never contain separators or line breaks.

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

use std::collections::HashSet;

use listing_gate_core::AssetContent;
use listing_gate_core::AssetId;
use listing_gate_core::AssetSet;
use listing_gate_core::AssetSyncBounds;
use listing_gate_core::ContentRef;
use listing_gate_core::DesiredAsset;
use listing_gate_core::Timestamp;
use listing_gate_core::plan_sync;
use listing_gate_core::sanitize_asset_name;
use proptest::prelude::*;

// ============================================================================
// SECTION: Strategies
// ============================================================================

/// Bounds matching the default marketplace configuration.
fn bounds() -> AssetSyncBounds {
    AssetSyncBounds {
        max_count: 30,
        max_bytes: 100 * 1_024,
        allowed_mime_types: vec!["image/png".to_string(), "image/gif".to_string()],
    }
}

/// Generates a list of upload entries with case-insensitively unique names.
fn unique_uploads() -> impl Strategy<Value = Vec<DesiredAsset>> {
    proptest::collection::vec("[a-zA-Z0-9._ -]{1,20}", 1..30).prop_map(|raw_names| {
        let mut seen = HashSet::new();
        raw_names
            .into_iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let name = format!("{raw}-{index}.png");
                let sanitized = sanitize_asset_name(&name).ok()?;
                if !seen.insert(sanitized.to_lowercase()) {
                    return None;
                }
                Some(DesiredAsset {
                    id: None,
                    name,
                    content: Some(AssetContent {
                        content_ref: ContentRef::new(format!("blob-{index}")),
                        mime_type: "image/png".to_string(),
                        size_bytes: 1_024,
                    }),
                })
            })
            .collect()
    })
}

/// Deterministic id generator for plan assertions.
fn id_gen() -> impl FnMut() -> AssetId {
    let mut counter = 0_u64;
    move || {
        counter += 1;
        AssetId::new(format!("asset-{counter}"))
    }
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn planned_sets_honor_uniqueness_and_the_cap(desired in unique_uploads()) {
        let current = AssetSet::default();
        let plan = plan_sync(
            &current,
            &desired,
            &bounds(),
            id_gen(),
            Timestamp::from_unix_millis(1_000),
        )
        .unwrap();

        prop_assert_eq!(plan.next.len(), desired.len());
        prop_assert!(plan.next.len() <= bounds().max_count);
        let mut names = HashSet::new();
        for record in &plan.next {
            prop_assert!(names.insert(record.name.to_lowercase()));
        }
    }

    #[test]
    fn replanning_a_committed_set_changes_nothing(desired in unique_uploads()) {
        let first = plan_sync(
            &AssetSet::default(),
            &desired,
            &bounds(),
            id_gen(),
            Timestamp::from_unix_millis(1_000),
        )
        .unwrap();
        let committed = AssetSet::from_records(first.next.clone()).unwrap();

        // Resubmitting the identical desired list later must be a no-op.
        let second = plan_sync(
            &committed,
            &desired,
            &bounds(),
            id_gen(),
            Timestamp::from_unix_millis(99_000),
        )
        .unwrap();
        prop_assert!(second.unchanged);
        prop_assert_eq!(second.next, first.next);
        prop_assert!(second.released.is_empty());
    }

    #[test]
    fn sanitized_names_never_carry_separators(raw in "\\PC{0,200}") {
        if let Ok(name) = sanitize_asset_name(&raw) {
            prop_assert!(!name.contains('/'));
            prop_assert!(!name.contains('\\'));
            prop_assert!(!name.contains('\r'));
            prop_assert!(!name.contains('\n'));
            prop_assert!(name.chars().count() <= 160);
            prop_assert!(!name.trim().is_empty());
        }
    }
}
