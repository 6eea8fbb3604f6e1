// crates/listing-gate-core/src/lib.rs
// ============================================================================
// Module: Listing Gate Core
// Description: Domain model, reconciliation engine, and PIN admission control.
// Purpose: Provide the backend-agnostic core consumed by stores and servers.
// Dependencies: rand, serde, subtle, thiserror, url
// ============================================================================

//! ## Overview
//! Listing Gate core models the authoritative listing record of a mini-app
//! marketplace and the two engines that mutate it: the reconciliation engine
//! merges independently edited sub-resources (core fields, screenshot slots,
//! the custom asset set, the preview selection) into one consistent listing
//! version, and the PIN admission controller issues, rotates, caps, and
//! revokes anonymous access sessions for pin-gated listings.
//!
//! The crate is deliberately free of I/O: persistence and external
//! collaborators (object storage, billing) are consumed through the traits
//! in [`interfaces`], wall-clock time is always caller-supplied, and
//! randomness is confined to the runtime helpers.

pub mod core;
pub mod interfaces;
pub mod runtime;

pub use crate::core::assets::AssetContent;
pub use crate::core::assets::AssetError;
pub use crate::core::assets::AssetSet;
pub use crate::core::assets::AssetSyncBounds;
pub use crate::core::assets::AssetSyncPlan;
pub use crate::core::assets::CustomAssetRecord;
pub use crate::core::assets::DesiredAsset;
pub use crate::core::assets::plan_sync;
pub use crate::core::assets::sanitize_asset_name;
pub use crate::core::identifiers::AnonId;
pub use crate::core::identifiers::AssetId;
pub use crate::core::identifiers::ContentRef;
pub use crate::core::identifiers::ListingId;
pub use crate::core::identifiers::SessionId;
pub use crate::core::identifiers::Slug;
pub use crate::core::identifiers::UserId;
pub use crate::core::listing::AccessConfig;
pub use crate::core::listing::AccessMode;
pub use crate::core::listing::InvariantViolation;
pub use crate::core::listing::LifecycleStatus;
pub use crate::core::listing::ListingLimits;
pub use crate::core::listing::ListingRecord;
pub use crate::core::listing::ListingState;
pub use crate::core::listing::Pin;
pub use crate::core::listing::PinSession;
pub use crate::core::listing::Visibility;
pub use crate::core::preview::PreviewBounds;
pub use crate::core::preview::PreviewError;
pub use crate::core::preview::PreviewRef;
pub use crate::core::preview::PreviewSelection;
pub use crate::core::preview::resolve_selection;
pub use crate::core::screenshots::SCREENSHOT_SLOT_COUNT;
pub use crate::core::screenshots::ScreenshotArray;
pub use crate::core::screenshots::ScreenshotError;
pub use crate::core::screenshots::ScreenshotSlot;
pub use crate::core::screenshots::ScreenshotUpload;
pub use crate::core::screenshots::normalize_screenshot_url;
pub use crate::core::time::Timestamp;
pub use crate::interfaces::EntitlementChecker;
pub use crate::interfaces::EntitlementError;
pub use crate::interfaces::ListingStore;
pub use crate::interfaces::NoopObjectStorage;
pub use crate::interfaces::ObjectStorage;
pub use crate::interfaces::SessionStore;
pub use crate::interfaces::SharedEntitlementChecker;
pub use crate::interfaces::SharedListingStore;
pub use crate::interfaces::SharedObjectStorage;
pub use crate::interfaces::SharedSessionStore;
pub use crate::interfaces::StorageError;
pub use crate::interfaces::StoreError;
pub use crate::runtime::admission::AdmissionError;
pub use crate::runtime::admission::AdmissionPolicy;
pub use crate::runtime::admission::PinAdmissionController;
pub use crate::runtime::memory::InMemoryListingStore;
pub use crate::runtime::memory::InMemorySessionStore;
pub use crate::runtime::reconcile::EditorContext;
pub use crate::runtime::reconcile::PartialEdit;
pub use crate::runtime::reconcile::ReconcileError;
pub use crate::runtime::reconcile::ReconciliationEngine;
pub use crate::runtime::supersede::ReadCoordinator;
pub use crate::runtime::supersede::ReadOutcome;
pub use crate::runtime::supersede::ReadTicket;
