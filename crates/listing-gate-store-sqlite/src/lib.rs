// crates/listing-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: Listing Gate SQLite Store
// Description: Durable listing and session storage backed by SQLite.
// Purpose: Persist listing snapshots and PIN sessions with atomic admission.
// Dependencies: listing-gate-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This crate implements the core store interfaces over a single `SQLite`
//! database. Listing records persist as canonical JSON snapshots with a
//! monotonic version column; PIN sessions persist relationally so admission
//! can evict, count, and insert inside one transaction.

pub mod store;

pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
