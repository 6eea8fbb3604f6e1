// crates/listing-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Listing Gate Interfaces
// Description: Backend-agnostic interfaces for storage and collaborators.
// Purpose: Define the contract surfaces used by the Listing Gate runtime.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how Listing Gate integrates with durable storage and
//! the external collaborators (object storage, billing) without embedding
//! backend-specific details. Implementations must fail closed: a store error
//! aborts the whole operation and no partial commit is ever observable.
//!
//! Security posture: data returned by store implementations is untrusted;
//! the runtime re-validates aggregate invariants before mutating it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::identifiers::ContentRef;
use crate::core::identifiers::ListingId;
use crate::core::identifiers::SessionId;
use crate::core::identifiers::UserId;
use crate::core::listing::ListingRecord;
use crate::core::listing::PinSession;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Store operation errors shared by listing and session stores.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages avoid embedding full record payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Underlying I/O or engine failure.
    #[error("store io error: {0}")]
    Io(String),
    /// Persisted data failed integrity or deserialization checks.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// Write rejected because it would move a version backwards.
    #[error("version conflict: attempted {attempted}, stored {stored}")]
    VersionConflict {
        /// Version carried by the rejected write.
        attempted: u64,
        /// Version currently stored.
        stored: u64,
    },
    /// Write rejected because the slug is already claimed by another listing.
    #[error("slug already in use: {slug}")]
    SlugTaken {
        /// Conflicting slug value.
        slug: String,
    },
}

// ============================================================================
// SECTION: Listing Store
// ============================================================================

/// Durable storage for listing records.
///
/// Implementations must apply each `save` atomically and enforce monotonic
/// versions so that concurrent reconciliations cannot interleave partial
/// states.
pub trait ListingStore: Send + Sync {
    /// Loads a record by its immutable id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails; absence is `Ok(None)`.
    fn get(&self, id: &ListingId) -> Result<Option<ListingRecord>, StoreError>;

    /// Resolves a record by external handle: slug first, then raw id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails; absence is `Ok(None)`.
    fn resolve(&self, handle: &str) -> Result<Option<ListingRecord>, StoreError>;

    /// Persists a record atomically.
    ///
    /// Inserts when the id is new; otherwise the record's version must be
    /// strictly greater than the stored version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionConflict`] on non-monotonic writes and
    /// [`StoreError::SlugTaken`] when the slug belongs to another listing.
    fn save(&self, record: &ListingRecord) -> Result<(), StoreError>;

    /// Hard-deletes a record, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn remove(&self, id: &ListingId) -> Result<bool, StoreError>;
}

/// Shared handle to a listing store.
pub type SharedListingStore = Arc<dyn ListingStore>;

// ============================================================================
// SECTION: Session Store
// ============================================================================

/// Durable storage for PIN sessions.
///
/// All mutations for one listing must be linearizable with respect to each
/// other; [`SessionStore::admit_within_cap`] is the designated atomic
/// check-then-insert used to enforce the concurrency cap.
pub trait SessionStore: Send + Sync {
    /// Atomically evicts sessions idle since before `cutoff`, counts the
    /// remaining live sessions, and inserts `session` only when the count is
    /// below `cap`. Returns whether the session was admitted.
    ///
    /// No two concurrent calls for the same listing may both observe a count
    /// below the cap and jointly exceed it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails; the session is not
    /// inserted on error.
    fn admit_within_cap(
        &self,
        session: &PinSession,
        cutoff: Timestamp,
        cap: u32,
    ) -> Result<bool, StoreError>;

    /// Loads one session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails; absence is `Ok(None)`.
    fn get(
        &self,
        listing_id: &ListingId,
        session_id: &SessionId,
    ) -> Result<Option<PinSession>, StoreError>;

    /// Updates a session's `last_seen_at`, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn touch(
        &self,
        listing_id: &ListingId,
        session_id: &SessionId,
        now: Timestamp,
    ) -> Result<bool, StoreError>;

    /// Deletes one session, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn remove(
        &self,
        listing_id: &ListingId,
        session_id: &SessionId,
    ) -> Result<bool, StoreError>;

    /// Deletes every session for a listing, returning the removed count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn remove_all(&self, listing_id: &ListingId) -> Result<u64, StoreError>;

    /// Evicts sessions idle since before `cutoff` and lists the remainder.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn list_live(
        &self,
        listing_id: &ListingId,
        cutoff: Timestamp,
    ) -> Result<Vec<PinSession>, StoreError>;
}

/// Shared handle to a session store.
pub type SharedSessionStore = Arc<dyn SessionStore>;

// ============================================================================
// SECTION: Object Storage Collaborator
// ============================================================================

/// Object storage release errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Storage collaborator reported an error.
    #[error("object storage error: {0}")]
    Unavailable(String),
}

/// External object storage consumed through a narrow release interface.
///
/// Uploads happen outside the core (content arrives as already-persisted
/// descriptors); the core only asks storage to release content displaced by
/// asset deletion, replacement, or hard deletes. Releases are best-effort:
/// the runtime never aborts a committed operation over a release failure.
pub trait ObjectStorage: Send + Sync {
    /// Releases one stored object.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the collaborator fails; callers treat
    /// this as best-effort.
    fn release(&self, content_ref: &ContentRef) -> Result<(), StorageError>;
}

/// Shared handle to the object storage collaborator.
pub type SharedObjectStorage = Arc<dyn ObjectStorage>;

/// Object storage that drops release requests; useful for tests and
/// deployments where cleanup runs out-of-band.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObjectStorage;

impl ObjectStorage for NoopObjectStorage {
    fn release(&self, _content_ref: &ContentRef) -> Result<(), StorageError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Entitlement Collaborator
// ============================================================================

/// Entitlement check errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntitlementError {
    /// Entitlement collaborator reported an error.
    #[error("entitlement check error: {0}")]
    Unavailable(String),
}

/// Billing/entitlement collaborator consumed as a boolean gate.
///
/// The core never computes pricing logic; it only gates play access on the
/// returned boolean.
pub trait EntitlementChecker: Send + Sync {
    /// Returns whether the viewer may play the priced listing.
    ///
    /// # Errors
    ///
    /// Returns [`EntitlementError`] when the collaborator fails; callers
    /// fail closed (no access) on error.
    fn may_play(&self, listing_id: &ListingId, viewer: &UserId)
    -> Result<bool, EntitlementError>;
}

/// Shared handle to the entitlement collaborator.
pub type SharedEntitlementChecker = Arc<dyn EntitlementChecker>;
