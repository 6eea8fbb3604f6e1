// crates/listing-gate-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Stores
// Description: Mutex-guarded map implementations of the store interfaces.
// Purpose: Back tests and embedded deployments without external storage.
// Dependencies: crate::core, crate::interfaces, std::sync
// ============================================================================

//! ## Overview
//! In-memory stores implement the listing and session interfaces over
//! mutex-guarded maps. They honor the same contracts as durable backends:
//! monotonic listing versions, slug uniqueness, and an atomic
//! evict-count-insert for admission so the concurrency cap holds under
//! concurrent callers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::core::identifiers::ListingId;
use crate::core::identifiers::SessionId;
use crate::core::listing::ListingRecord;
use crate::core::listing::PinSession;
use crate::core::time::Timestamp;
use crate::interfaces::ListingStore;
use crate::interfaces::SessionStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Listing Store
// ============================================================================

/// Mutex-guarded in-memory listing store.
///
/// # Invariants
/// - Saves enforce monotonic versions and slug uniqueness.
#[derive(Debug, Default)]
pub struct InMemoryListingStore {
    /// Records keyed by listing id.
    records: Mutex<HashMap<ListingId, ListingRecord>>,
}

impl InMemoryListingStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ListingStore for InMemoryListingStore {
    fn get(&self, id: &ListingId) -> Result<Option<ListingRecord>, StoreError> {
        let guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(id).cloned())
    }

    fn resolve(&self, handle: &str) -> Result<Option<ListingRecord>, StoreError> {
        let guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let by_slug = guard.values().find(|record| record.slug.as_str() == handle);
        if let Some(record) = by_slug {
            return Ok(Some(record.clone()));
        }
        Ok(guard.get(&ListingId::new(handle)).cloned())
    }

    fn save(&self, record: &ListingRecord) -> Result<(), StoreError> {
        let mut guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(stored) = guard.get(&record.id)
            && record.version <= stored.version
        {
            return Err(StoreError::VersionConflict {
                attempted: record.version,
                stored: stored.version,
            });
        }
        let slug_taken = guard
            .values()
            .any(|other| other.id != record.id && other.slug == record.slug);
        if slug_taken {
            return Err(StoreError::SlugTaken { slug: record.slug.as_str().to_string() });
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn remove(&self, id: &ListingId) -> Result<bool, StoreError> {
        let mut guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.remove(id).is_some())
    }
}

// ============================================================================
// SECTION: Session Store
// ============================================================================

/// Mutex-guarded in-memory session store.
///
/// # Invariants
/// - `admit_within_cap` performs evict, count, and insert under one lock, so
///   concurrent admissions for a listing serialize.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    /// Sessions keyed by listing, then session id.
    sessions: Mutex<HashMap<ListingId, HashMap<SessionId, PinSession>>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn admit_within_cap(
        &self,
        session: &PinSession,
        cutoff: Timestamp,
        cap: u32,
    ) -> Result<bool, StoreError> {
        let mut guard = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let listing_sessions = guard.entry(session.listing_id.clone()).or_default();
        listing_sessions.retain(|_, existing| existing.is_live(cutoff));
        if u64::try_from(listing_sessions.len()).unwrap_or(u64::MAX) >= u64::from(cap) {
            return Ok(false);
        }
        listing_sessions.insert(session.session_id.clone(), session.clone());
        Ok(true)
    }

    fn get(
        &self,
        listing_id: &ListingId,
        session_id: &SessionId,
    ) -> Result<Option<PinSession>, StoreError> {
        let guard = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(listing_id).and_then(|sessions| sessions.get(session_id)).cloned())
    }

    fn touch(
        &self,
        listing_id: &ListingId,
        session_id: &SessionId,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        let mut guard = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(session) =
            guard.get_mut(listing_id).and_then(|sessions| sessions.get_mut(session_id))
        else {
            return Ok(false);
        };
        session.last_seen_at = now;
        Ok(true)
    }

    fn remove(
        &self,
        listing_id: &ListingId,
        session_id: &SessionId,
    ) -> Result<bool, StoreError> {
        let mut guard = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard
            .get_mut(listing_id)
            .is_some_and(|sessions| sessions.remove(session_id).is_some()))
    }

    fn remove_all(&self, listing_id: &ListingId) -> Result<u64, StoreError> {
        let mut guard = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = guard
            .remove(listing_id)
            .map_or(0, |sessions| u64::try_from(sessions.len()).unwrap_or(u64::MAX));
        Ok(removed)
    }

    fn list_live(
        &self,
        listing_id: &ListingId,
        cutoff: Timestamp,
    ) -> Result<Vec<PinSession>, StoreError> {
        let mut guard = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(listing_sessions) = guard.get_mut(listing_id) else {
            return Ok(Vec::new());
        };
        listing_sessions.retain(|_, session| session.is_live(cutoff));
        let mut live: Vec<PinSession> = listing_sessions.values().cloned().collect();
        live.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(live)
    }
}
