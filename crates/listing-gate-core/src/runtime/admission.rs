// crates/listing-gate-core/src/runtime/admission.rs
// ============================================================================
// Module: PIN Admission Controller
// Description: Issues, rotates, caps, and revokes access sessions for gated listings.
// Purpose: Enforce the concurrency cap and pin checks at admission time.
// Dependencies: crate::core, crate::interfaces, crate::runtime, thiserror
// ============================================================================

//! ## Overview
//! The admission controller manages the pin value and the live session set
//! of a pin-gated listing. Admission is the only read-then-write on the
//! session count and is serialized per listing by the store's atomic
//! check-then-insert, so concurrent admissions can never jointly exceed the
//! cap. Idle sessions are evicted lazily at admission and listing time;
//! there is no background sweep because capacity checks already scan the
//! live set.
//!
//! Security posture: candidate pins are untrusted and compared in constant
//! time; repeated wrong-pin attempts are rate limited per caller address.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use thiserror::Error;

use crate::core::identifiers::AnonId;
use crate::core::identifiers::ListingId;
use crate::core::identifiers::SessionId;
use crate::core::listing::AccessMode;
use crate::core::listing::ListingRecord;
use crate::core::listing::Pin;
use crate::core::listing::PinSession;
use crate::core::time::Timestamp;
use crate::interfaces::SharedListingStore;
use crate::interfaces::SharedSessionStore;
use crate::interfaces::StoreError;
use crate::runtime::generate_pin;
use crate::runtime::random_hex;
use crate::runtime::reconcile::EditorContext;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Admission policy knobs.
///
/// # Invariants
/// - `session_ttl_ms` is greater than zero.
/// - `rate_limit_max_attempts == 0` disables wrong-pin rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    /// Idle timeout after which sessions are lazily evicted.
    pub session_ttl_ms: u64,
    /// Sliding window for wrong-pin attempt tracking.
    pub rate_limit_window_ms: u64,
    /// Maximum wrong-pin attempts per caller within the window (0 disables).
    pub rate_limit_max_attempts: u32,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            session_ttl_ms: 300_000,
            rate_limit_window_ms: 300_000,
            rate_limit_max_attempts: 5,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Admission errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - `WrongPin` and `CapacityExceeded` are expected, frequent outcomes, not
///   faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// Listing does not exist or is hidden.
    #[error("listing not found")]
    NotFound,
    /// Caller is neither the owner nor an admin capability.
    #[error("caller is not the listing owner")]
    Unauthorized,
    /// Listing is not pin-gated.
    #[error("listing is not pin gated")]
    NotGated,
    /// Candidate pin does not match.
    #[error("wrong pin")]
    WrongPin,
    /// Live session count already at the configured cap.
    #[error("concurrent session capacity exceeded (cap {cap})")]
    CapacityExceeded {
        /// Configured cap.
        cap: u32,
    },
    /// Too many wrong-pin attempts from this caller.
    #[error("too many pin attempts; retry later")]
    TooManyAttempts,
    /// Session id does not resolve to a live session.
    #[error("session not found")]
    SessionNotFound,
    /// Store failure; nothing was committed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Attempt Tracking
// ============================================================================

/// Wrong-pin attempt window for one caller.
#[derive(Debug, Clone, Copy)]
struct AttemptWindow {
    /// Window start time.
    started_at: Timestamp,
    /// Attempts recorded within the window.
    count: u32,
}

// ============================================================================
// SECTION: Controller
// ============================================================================

/// PIN admission controller over shared store handles.
///
/// # Invariants
/// - The session store's atomic check-then-insert is the single
///   serialization point for capacity enforcement; the controller keeps no
///   process-wide counters.
pub struct PinAdmissionController {
    /// Listing persistence (pin value, cap, access mode).
    listings: SharedListingStore,
    /// Session persistence.
    sessions: SharedSessionStore,
    /// Configured policy.
    policy: AdmissionPolicy,
    /// Wrong-pin attempt windows keyed by listing and caller hash.
    attempts: Mutex<HashMap<(ListingId, String), AttemptWindow>>,
}

impl PinAdmissionController {
    /// Creates a controller over the given stores and policy.
    #[must_use]
    pub fn new(
        listings: SharedListingStore,
        sessions: SharedSessionStore,
        policy: AdmissionPolicy,
    ) -> Self {
        Self { listings, sessions, policy, attempts: Mutex::new(HashMap::new()) }
    }

    /// Returns the configured policy.
    #[must_use]
    pub const fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    /// Validates a candidate pin and mints a session within the concurrency
    /// cap.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::NotGated`] when the listing is not
    /// pin-gated, [`AdmissionError::TooManyAttempts`] when the caller
    /// exhausted the wrong-pin window, [`AdmissionError::WrongPin`] on a
    /// mismatch, and [`AdmissionError::CapacityExceeded`] when the live
    /// session count is already at the cap.
    pub fn admit(
        &self,
        handle: &str,
        candidate_pin: &str,
        anon_id: Option<AnonId>,
        ip_hash: &str,
        now: Timestamp,
    ) -> Result<PinSession, AdmissionError> {
        let record = self.load(handle)?;
        let AccessMode::Pin = record.access.mode else {
            return Err(AdmissionError::NotGated);
        };
        let Some(pin) = record.access.pin.as_ref() else {
            // A gated record without a pin is unreachable through the
            // reconciliation engine; fail closed if a store produced one.
            return Err(AdmissionError::WrongPin);
        };

        self.check_attempts(&record.id, ip_hash, now)?;
        if !pin.matches(candidate_pin) {
            self.record_attempt(&record.id, ip_hash, now);
            return Err(AdmissionError::WrongPin);
        }
        self.clear_attempts(&record.id, ip_hash);

        let session = PinSession {
            session_id: SessionId::new(random_hex(16)),
            listing_id: record.id.clone(),
            anon_id,
            ip_hash: ip_hash.to_string(),
            created_at: now,
            last_seen_at: now,
        };
        let cutoff = now.saturating_sub_millis(self.policy.session_ttl_ms);
        let cap = record.access.max_concurrent_pins;
        if self.sessions.admit_within_cap(&session, cutoff, cap)? {
            Ok(session)
        } else {
            Err(AdmissionError::CapacityExceeded { cap })
        }
    }

    /// Refreshes a session's `last_seen_at`.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::SessionNotFound`] for unknown, expired, or
    /// rotated-away sessions and [`AdmissionError::NotGated`] when the
    /// listing is no longer pin-gated.
    pub fn heartbeat(
        &self,
        handle: &str,
        session_id: &SessionId,
        now: Timestamp,
    ) -> Result<(), AdmissionError> {
        let record = self.load(handle)?;
        if record.access.mode != AccessMode::Pin {
            return Err(AdmissionError::NotGated);
        }
        let cutoff = now.saturating_sub_millis(self.policy.session_ttl_ms);
        let Some(session) = self.sessions.get(&record.id, session_id)? else {
            return Err(AdmissionError::SessionNotFound);
        };
        if !session.is_live(cutoff) {
            let _removed = self.sessions.remove(&record.id, session_id)?;
            return Err(AdmissionError::SessionNotFound);
        }
        if self.sessions.touch(&record.id, session_id, now)? {
            Ok(())
        } else {
            Err(AdmissionError::SessionNotFound)
        }
    }

    /// Rotates the pin and invalidates every live session; all current
    /// viewers must re-admit under the new pin.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Unauthorized`] for non-owners,
    /// [`AdmissionError::NotGated`] when the listing is not pin-gated, and
    /// [`AdmissionError::Store`] on backend failure.
    pub fn rotate(
        &self,
        handle: &str,
        editor: &EditorContext,
        now: Timestamp,
    ) -> Result<String, AdmissionError> {
        let mut record = self.load_for_owner(handle, editor)?;
        if record.access.mode != AccessMode::Pin {
            return Err(AdmissionError::NotGated);
        }
        let new_pin = generate_pin();
        record.access.pin = Some(Pin::new(new_pin.clone()));
        record.version += 1;
        record.updated_at = now;
        self.listings.save(&record)?;
        let _removed = self.sessions.remove_all(&record.id)?;
        Ok(new_pin)
    }

    /// Revokes exactly one session, leaving the pin and other sessions
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Unauthorized`] for non-owners and
    /// [`AdmissionError::SessionNotFound`] when the session is absent.
    pub fn revoke(
        &self,
        handle: &str,
        editor: &EditorContext,
        session_id: &SessionId,
    ) -> Result<(), AdmissionError> {
        let record = self.load_for_owner(handle, editor)?;
        if self.sessions.remove(&record.id, session_id)? {
            Ok(())
        } else {
            Err(AdmissionError::SessionNotFound)
        }
    }

    /// Lists the live sessions for the owner's polling dashboard, evicting
    /// idle sessions lazily.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Unauthorized`] for non-owners and
    /// [`AdmissionError::Store`] on backend failure.
    pub fn list_sessions(
        &self,
        handle: &str,
        editor: &EditorContext,
        now: Timestamp,
    ) -> Result<Vec<PinSession>, AdmissionError> {
        let record = self.load_for_owner(handle, editor)?;
        let cutoff = now.saturating_sub_millis(self.policy.session_ttl_ms);
        Ok(self.sessions.list_live(&record.id, cutoff)?)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Loads a live record by handle.
    fn load(&self, handle: &str) -> Result<ListingRecord, AdmissionError> {
        let record = self.listings.resolve(handle)?.ok_or(AdmissionError::NotFound)?;
        if record.is_soft_deleted() {
            return Err(AdmissionError::NotFound);
        }
        Ok(record)
    }

    /// Loads a live record and authorizes the owner or an admin capability.
    fn load_for_owner(
        &self,
        handle: &str,
        editor: &EditorContext,
    ) -> Result<ListingRecord, AdmissionError> {
        let record = self.load(handle)?;
        if !editor.may_edit(&record) {
            return Err(AdmissionError::Unauthorized);
        }
        Ok(record)
    }

    /// Fails when the caller exhausted the wrong-pin window.
    fn check_attempts(
        &self,
        listing_id: &ListingId,
        ip_hash: &str,
        now: Timestamp,
    ) -> Result<(), AdmissionError> {
        if self.policy.rate_limit_max_attempts == 0 {
            return Ok(());
        }
        let guard = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(window) = guard.get(&(listing_id.clone(), ip_hash.to_string())) else {
            return Ok(());
        };
        let within_window =
            now.millis_since(window.started_at) < self.policy.rate_limit_window_ms;
        if within_window && window.count >= self.policy.rate_limit_max_attempts {
            return Err(AdmissionError::TooManyAttempts);
        }
        Ok(())
    }

    /// Records one wrong-pin attempt for the caller.
    fn record_attempt(&self, listing_id: &ListingId, ip_hash: &str, now: Timestamp) {
        if self.policy.rate_limit_max_attempts == 0 {
            return;
        }
        let mut guard = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        let window = guard
            .entry((listing_id.clone(), ip_hash.to_string()))
            .or_insert(AttemptWindow { started_at: now, count: 0 });
        if now.millis_since(window.started_at) >= self.policy.rate_limit_window_ms {
            window.started_at = now;
            window.count = 0;
        }
        window.count = window.count.saturating_add(1);
    }

    /// Clears the caller's attempt window after a successful match.
    fn clear_attempts(&self, listing_id: &ListingId, ip_hash: &str) {
        if self.policy.rate_limit_max_attempts == 0 {
            return;
        }
        let mut guard = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        guard.remove(&(listing_id.clone(), ip_hash.to_string()));
    }
}
