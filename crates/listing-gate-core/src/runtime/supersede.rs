// crates/listing-gate-core/src/runtime/supersede.rs
// ============================================================================
// Module: Read Supersession
// Description: Request tokens that let newer reads supersede stale in-flight reads.
// Purpose: Ensure only the newest in-flight read may transition caller state.
// Dependencies: crate::core::identifiers, std::sync
// ============================================================================

//! ## Overview
//! Slug/id resolution and per-viewer personalization can race navigation: a
//! client may issue a fresh listing read before the previous one resolves.
//! The coordinator associates every read with a per-`(listing, viewer)`
//! ticket; completing a read whose ticket has been overtaken reports
//! superseded, and the caller discards the result instead of applying stale
//! state. Reads are side-effect-free, so discarding a superseded result (or
//! a disconnected client) has no server-side consequences.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::core::identifiers::UserId;

// ============================================================================
// SECTION: Tickets
// ============================================================================

/// Ticket identifying one in-flight read for a `(listing, viewer)` pair.
///
/// # Invariants
/// - Tickets are strictly increasing per pair; larger wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReadTicket(u64);

/// Outcome of completing a read.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The read is the newest for its pair; the result may be applied.
    Current,
    /// A newer read was issued; the result must be discarded.
    Superseded,
}

/// Key of one read stream.
type ReadKey = (String, Option<UserId>);

// ============================================================================
// SECTION: Coordinator
// ============================================================================

/// Issues and resolves read tickets per `(listing, viewer)` pair.
///
/// # Invariants
/// - All ticket operations are linearizable with respect to each other.
#[derive(Debug, Default)]
pub struct ReadCoordinator {
    /// Latest ticket issued per pair.
    latest: Mutex<HashMap<ReadKey, u64>>,
}

impl ReadCoordinator {
    /// Creates an empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new read, superseding any prior in-flight read for the
    /// same pair.
    #[must_use]
    pub fn begin(&self, handle: &str, viewer: Option<&UserId>) -> ReadTicket {
        let mut guard = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let counter = guard.entry((handle.to_string(), viewer.cloned())).or_insert(0);
        *counter += 1;
        ReadTicket(*counter)
    }

    /// Resolves a finished read: reports whether its result is still the
    /// newest for the pair or has been superseded.
    #[must_use]
    pub fn finish(
        &self,
        handle: &str,
        viewer: Option<&UserId>,
        ticket: ReadTicket,
    ) -> ReadOutcome {
        let guard = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let latest = guard.get(&(handle.to_string(), viewer.cloned())).copied().unwrap_or(0);
        if ticket.0 >= latest { ReadOutcome::Current } else { ReadOutcome::Superseded }
    }
}
