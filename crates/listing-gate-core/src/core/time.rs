// crates/listing-gate-core/src/core/time.rs
// ============================================================================
// Module: Listing Gate Time Model
// Description: Canonical timestamp representation for records and sessions.
// Purpose: Provide deterministic, caller-supplied time values across Listing Gate records.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Listing Gate embeds explicit time values in records and sessions to keep
//! reconciliation and admission deterministic and testable. The core engine
//! never reads wall-clock time directly; hosts must supply `now` on every
//! mutating call. Session TTL arithmetic requires total ordering and
//! subtraction, so timestamps are plain unix-epoch milliseconds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Canonical timestamp in unix-epoch milliseconds.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads wall-clock time.
/// - No validation is performed; monotonicity is a caller responsibility.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix-epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix-epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the timestamp moved backwards by `millis`, saturating at the
    /// representable minimum.
    #[must_use]
    pub const fn saturating_sub_millis(self, millis: u64) -> Self {
        let delta = if millis > i64::MAX as u64 { i64::MAX } else { millis as i64 };
        Self(self.0.saturating_sub(delta))
    }

    /// Returns the number of milliseconds elapsed since `earlier`, or zero
    /// when `earlier` is not in the past.
    #[must_use]
    pub const fn millis_since(self, earlier: Self) -> u64 {
        let delta = self.0.saturating_sub(earlier.0);
        if delta < 0 { 0 } else { delta as u64 }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
