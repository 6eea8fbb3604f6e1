// crates/listing-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Listing Gate Runtime
// Description: Reconciliation, admission, supersession, and in-memory stores.
// Purpose: Group the engines that mutate the core data model.
// Dependencies: crate::core, crate::interfaces, rand
// ============================================================================

//! ## Overview
//! The runtime module holds the engines that drive the data model: the
//! reconciliation engine for edits, the PIN admission controller for gated
//! access, the read supersession coordinator, and in-memory store
//! implementations for tests and embedded use. Randomness (pin and
//! identifier generation) is confined to the helpers here so the core data
//! model stays deterministic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rand::Rng;
use rand::RngCore;

pub mod admission;
pub mod memory;
pub mod reconcile;
pub mod supersede;

// ============================================================================
// SECTION: Randomness Helpers
// ============================================================================

/// Generates a fresh 4-digit pin.
#[must_use]
pub fn generate_pin() -> String {
    let value: u16 = rand::thread_rng().gen_range(1_000..10_000);
    value.to_string()
}

/// Generates `bytes` random bytes rendered as lowercase hex.
///
/// Used for session and asset identifiers; 16 bytes yields 128 bits of
/// entropy, enough to make identifiers unguessable.
#[must_use]
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0_u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    let mut out = String::with_capacity(bytes * 2);
    for byte in buf {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
