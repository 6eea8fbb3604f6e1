// crates/listing-gate-api/src/audit.rs
// ============================================================================
// Module: API Audit Events
// Description: Structured audit events for security-relevant outcomes.
// Purpose: Record authorization, validation, and admission outcomes without hard deps.
// Dependencies: listing-gate-core, tracing
// ============================================================================

//! ## Overview
//! The API emits one audit event per security-relevant outcome through a
//! thin sink interface, so deployments can forward them to their own
//! pipeline without redesign. Admission denials (wrong pin, capacity) are
//! expected, frequent outcomes and are recorded at info level; authorization
//! and validation failures indicate client bugs or abuse and are recorded at
//! warn level.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use tracing::info;
use tracing::warn;

// ============================================================================
// SECTION: Events
// ============================================================================

/// One security-relevant request outcome.
///
/// # Invariants
/// - Events never carry pins, credentials, or raw caller addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    /// Caller failed authorization for an owner-gated operation.
    AuthorizationRejected {
        /// Route template that rejected the caller.
        route: &'static str,
        /// Listing handle from the request path.
        handle: String,
    },
    /// Request payload failed validation.
    ValidationRejected {
        /// Route template that rejected the payload.
        route: &'static str,
        /// Listing handle from the request path.
        handle: String,
        /// Stable error code.
        code: &'static str,
    },
    /// Admission was denied (expected, frequent outcome).
    AdmissionDenied {
        /// Listing handle from the request path.
        handle: String,
        /// Stable error code.
        code: &'static str,
    },
    /// A session was minted.
    SessionAdmitted {
        /// Listing handle from the request path.
        handle: String,
    },
    /// The pin was rotated and all sessions invalidated.
    PinRotated {
        /// Listing handle from the request path.
        handle: String,
    },
    /// One session was revoked by the owner.
    SessionRevoked {
        /// Listing handle from the request path.
        handle: String,
    },
}

// ============================================================================
// SECTION: Sink
// ============================================================================

/// Audit sink interface.
pub trait AuditSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: &AuditEvent);
}

/// Shared handle to the audit sink.
pub type SharedAuditSink = Arc<dyn AuditSink>;

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

/// Sink that forwards events to the tracing subscriber at the levels the
/// error-handling policy prescribes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        match event {
            AuditEvent::AuthorizationRejected { route, handle } => {
                warn!(route, handle = handle.as_str(), "authorization rejected");
            }
            AuditEvent::ValidationRejected { route, handle, code } => {
                warn!(route, handle = handle.as_str(), code, "validation rejected");
            }
            AuditEvent::AdmissionDenied { handle, code } => {
                info!(handle = handle.as_str(), code, "admission denied");
            }
            AuditEvent::SessionAdmitted { handle } => {
                info!(handle = handle.as_str(), "session admitted");
            }
            AuditEvent::PinRotated { handle } => {
                info!(handle = handle.as_str(), "pin rotated");
            }
            AuditEvent::SessionRevoked { handle } => {
                info!(handle = handle.as_str(), "session revoked");
            }
        }
    }
}
