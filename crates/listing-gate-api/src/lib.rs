// crates/listing-gate-api/src/lib.rs
// ============================================================================
// Module: Listing Gate API
// Description: HTTP surface for the reconciliation and admission contracts.
// Purpose: Expose the core engines over axum with stable JSON envelopes.
// Dependencies: listing-gate-core, listing-gate-config, listing-gate-store-sqlite,
// axum, serde, serde_json, sha2, time, tokio, tracing
// ============================================================================

//! ## Overview
//! The API crate binds the reconciliation engine and the PIN admission
//! controller to the marketplace route shapes: listing fetch/patch/delete,
//! custom asset sync, screenshot slots, preview selection, state toggling,
//! the entitlement gate, and the pin admit/heartbeat/rotate/revoke/sessions
//! family. Identity and billing remain external collaborators consumed
//! through narrow traits; wall-clock time enters only at this edge.

pub mod audit;
pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod server;

pub use audit::AuditEvent;
pub use audit::AuditSink;
pub use audit::NoopAuditSink;
pub use audit::SharedAuditSink;
pub use audit::TracingAuditSink;
pub use auth::Identity;
pub use auth::IdentityResolver;
pub use auth::SharedIdentityResolver;
pub use auth::StaticTokenResolver;
pub use auth::extract_bearer;
pub use auth::hash_caller_addr;
pub use error::ApiError;
pub use server::AppState;
pub use server::SUPERSEDED_HEADER;
pub use server::SharedState;
pub use server::build_router;
pub use server::now;
