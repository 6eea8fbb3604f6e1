// crates/listing-gate-api/src/bootstrap.rs
// ============================================================================
// Module: API Bootstrap
// Description: Store selection and state assembly from configuration.
// Purpose: Build the shared server state a deployment serves with.
// Dependencies: listing-gate-core, listing-gate-config, listing-gate-store-sqlite
// ============================================================================

//! ## Overview
//! Bootstrap turns a validated configuration document into runnable server
//! state: it opens the configured store backend, constructs the engines, and
//! wires the collaborator handles. Deployments with real auth and billing
//! services supply their own resolver and entitlement checker; the defaults
//! here resolve no credentials and treat unpriced listings as free.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use listing_gate_config::ListingGateConfig;
use listing_gate_config::StoreBackend;
use listing_gate_core::EntitlementChecker;
use listing_gate_core::EntitlementError;
use listing_gate_core::InMemoryListingStore;
use listing_gate_core::InMemorySessionStore;
use listing_gate_core::ListingId;
use listing_gate_core::NoopObjectStorage;
use listing_gate_core::PinAdmissionController;
use listing_gate_core::ReadCoordinator;
use listing_gate_core::ReconciliationEngine;
use listing_gate_core::SharedListingStore;
use listing_gate_core::SharedSessionStore;
use listing_gate_core::UserId;
use listing_gate_store_sqlite::SqliteStore;
use listing_gate_store_sqlite::SqliteStoreConfig;
use listing_gate_store_sqlite::SqliteStoreError;
use thiserror::Error;

use crate::audit::SharedAuditSink;
use crate::auth::SharedIdentityResolver;
use crate::server::AppState;
use crate::server::SharedState;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Bootstrap errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Store backend failed to open.
    #[error(transparent)]
    Store(#[from] SqliteStoreError),
}

// ============================================================================
// SECTION: Default Collaborators
// ============================================================================

/// Entitlement checker that denies every priced play.
///
/// Deployments without a billing service keep priced listings gated shut
/// rather than silently free.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAllEntitlements;

impl EntitlementChecker for DenyAllEntitlements {
    fn may_play(
        &self,
        _listing_id: &ListingId,
        _viewer: &UserId,
    ) -> Result<bool, EntitlementError> {
        Ok(false)
    }
}

// ============================================================================
// SECTION: Assembly
// ============================================================================

/// Builds shared server state from a validated configuration document.
///
/// # Errors
///
/// Returns [`BootstrapError`] when the configured store cannot be opened.
pub fn build_state(
    config: &ListingGateConfig,
    identity: SharedIdentityResolver,
    entitlements: Arc<dyn EntitlementChecker>,
    audit: SharedAuditSink,
) -> Result<SharedState, BootstrapError> {
    let (listings, sessions): (SharedListingStore, SharedSessionStore) =
        match config.store.backend {
            StoreBackend::Sqlite => {
                let mut store_config = SqliteStoreConfig::new(config.store.path.clone());
                store_config.busy_timeout_ms = config.store.busy_timeout_ms;
                let store = Arc::new(SqliteStore::open(&store_config)?);
                let listings: SharedListingStore = store.clone();
                let sessions: SharedSessionStore = store;
                (listings, sessions)
            }
            StoreBackend::Memory => {
                let listings: SharedListingStore = Arc::new(InMemoryListingStore::new());
                let sessions: SharedSessionStore = Arc::new(InMemorySessionStore::new());
                (listings, sessions)
            }
        };

    let limits = config.limits.to_limits();
    let engine = ReconciliationEngine::new(
        listings.clone(),
        sessions.clone(),
        Arc::new(NoopObjectStorage),
        limits,
    );
    let admission =
        PinAdmissionController::new(listings, sessions, config.admission.to_policy());

    Ok(Arc::new(AppState {
        engine,
        admission,
        reads: ReadCoordinator::new(),
        identity,
        entitlements,
        audit,
    }))
}
