// crates/listing-gate-api/src/server/tests.rs
// ============================================================================
// Module: API Server Unit Tests
// Description: Unit tests for handler envelopes, statuses, and audit hooks.
// Purpose: Validate the HTTP contract with in-memory fixtures.
// Dependencies: listing-gate-api
// ============================================================================

//! ## Overview
//! Exercises the handlers directly with in-memory stores: envelope shapes,
//! status mapping, identity gating, the admission scenario from the
//! contract, and supersession marking on the read path.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions over in-memory fixtures."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::body::to_bytes;
use axum::extract::ConnectInfo;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use listing_gate_core::AccessMode;
use listing_gate_core::AdmissionPolicy;
use listing_gate_core::InMemoryListingStore;
use listing_gate_core::InMemorySessionStore;
use listing_gate_core::ListingId;
use listing_gate_core::ListingLimits;
use listing_gate_core::ListingRecord;
use listing_gate_core::ListingStore;
use listing_gate_core::NoopObjectStorage;
use listing_gate_core::PartialEdit;
use listing_gate_core::Pin;
use listing_gate_core::PinAdmissionController;
use listing_gate_core::ReadCoordinator;
use listing_gate_core::ReconciliationEngine;
use listing_gate_core::Slug;
use listing_gate_core::Timestamp;
use listing_gate_core::UserId;
use serde_json::Value;
use serde_json::json;

use super::AdmitBody;
use super::AppState;
use super::DeleteParams;
use super::HeartbeatBody;
use super::SUPERSEDED_HEADER;
use super::SharedState;
use super::handle_admit;
use super::handle_delete_listing;
use super::handle_fetch_listing;
use super::handle_heartbeat;
use super::handle_list_sessions;
use super::handle_patch_listing;
use super::handle_revoke_session;
use super::handle_rotate_pin;
use crate::audit::NoopAuditSink;
use crate::auth::StaticTokenResolver;
use crate::bootstrap::DenyAllEntitlements;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Builds server state over in-memory stores with a seeded gated listing.
fn fixture() -> SharedState {
    let listings = Arc::new(InMemoryListingStore::new());
    let sessions = Arc::new(InMemorySessionStore::new());

    let mut record = ListingRecord::new(
        ListingId::new("app-1"),
        Slug::new("pixel-quest"),
        UserId::new("owner-1"),
        "Pixel Quest",
        Timestamp::from_unix_millis(1_000),
    );
    record.access.mode = AccessMode::Pin;
    record.access.pin = Some(Pin::new("1234"));
    record.access.max_concurrent_pins = 1;
    listings.save(&record).unwrap();

    let engine = ReconciliationEngine::new(
        listings.clone(),
        sessions.clone(),
        Arc::new(NoopObjectStorage),
        ListingLimits::default(),
    );
    let admission =
        PinAdmissionController::new(listings, sessions, AdmissionPolicy::default());
    let identity = StaticTokenResolver::new()
        .with_user("owner-token", "owner-1")
        .with_user("viewer-token", "viewer-1");

    Arc::new(AppState {
        engine,
        admission,
        reads: ReadCoordinator::new(),
        identity: Arc::new(identity),
        entitlements: Arc::new(DenyAllEntitlements),
        audit: Arc::new(NoopAuditSink),
    })
}

/// Headers carrying the given bearer token.
fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&format!("Bearer {token}")).unwrap();
    headers.insert(AUTHORIZATION, value);
    headers
}

/// Caller address used by admission tests.
fn caller() -> ConnectInfo<SocketAddr> {
    ConnectInfo(SocketAddr::from(([203, 0, 113, 7], 40_000)))
}

/// Decodes a response body into JSON.
async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// SECTION: Listing Routes
// ============================================================================

#[tokio::test]
async fn fetch_returns_the_envelope_and_supersession_marker() {
    let state = fixture();

    let response = handle_fetch_listing(
        State(state.clone()),
        Path("pixel-quest".to_string()),
        bearer("owner-token"),
    )
    .await
    .unwrap();

    assert_eq!(
        response.headers().get(SUPERSEDED_HEADER),
        Some(&HeaderValue::from_static("false"))
    );
    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["item"]["slug"], json!("pixel-quest"));
    // The owner sees the stored pin.
    assert_eq!(body["item"]["access"]["pin"], json!("1234"));
}

#[tokio::test]
async fn fetch_redacts_the_pin_for_viewers() {
    let state = fixture();

    let response = handle_fetch_listing(
        State(state.clone()),
        Path("pixel-quest".to_string()),
        bearer("viewer-token"),
    )
    .await
    .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["item"]["access"].get("pin"), None);
}

#[tokio::test]
async fn patch_requires_identity_and_ownership() {
    let state = fixture();
    let edit = PartialEdit { title: Some("Retitled".to_string()), ..PartialEdit::default() };

    let err = handle_patch_listing(
        State(state.clone()),
        Path("pixel-quest".to_string()),
        HeaderMap::new(),
        Json(edit.clone()),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);

    let err = handle_patch_listing(
        State(state.clone()),
        Path("pixel-quest".to_string()),
        bearer("viewer-token"),
        Json(edit.clone()),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::FORBIDDEN);

    let response = handle_patch_listing(
        State(state),
        Path("pixel-quest".to_string()),
        bearer("owner-token"),
        Json(edit),
    )
    .await
    .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["item"]["title"], json!("Retitled"));
}

#[tokio::test]
async fn validation_failures_map_to_bad_request() {
    let state = fixture();
    let edit = PartialEdit { description: Some("x".repeat(501)), ..PartialEdit::default() };

    let err = handle_patch_listing(
        State(state),
        Path("pixel-quest".to_string()),
        bearer("owner-token"),
        Json(edit),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.code, "validation_failed");
}

#[tokio::test]
async fn soft_delete_hides_the_listing_from_viewers() {
    let state = fixture();

    handle_delete_listing(
        State(state.clone()),
        Path("pixel-quest".to_string()),
        Query(DeleteParams { hard: false }),
        bearer("owner-token"),
    )
    .await
    .unwrap();

    let err = handle_fetch_listing(
        State(state),
        Path("pixel-quest".to_string()),
        bearer("viewer-token"),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

// ============================================================================
// SECTION: Admission Routes
// ============================================================================

#[tokio::test]
async fn admission_scenario_cap_one_revoke_readmit() {
    let state = fixture();

    // First admission succeeds.
    let response = handle_admit(
        State(state.clone()),
        Path("pixel-quest".to_string()),
        caller(),
        Json(AdmitBody { pin: "1234".to_string(), anon_id: None }),
    )
    .await
    .unwrap();
    let body = body_json(response).await;
    let session_a = body["session_id"].as_str().unwrap().to_string();

    // Second admission exceeds the cap of one.
    let err = handle_admit(
        State(state.clone()),
        Path("pixel-quest".to_string()),
        caller(),
        Json(AdmitBody { pin: "1234".to_string(), anon_id: None }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(err.code, "capacity_exceeded");

    // Revoking session A frees the slot.
    handle_revoke_session(
        State(state.clone()),
        Path(("pixel-quest".to_string(), session_a)),
        bearer("owner-token"),
    )
    .await
    .unwrap();

    let response = handle_admit(
        State(state),
        Path("pixel-quest".to_string()),
        caller(),
        Json(AdmitBody { pin: "1234".to_string(), anon_id: None }),
    )
    .await
    .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(true));
}

#[tokio::test]
async fn wrong_pin_maps_to_forbidden() {
    let state = fixture();

    let err = handle_admit(
        State(state),
        Path("pixel-quest".to_string()),
        caller(),
        Json(AdmitBody { pin: "0000".to_string(), anon_id: None }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::FORBIDDEN);
    assert_eq!(err.code, "wrong_pin");
}

#[tokio::test]
async fn rotation_invalidates_sessions_and_returns_the_new_pin() {
    let state = fixture();

    let response = handle_admit(
        State(state.clone()),
        Path("pixel-quest".to_string()),
        caller(),
        Json(AdmitBody { pin: "1234".to_string(), anon_id: None }),
    )
    .await
    .unwrap();
    let session = body_json(response).await["session_id"].as_str().unwrap().to_string();

    let response = handle_rotate_pin(
        State(state.clone()),
        Path("pixel-quest".to_string()),
        bearer("owner-token"),
    )
    .await
    .unwrap();
    let body = body_json(response).await;
    let new_pin = body["pin"].as_str().unwrap().to_string();
    assert_ne!(new_pin, "1234");

    // The pre-rotation session no longer heartbeats.
    let err = handle_heartbeat(
        State(state.clone()),
        Path("pixel-quest".to_string()),
        Json(HeartbeatBody { session_id: session.into() }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
    assert_eq!(err.code, "session_not_found");

    // The session list is empty afterwards.
    let response = handle_list_sessions(
        State(state),
        Path("pixel-quest".to_string()),
        bearer("owner-token"),
    )
    .await
    .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["sessions"], json!([]));
}

#[tokio::test]
async fn session_listing_is_owner_only() {
    let state = fixture();

    let err = handle_list_sessions(
        State(state.clone()),
        Path("pixel-quest".to_string()),
        bearer("viewer-token"),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::FORBIDDEN);

    let err = handle_list_sessions(
        State(state),
        Path("pixel-quest".to_string()),
        HeaderMap::new(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// SECTION: Read Supersession
// ============================================================================

#[tokio::test]
async fn overlapping_reads_mark_the_stale_response_superseded() {
    let state = fixture();
    let viewer = UserId::new("viewer-1");

    // Simulate an in-flight read that a navigation races past.
    let stale_ticket = state.reads.begin("pixel-quest", Some(&viewer));

    let response = handle_fetch_listing(
        State(state.clone()),
        Path("pixel-quest".to_string()),
        bearer("viewer-token"),
    )
    .await
    .unwrap();
    assert_eq!(
        response.headers().get(SUPERSEDED_HEADER),
        Some(&HeaderValue::from_static("false"))
    );

    // The older ticket now resolves as superseded.
    assert_eq!(
        state.reads.finish("pixel-quest", Some(&viewer), stale_ticket),
        listing_gate_core::ReadOutcome::Superseded
    );
}
