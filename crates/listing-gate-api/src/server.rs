// crates/listing-gate-api/src/server.rs
// ============================================================================
// Module: API Server
// Description: Axum router and handlers for the listing and admission routes.
// Purpose: Expose the reconciliation and admission contracts over HTTP.
// Dependencies: listing-gate-core, axum, serde, serde_json, time
// ============================================================================

//! ## Overview
//! The server wires the reconciliation engine and the admission controller
//! to the marketplace route shapes. Responses use `{ok: true, …}` envelopes;
//! failures map through [`crate::error::ApiError`]. Wall-clock time enters
//! the system here and only here — every core call receives an explicit
//! timestamp.
//!
//! Security posture: request bodies, handles, and credentials are untrusted;
//! identity resolution and all validation happen before any mutation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::ConnectInfo;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::patch;
use axum::routing::post;
use listing_gate_core::AnonId;
use listing_gate_core::DesiredAsset;
use listing_gate_core::EditorContext;
use listing_gate_core::LifecycleStatus;
use listing_gate_core::ListingRecord;
use listing_gate_core::ListingState;
use listing_gate_core::PartialEdit;
use listing_gate_core::PinAdmissionController;
use listing_gate_core::PreviewSelection;
use listing_gate_core::ReadCoordinator;
use listing_gate_core::ReadOutcome;
use listing_gate_core::ReconciliationEngine;
use listing_gate_core::ScreenshotUpload;
use listing_gate_core::SessionId;
use listing_gate_core::SharedEntitlementChecker;
use listing_gate_core::Timestamp;
use serde::Deserialize;
use serde_json::json;

use crate::audit::AuditEvent;
use crate::audit::SharedAuditSink;
use crate::auth::Identity;
use crate::auth::SharedIdentityResolver;
use crate::auth::hash_caller_addr;
use crate::auth::resolve_identity;
use crate::error::ApiError;

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared server state handed to every handler.
///
/// # Invariants
/// - All fields are cheap to clone through the outer [`Arc`].
pub struct AppState {
    /// Reconciliation engine.
    pub engine: ReconciliationEngine,
    /// PIN admission controller.
    pub admission: PinAdmissionController,
    /// Read supersession coordinator.
    pub reads: ReadCoordinator,
    /// Identity collaborator.
    pub identity: SharedIdentityResolver,
    /// Entitlement collaborator.
    pub entitlements: SharedEntitlementChecker,
    /// Audit sink.
    pub audit: SharedAuditSink,
}

/// Shared handle to the server state.
pub type SharedState = Arc<AppState>;

/// Returns the current wall-clock time; the only place it is read.
#[must_use]
pub fn now() -> Timestamp {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    Timestamp::from_unix_millis(i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX))
}

/// Builds the service router over the shared state.
#[must_use]
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/listing/{slug}",
            get(handle_fetch_listing).patch(handle_patch_listing).delete(handle_delete_listing),
        )
        .route("/listing/{slug}/custom-assets", patch(handle_sync_assets))
        .route(
            "/listing/{slug}/screenshot/{slot}",
            post(handle_set_screenshot).delete(handle_remove_screenshot),
        )
        .route("/listing/{slug}/preview", post(handle_set_preview))
        .route("/listing/{slug}/lifecycle", patch(handle_set_lifecycle))
        .route("/listing/{slug}/play", post(handle_record_play))
        .route("/app/{slug}/state", patch(handle_set_state))
        .route("/access/{slug}", get(handle_check_access))
        .route("/app/{slug}/pin/admit", post(handle_admit))
        .route("/app/{slug}/pin/heartbeat", post(handle_heartbeat))
        .route("/app/{slug}/pin/rotate", post(handle_rotate_pin))
        .route("/app/{slug}/pin/sessions", get(handle_list_sessions))
        .route("/app/{slug}/pin/sessions/{session_id}/revoke", post(handle_revoke_session))
        .with_state(state)
}

// ============================================================================
// SECTION: Handler Helpers
// ============================================================================

/// Resolves the caller identity or fails with 401.
fn require_identity(state: &AppState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    resolve_identity(state.identity.as_ref(), headers).ok_or_else(ApiError::unauthenticated)
}

/// Resolves the caller identity as an editor context or fails with 401.
fn require_editor(state: &AppState, headers: &HeaderMap) -> Result<EditorContext, ApiError> {
    require_identity(state, headers).map(|identity| identity.to_editor())
}

/// Records an audit event for a failed owner-gated operation.
fn audit_failure(state: &AppState, route: &'static str, handle: &str, err: &ApiError) {
    match err.code {
        "forbidden" => state.audit.record(&AuditEvent::AuthorizationRejected {
            route,
            handle: handle.to_string(),
        }),
        "validation_failed" | "limit_exceeded" | "duplicate_name" | "invalid_body" => {
            state.audit.record(&AuditEvent::ValidationRejected {
                route,
                handle: handle.to_string(),
                code: err.code,
            });
        }
        _ => {}
    }
}

// ============================================================================
// SECTION: Health
// ============================================================================

/// Liveness probe.
async fn handle_health() -> Response {
    Json(json!({"ok": true})).into_response()
}

// ============================================================================
// SECTION: Listing Read Path
// ============================================================================

/// Response header signaling that a newer read superseded this one.
pub const SUPERSEDED_HEADER: &str = "x-read-superseded";

/// `GET /listing/{slug}` — viewer-aware fetch with supersession marking.
async fn handle_fetch_listing(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let identity = resolve_identity(state.identity.as_ref(), &headers);
    let viewer = identity.as_ref().map(Identity::to_editor);
    let viewer_id = viewer.as_ref().map(|v| v.user_id.clone());

    let ticket = state.reads.begin(&slug, viewer_id.as_ref());
    let record = state.engine.fetch(&slug, viewer.as_ref())?;
    let outcome = state.reads.finish(&slug, viewer_id.as_ref(), ticket);

    let superseded = outcome == ReadOutcome::Superseded;
    let mut response = Json(json!({"ok": true, "item": record})).into_response();
    if let Ok(value) = axum::http::HeaderValue::from_str(if superseded { "true" } else { "false" })
    {
        response.headers_mut().insert(SUPERSEDED_HEADER, value);
    }
    Ok(response)
}

// ============================================================================
// SECTION: Listing Edit Path
// ============================================================================

/// `PATCH /listing/{slug}` — partial edit over the listing record.
async fn handle_patch_listing(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Json(edit): Json<PartialEdit>,
) -> Result<Response, ApiError> {
    let editor = require_editor(&state, &headers)?;
    let result = state
        .engine
        .apply_edit(&slug, &editor, &edit, now())
        .map_err(ApiError::from);
    match result {
        Ok(item) => Ok(Json(json!({"ok": true, "item": item})).into_response()),
        Err(err) => {
            audit_failure(&state, "/listing/{slug}", &slug, &err);
            Err(err)
        }
    }
}

/// Query parameters of the delete route.
#[derive(Debug, Default, Deserialize)]
struct DeleteParams {
    /// True purges the record and releases stored content.
    #[serde(default)]
    hard: bool,
}

/// `DELETE /listing/{slug}?hard=` — soft or hard delete.
async fn handle_delete_listing(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    Query(params): Query<DeleteParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let editor = require_editor(&state, &headers)?;
    let result =
        state.engine.delete(&slug, &editor, params.hard, now()).map_err(ApiError::from);
    match result {
        Ok(()) => Ok(Json(json!({"ok": true, "hard": params.hard})).into_response()),
        Err(err) => {
            audit_failure(&state, "/listing/{slug}", &slug, &err);
            Err(err)
        }
    }
}

/// Body of the custom-assets sync route.
#[derive(Debug, Deserialize)]
struct SyncAssetsBody {
    /// Desired final asset list.
    assets: Vec<DesiredAsset>,
}

/// `PATCH /listing/{slug}/custom-assets` — atomic diff-and-sync.
async fn handle_sync_assets(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SyncAssetsBody>,
) -> Result<Response, ApiError> {
    let editor = require_editor(&state, &headers)?;
    let result = state
        .engine
        .sync_assets(&slug, &editor, &body.assets, now())
        .map_err(ApiError::from);
    match result {
        Ok(assets) => Ok(Json(json!({"ok": true, "assets": assets})).into_response()),
        Err(err) => {
            audit_failure(&state, "/listing/{slug}/custom-assets", &slug, &err);
            Err(err)
        }
    }
}

/// `POST /listing/{slug}/screenshot/{slot}` — replace one slot.
async fn handle_set_screenshot(
    State(state): State<SharedState>,
    Path((slug, slot)): Path<(String, usize)>,
    headers: HeaderMap,
    Json(upload): Json<ScreenshotUpload>,
) -> Result<Response, ApiError> {
    let editor = require_editor(&state, &headers)?;
    let result = state
        .engine
        .set_screenshot_slot(&slug, &editor, slot, Some(upload), now())
        .map_err(ApiError::from);
    match result {
        Ok(screenshots) => Ok(Json(
            json!({"ok": true, "slot": slot, "screenshots": screenshots}),
        )
        .into_response()),
        Err(err) => {
            audit_failure(&state, "/listing/{slug}/screenshot/{slot}", &slug, &err);
            Err(err)
        }
    }
}

/// `DELETE /listing/{slug}/screenshot/{slot}` — clear one slot.
async fn handle_remove_screenshot(
    State(state): State<SharedState>,
    Path((slug, slot)): Path<(String, usize)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let editor = require_editor(&state, &headers)?;
    let result = state
        .engine
        .set_screenshot_slot(&slug, &editor, slot, None, now())
        .map_err(ApiError::from);
    match result {
        Ok(screenshots) => Ok(Json(
            json!({"ok": true, "slot": slot, "screenshots": screenshots}),
        )
        .into_response()),
        Err(err) => {
            audit_failure(&state, "/listing/{slug}/screenshot/{slot}", &slug, &err);
            Err(err)
        }
    }
}

/// `POST /listing/{slug}/preview` — preset or custom preview selection.
async fn handle_set_preview(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Json(selection): Json<PreviewSelection>,
) -> Result<Response, ApiError> {
    let editor = require_editor(&state, &headers)?;
    let result =
        state.engine.set_preview(&slug, &editor, selection, now()).map_err(ApiError::from);
    match result {
        Ok(preview) => Ok(Json(json!({"ok": true, "preview": preview})).into_response()),
        Err(err) => {
            audit_failure(&state, "/listing/{slug}/preview", &slug, &err);
            Err(err)
        }
    }
}

/// Body of the state toggle route.
#[derive(Debug, Deserialize)]
struct SetStateBody {
    /// Desired activation state.
    state: ListingState,
}

/// `PATCH /app/{slug}/state` — active/inactive toggle.
async fn handle_set_state(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SetStateBody>,
) -> Result<Response, ApiError> {
    let editor = require_editor(&state, &headers)?;
    let item: ListingRecord = state
        .engine
        .set_state(&slug, &editor, body.state, now())
        .map_err(|err| {
            let err = ApiError::from(err);
            audit_failure(&state, "/app/{slug}/state", &slug, &err);
            err
        })?;
    Ok(Json(json!({"ok": true, "item": item})).into_response())
}

/// Body of the lifecycle transition route.
#[derive(Debug, Deserialize)]
struct SetLifecycleBody {
    /// Desired lifecycle status.
    status: LifecycleStatus,
}

/// `PATCH /listing/{slug}/lifecycle` — moderation status transition
/// (admin capability only; review logic lives in the moderation service).
async fn handle_set_lifecycle(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SetLifecycleBody>,
) -> Result<Response, ApiError> {
    let editor = require_editor(&state, &headers)?;
    let item = state
        .engine
        .set_lifecycle_status(&slug, &editor, body.status, now())
        .map_err(|err| {
            let err = ApiError::from(err);
            audit_failure(&state, "/listing/{slug}/lifecycle", &slug, &err);
            err
        })?;
    Ok(Json(json!({"ok": true, "item": item})).into_response())
}

/// `POST /listing/{slug}/play` — play counter increment.
async fn handle_record_play(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    state.engine.record_play(&slug, now())?;
    Ok(Json(json!({"ok": true})).into_response())
}

// ============================================================================
// SECTION: Entitlement Path
// ============================================================================

/// `GET /access/{slug}` — boolean entitlement gate for priced listings.
async fn handle_check_access(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let Some(identity) = resolve_identity(state.identity.as_ref(), &headers) else {
        return Ok(Json(json!({"allowed": false})).into_response());
    };
    let viewer = identity.to_editor();
    let record = state.engine.fetch(&slug, Some(&viewer))?;
    let allowed = match record.price {
        // Fail closed when the collaborator is unavailable.
        Some(price) if price > 0.0 => state
            .entitlements
            .may_play(&record.id, &viewer.user_id)
            .unwrap_or(false),
        _ => true,
    };
    Ok(Json(json!({"allowed": allowed})).into_response())
}

// ============================================================================
// SECTION: PIN Admission Path
// ============================================================================

/// Body of the admit route.
#[derive(Debug, Deserialize)]
struct AdmitBody {
    /// Candidate pin.
    pin: String,
    /// Optional pseudonymous viewer identifier.
    #[serde(default)]
    anon_id: Option<AnonId>,
}

/// `POST /app/{slug}/pin/admit` — validate the pin and mint a session.
async fn handle_admit(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<AdmitBody>,
) -> Result<Response, ApiError> {
    let ip_hash = hash_caller_addr(&addr);
    match state.admission.admit(&slug, &body.pin, body.anon_id, &ip_hash, now()) {
        Ok(session) => {
            state.audit.record(&AuditEvent::SessionAdmitted { handle: slug });
            Ok(Json(json!({"ok": true, "session_id": session.session_id})).into_response())
        }
        Err(err) => {
            let err = ApiError::from(err);
            if matches!(err.code, "wrong_pin" | "capacity_exceeded" | "too_many_attempts") {
                state
                    .audit
                    .record(&AuditEvent::AdmissionDenied { handle: slug, code: err.code });
            }
            Err(err)
        }
    }
}

/// Body of the heartbeat route.
#[derive(Debug, Deserialize)]
struct HeartbeatBody {
    /// Session to refresh.
    session_id: SessionId,
}

/// `POST /app/{slug}/pin/heartbeat` — refresh a session's liveness.
async fn handle_heartbeat(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    Json(body): Json<HeartbeatBody>,
) -> Result<Response, ApiError> {
    state.admission.heartbeat(&slug, &body.session_id, now())?;
    Ok(Json(json!({"ok": true})).into_response())
}

/// `POST /app/{slug}/pin/rotate` — rotate the pin, invalidate all sessions.
async fn handle_rotate_pin(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let editor = require_editor(&state, &headers)?;
    let pin = state.admission.rotate(&slug, &editor, now()).map_err(|err| {
        let err = ApiError::from(err);
        audit_failure(&state, "/app/{slug}/pin/rotate", &slug, &err);
        err
    })?;
    state.audit.record(&AuditEvent::PinRotated { handle: slug });
    Ok(Json(json!({"ok": true, "pin": pin})).into_response())
}

/// `GET /app/{slug}/pin/sessions` — owner polling dashboard feed.
async fn handle_list_sessions(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let editor = require_editor(&state, &headers)?;
    let sessions = state.admission.list_sessions(&slug, &editor, now()).map_err(|err| {
        let err = ApiError::from(err);
        audit_failure(&state, "/app/{slug}/pin/sessions", &slug, &err);
        err
    })?;
    Ok(Json(json!({"sessions": sessions})).into_response())
}

/// `POST /app/{slug}/pin/sessions/{session_id}/revoke` — revoke one session.
async fn handle_revoke_session(
    State(state): State<SharedState>,
    Path((slug, session_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let editor = require_editor(&state, &headers)?;
    state
        .admission
        .revoke(&slug, &editor, &SessionId::new(session_id))
        .map_err(|err| {
            let err = ApiError::from(err);
            audit_failure(&state, "/app/{slug}/pin/sessions/{session_id}/revoke", &slug, &err);
            err
        })?;
    state.audit.record(&AuditEvent::SessionRevoked { handle: slug });
    Ok(Json(json!({"ok": true})).into_response())
}

#[cfg(test)]
mod tests;
