// crates/listing-gate-api/src/error.rs
// ============================================================================
// Module: API Error Envelope
// Description: Maps core errors to HTTP statuses and JSON envelopes.
// Purpose: Give clients stable error codes with field-specific detail.
// Dependencies: listing-gate-core, axum, serde_json
// ============================================================================

//! ## Overview
//! Every failure surfaces as `{"ok": false, "error": code, "message": …}`
//! with a status chosen by the error class. Codes are stable strings the
//! front end can branch on; messages carry the field-specific detail the
//! validation layer produced so the client can present a specific toast.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use listing_gate_core::AdmissionError;
use listing_gate_core::ReconcileError;
use serde_json::json;

// ============================================================================
// SECTION: API Error
// ============================================================================

/// One API failure with a stable code and presentable message.
///
/// # Invariants
/// - `code` values are stable for client branching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status.
    pub status: StatusCode,
    /// Stable error code.
    pub code: &'static str,
    /// Human-presentable detail.
    pub message: String,
}

impl ApiError {
    /// Creates an error from its parts.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }

    /// 401 for requests that require a resolved identity.
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", "sign in before retrying")
    }

    /// 400 for malformed request payloads.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_body", message)
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        let message = err.to_string();
        match &err {
            ReconcileError::Unauthorized => {
                Self::new(StatusCode::FORBIDDEN, "forbidden", message)
            }
            ReconcileError::NotFound => Self::new(StatusCode::NOT_FOUND, "not_found", message),
            ReconcileError::ValidationFailed { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "validation_failed", message)
            }
            ReconcileError::LimitExceeded { what, .. } => {
                // Byte-size caps surface as payload-too-large; count caps as
                // plain validation failures.
                if what.ends_with("_bytes") {
                    Self::new(StatusCode::PAYLOAD_TOO_LARGE, "limit_exceeded", message)
                } else {
                    Self::new(StatusCode::BAD_REQUEST, "limit_exceeded", message)
                }
            }
            ReconcileError::DuplicateName { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "duplicate_name", message)
            }
            ReconcileError::Store(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "store_error", message)
            }
        }
    }
}

impl From<AdmissionError> for ApiError {
    fn from(err: AdmissionError) -> Self {
        let message = err.to_string();
        match &err {
            AdmissionError::NotFound => Self::new(StatusCode::NOT_FOUND, "not_found", message),
            AdmissionError::Unauthorized => {
                Self::new(StatusCode::FORBIDDEN, "forbidden", message)
            }
            AdmissionError::NotGated => Self::new(StatusCode::CONFLICT, "not_gated", message),
            AdmissionError::WrongPin => Self::new(StatusCode::FORBIDDEN, "wrong_pin", message),
            AdmissionError::CapacityExceeded { .. } => {
                Self::new(StatusCode::TOO_MANY_REQUESTS, "capacity_exceeded", message)
            }
            AdmissionError::TooManyAttempts => {
                Self::new(StatusCode::TOO_MANY_REQUESTS, "too_many_attempts", message)
            }
            AdmissionError::SessionNotFound => {
                Self::new(StatusCode::NOT_FOUND, "session_not_found", message)
            }
            AdmissionError::Store(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "store_error", message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "ok": false,
            "error": self.code,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}
