// crates/listing-gate-api/src/auth.rs
// ============================================================================
// Module: API Identity Resolution
// Description: Opaque bearer credential resolution and caller hashing.
// Purpose: Turn untrusted request credentials into resolved identities.
// Dependencies: listing-gate-core, axum, sha2
// ============================================================================

//! ## Overview
//! Identity is an external collaborator: the API extracts the opaque bearer
//! credential from the `Authorization` header and hands it to an
//! [`IdentityResolver`]. The core only ever sees the resolved identity and
//! never inspects the credential itself. Caller addresses are hashed before
//! they reach the admission subsystem; raw addresses are never stored.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use listing_gate_core::EditorContext;
use listing_gate_core::UserId;
use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Identity resolved from an opaque bearer credential.
///
/// # Invariants
/// - `user_id` is trusted as-is; credential verification happened in the
///   resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Authenticated user identifier.
    pub user_id: UserId,
    /// True when the credential carries an admin capability.
    pub admin: bool,
}

impl Identity {
    /// Converts the identity into a core editor context.
    #[must_use]
    pub fn to_editor(&self) -> EditorContext {
        EditorContext { user_id: self.user_id.clone(), admin: self.admin }
    }
}

/// External auth collaborator: resolves opaque bearer credentials.
pub trait IdentityResolver: Send + Sync {
    /// Resolves a credential into an identity, or `None` when invalid.
    fn resolve(&self, credential: &str) -> Option<Identity>;
}

/// Shared handle to the identity resolver.
pub type SharedIdentityResolver = Arc<dyn IdentityResolver>;

/// Static token table resolver for tests and single-tenant deployments.
///
/// # Invariants
/// - Tokens are compared exactly; production deployments supply their own
///   resolver backed by the real auth service.
#[derive(Debug, Default)]
pub struct StaticTokenResolver {
    /// Token to identity table.
    tokens: HashMap<String, Identity>,
}

impl StaticTokenResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token for a user identity.
    #[must_use]
    pub fn with_user(mut self, token: impl Into<String>, user_id: impl Into<UserId>) -> Self {
        self.tokens
            .insert(token.into(), Identity { user_id: user_id.into(), admin: false });
        self
    }

    /// Registers a token for an admin identity.
    #[must_use]
    pub fn with_admin(mut self, token: impl Into<String>, user_id: impl Into<UserId>) -> Self {
        self.tokens.insert(token.into(), Identity { user_id: user_id.into(), admin: true });
        self
    }
}

impl IdentityResolver for StaticTokenResolver {
    fn resolve(&self, credential: &str) -> Option<Identity> {
        self.tokens.get(credential).cloned()
    }
}

// ============================================================================
// SECTION: Header Extraction
// ============================================================================

/// Extracts the bearer credential from the `Authorization` header.
#[must_use]
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Resolves the caller identity from request headers, if any.
#[must_use]
pub fn resolve_identity(
    resolver: &dyn IdentityResolver,
    headers: &HeaderMap,
) -> Option<Identity> {
    extract_bearer(headers).and_then(|token| resolver.resolve(token))
}

// ============================================================================
// SECTION: Caller Hashing
// ============================================================================

/// Hashes a caller address for session bookkeeping; raw addresses never
/// reach the admission subsystem.
#[must_use]
pub fn hash_caller_addr(addr: &SocketAddr) -> String {
    let mut hasher = Sha256::new();
    hasher.update(addr.ip().to_string().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
