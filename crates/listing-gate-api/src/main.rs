// crates/listing-gate-api/src/main.rs
// ============================================================================
// Module: API Entry Point
// Description: Configuration loading, tracing setup, and server startup.
// Purpose: Run the Listing Gate HTTP service.
// Dependencies: listing-gate-api, listing-gate-config, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! The binary loads the TOML configuration named by `LISTING_GATE_CONFIG`
//! (falling back to `listing-gate.toml`, and to built-in defaults when no
//! file exists), initializes tracing, assembles the server state, and serves
//! the router until interrupted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use listing_gate_api::StaticTokenResolver;
use listing_gate_api::TracingAuditSink;
use listing_gate_api::bootstrap::DenyAllEntitlements;
use listing_gate_api::bootstrap::build_state;
use listing_gate_api::build_router;
use listing_gate_config::ListingGateConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Top-level startup failure wrapper.
#[derive(Debug, thiserror::Error)]
enum MainError {
    /// Configuration failed to load or validate.
    #[error(transparent)]
    Config(#[from] listing_gate_config::ConfigError),
    /// State assembly failed.
    #[error(transparent)]
    Bootstrap(#[from] listing_gate_api::bootstrap::BootstrapError),
    /// Server bind or accept loop failed.
    #[error("server error: {0}")]
    Server(String),
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Loads configuration, assembles state, and serves until interrupted.
#[tokio::main]
async fn main() -> Result<(), MainError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::var("LISTING_GATE_CONFIG")
        .unwrap_or_else(|_| "listing-gate.toml".to_string());
    let config = if Path::new(&config_path).exists() {
        ListingGateConfig::load(Path::new(&config_path))?
    } else {
        info!(path = config_path.as_str(), "config file absent; using defaults");
        ListingGateConfig::default()
    };

    let state = build_state(
        &config,
        Arc::new(StaticTokenResolver::new()),
        Arc::new(DenyAllEntitlements),
        Arc::new(TracingAuditSink),
    )?;
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .map_err(|err| MainError::Server(err.to_string()))?;
    info!(addr = config.server.bind_addr.as_str(), "listing gate api listening");

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| MainError::Server(err.to_string()))
}

/// Resolves when the process receives an interrupt.
async fn shutdown_signal() {
    let _unused = tokio::signal::ctrl_c().await;
}
