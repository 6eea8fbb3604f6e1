// crates/listing-gate-config/src/lib.rs
// ============================================================================
// Module: Listing Gate Configuration
// Description: TOML configuration loading and fail-closed validation.
// Purpose: Centralize limits, admission policy, store, and server settings.
// Dependencies: listing-gate-core, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from one TOML document with four sections:
//! `[limits]` (reconciliation bounds), `[admission]` (session TTL and
//! wrong-pin rate limiting), `[store]` (backend selection), and `[server]`
//! (bind address). Every section has complete defaults so an empty document
//! is valid; explicit values are validated fail-closed before the service
//! starts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use listing_gate_core::AdmissionPolicy;
use listing_gate_core::ListingLimits;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Configuration document failed to parse.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A configured value is out of range or inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Limits Section
// ============================================================================

/// `[limits]` section; all fields default to the marketplace bounds.
///
/// # Invariants
/// - All counts and lengths are greater than zero after validation.
/// - `price_min <= price_max`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum title length in characters.
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,
    /// Maximum short description length in characters.
    #[serde(default = "default_description_max_chars")]
    pub description_max_chars: usize,
    /// Maximum long description length in characters.
    #[serde(default = "default_long_description_max_chars")]
    pub long_description_max_chars: usize,
    /// Maximum number of tags per listing.
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
    /// Maximum length of a single tag in characters.
    #[serde(default = "default_tag_max_chars")]
    pub tag_max_chars: usize,
    /// Minimum accepted price.
    #[serde(default = "default_price_min")]
    pub price_min: f64,
    /// Maximum accepted price.
    #[serde(default = "default_price_max")]
    pub price_max: f64,
    /// Maximum screenshot URL length in characters.
    #[serde(default = "default_screenshot_url_max_chars")]
    pub screenshot_url_max_chars: usize,
    /// Maximum screenshot upload size in bytes.
    #[serde(default = "default_screenshot_max_bytes")]
    pub screenshot_max_bytes: u64,
    /// Maximum number of custom assets per listing.
    #[serde(default = "default_max_custom_assets")]
    pub max_custom_assets: usize,
    /// Maximum size of a single custom asset in bytes.
    #[serde(default = "default_custom_asset_max_bytes")]
    pub custom_asset_max_bytes: u64,
    /// Allowed custom asset mime types.
    #[serde(default = "default_allowed_asset_mime_types")]
    pub allowed_asset_mime_types: Vec<String>,
    /// Maximum preview upload size in bytes.
    #[serde(default = "default_preview_max_bytes")]
    pub preview_max_bytes: u64,
    /// Allowed preview preset path prefixes.
    #[serde(default = "default_preview_preset_prefixes")]
    pub preview_preset_prefixes: Vec<String>,
    /// Maximum preset overlay text length in characters.
    #[serde(default = "default_overlay_max_chars")]
    pub overlay_max_chars: usize,
    /// Upper clamp for the concurrent PIN session cap.
    #[serde(default = "default_max_concurrent_pins_ceiling")]
    pub max_concurrent_pins_ceiling: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            title_max_chars: default_title_max_chars(),
            description_max_chars: default_description_max_chars(),
            long_description_max_chars: default_long_description_max_chars(),
            max_tags: default_max_tags(),
            tag_max_chars: default_tag_max_chars(),
            price_min: default_price_min(),
            price_max: default_price_max(),
            screenshot_url_max_chars: default_screenshot_url_max_chars(),
            screenshot_max_bytes: default_screenshot_max_bytes(),
            max_custom_assets: default_max_custom_assets(),
            custom_asset_max_bytes: default_custom_asset_max_bytes(),
            allowed_asset_mime_types: default_allowed_asset_mime_types(),
            preview_max_bytes: default_preview_max_bytes(),
            preview_preset_prefixes: default_preview_preset_prefixes(),
            overlay_max_chars: default_overlay_max_chars(),
            max_concurrent_pins_ceiling: default_max_concurrent_pins_ceiling(),
        }
    }
}

impl LimitsConfig {
    /// Converts the section into the core limits value.
    #[must_use]
    pub fn to_limits(&self) -> ListingLimits {
        ListingLimits {
            title_max_chars: self.title_max_chars,
            description_max_chars: self.description_max_chars,
            long_description_max_chars: self.long_description_max_chars,
            max_tags: self.max_tags,
            tag_max_chars: self.tag_max_chars,
            price_min: self.price_min,
            price_max: self.price_max,
            screenshot_url_max_chars: self.screenshot_url_max_chars,
            screenshot_max_bytes: self.screenshot_max_bytes,
            max_custom_assets: self.max_custom_assets,
            custom_asset_max_bytes: self.custom_asset_max_bytes,
            allowed_asset_mime_types: self
                .allowed_asset_mime_types
                .iter()
                .map(|mime| mime.to_lowercase())
                .collect(),
            preview_max_bytes: self.preview_max_bytes,
            preview_preset_prefixes: self.preview_preset_prefixes.clone(),
            overlay_max_chars: self.overlay_max_chars,
            max_concurrent_pins_ceiling: self.max_concurrent_pins_ceiling,
        }
    }
}

/// Returns the default maximum title length.
const fn default_title_max_chars() -> usize {
    120
}

/// Returns the default maximum short description length.
const fn default_description_max_chars() -> usize {
    500
}

/// Returns the default maximum long description length.
const fn default_long_description_max_chars() -> usize {
    4_000
}

/// Returns the default maximum tag count.
const fn default_max_tags() -> usize {
    20
}

/// Returns the default maximum tag length.
const fn default_tag_max_chars() -> usize {
    40
}

/// Returns the default minimum price.
const fn default_price_min() -> f64 {
    0.5
}

/// Returns the default maximum price.
const fn default_price_max() -> f64 {
    1_000.0
}

/// Returns the default maximum screenshot URL length.
const fn default_screenshot_url_max_chars() -> usize {
    1_024
}

/// Returns the default screenshot size cap.
const fn default_screenshot_max_bytes() -> u64 {
    1_024 * 1_024
}

/// Returns the default custom asset count cap.
const fn default_max_custom_assets() -> usize {
    30
}

/// Returns the default per-asset byte cap.
const fn default_custom_asset_max_bytes() -> u64 {
    100 * 1_024
}

/// Returns the default custom asset mime allow-list.
fn default_allowed_asset_mime_types() -> Vec<String> {
    vec![
        "image/png".to_string(),
        "image/jpeg".to_string(),
        "image/jpg".to_string(),
        "image/gif".to_string(),
    ]
}

/// Returns the default preview size cap.
const fn default_preview_max_bytes() -> u64 {
    1_024 * 1_024
}

/// Returns the default preview preset prefixes.
fn default_preview_preset_prefixes() -> Vec<String> {
    vec!["/preview-presets/".to_string(), "/assets/".to_string()]
}

/// Returns the default overlay length cap.
const fn default_overlay_max_chars() -> usize {
    22
}

/// Returns the default concurrent session cap ceiling.
const fn default_max_concurrent_pins_ceiling() -> u32 {
    1_000
}

// ============================================================================
// SECTION: Admission Section
// ============================================================================

/// `[admission]` section.
///
/// # Invariants
/// - `session_ttl_ms` and `rate_limit_window_ms` are greater than zero.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdmissionConfig {
    /// Idle timeout after which sessions are lazily evicted, in milliseconds.
    #[serde(default = "default_session_ttl_ms")]
    pub session_ttl_ms: u64,
    /// Sliding window for wrong-pin attempt tracking, in milliseconds.
    #[serde(default = "default_rate_limit_window_ms")]
    pub rate_limit_window_ms: u64,
    /// Maximum wrong-pin attempts per caller within the window (0 disables).
    #[serde(default = "default_rate_limit_max_attempts")]
    pub rate_limit_max_attempts: u32,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            session_ttl_ms: default_session_ttl_ms(),
            rate_limit_window_ms: default_rate_limit_window_ms(),
            rate_limit_max_attempts: default_rate_limit_max_attempts(),
        }
    }
}

impl AdmissionConfig {
    /// Converts the section into the core admission policy.
    #[must_use]
    pub const fn to_policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            session_ttl_ms: self.session_ttl_ms,
            rate_limit_window_ms: self.rate_limit_window_ms,
            rate_limit_max_attempts: self.rate_limit_max_attempts,
        }
    }
}

/// Returns the default session idle TTL.
const fn default_session_ttl_ms() -> u64 {
    300_000
}

/// Returns the default wrong-pin window.
const fn default_rate_limit_window_ms() -> u64 {
    300_000
}

/// Returns the default wrong-pin attempt cap.
const fn default_rate_limit_max_attempts() -> u32 {
    5
}

// ============================================================================
// SECTION: Store Section
// ============================================================================

/// Store backend selector.
///
/// # Invariants
/// - Variants are stable for configuration compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Durable SQLite store.
    #[default]
    Sqlite,
    /// In-memory store (tests and ephemeral deployments).
    Memory,
}

/// `[store]` section.
///
/// # Invariants
/// - `path` is required (non-empty) when the backend is SQLite.
/// - `busy_timeout_ms` is greater than zero.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: StoreBackend,
    /// SQLite database file path.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Returns the default database path.
fn default_store_path() -> PathBuf {
    PathBuf::from("listing-gate.db3")
}

/// Returns the default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    5_000
}

// ============================================================================
// SECTION: Server Section
// ============================================================================

/// `[server]` section.
///
/// # Invariants
/// - `bind_addr` parses as a socket address at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: default_bind_addr() }
    }
}

/// Returns the default bind address.
fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

// ============================================================================
// SECTION: Root Document
// ============================================================================

/// Complete Listing Gate configuration document.
///
/// # Invariants
/// - All sections are validated before use; an empty document is valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ListingGateConfig {
    /// Reconciliation bounds.
    pub limits: LimitsConfig,
    /// Admission policy.
    pub admission: AdmissionConfig,
    /// Store backend.
    pub store: StoreConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

impl ListingGateConfig {
    /// Parses a configuration document from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration document from a file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, plus the
    /// errors of [`ListingGateConfig::from_toml`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Validates every section fail-closed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_limits(&self.limits)?;
        validate_admission(&self.admission)?;
        validate_store(&self.store)?;
        validate_server(&self.server)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates the `[limits]` section.
fn validate_limits(limits: &LimitsConfig) -> Result<(), ConfigError> {
    if limits.title_max_chars == 0 {
        return Err(ConfigError::Invalid("title_max_chars must be greater than zero".into()));
    }
    if limits.description_max_chars == 0 {
        return Err(ConfigError::Invalid(
            "description_max_chars must be greater than zero".into(),
        ));
    }
    if limits.long_description_max_chars == 0 {
        return Err(ConfigError::Invalid(
            "long_description_max_chars must be greater than zero".into(),
        ));
    }
    if limits.max_tags == 0 || limits.tag_max_chars == 0 {
        return Err(ConfigError::Invalid("tag limits must be greater than zero".into()));
    }
    if !limits.price_min.is_finite()
        || !limits.price_max.is_finite()
        || limits.price_min > limits.price_max
    {
        return Err(ConfigError::Invalid(format!(
            "price bounds are inconsistent: [{}, {}]",
            limits.price_min, limits.price_max
        )));
    }
    if limits.screenshot_url_max_chars == 0 || limits.screenshot_max_bytes == 0 {
        return Err(ConfigError::Invalid(
            "screenshot limits must be greater than zero".into(),
        ));
    }
    if limits.max_custom_assets == 0 || limits.custom_asset_max_bytes == 0 {
        return Err(ConfigError::Invalid(
            "custom asset limits must be greater than zero".into(),
        ));
    }
    if limits.allowed_asset_mime_types.is_empty() {
        return Err(ConfigError::Invalid(
            "allowed_asset_mime_types must not be empty".into(),
        ));
    }
    if limits.preview_max_bytes == 0 || limits.overlay_max_chars == 0 {
        return Err(ConfigError::Invalid("preview limits must be greater than zero".into()));
    }
    for prefix in &limits.preview_preset_prefixes {
        if !prefix.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "preview preset prefix must start with '/': {prefix}"
            )));
        }
    }
    if limits.max_concurrent_pins_ceiling == 0 {
        return Err(ConfigError::Invalid(
            "max_concurrent_pins_ceiling must be greater than zero".into(),
        ));
    }
    Ok(())
}

/// Validates the `[admission]` section.
fn validate_admission(admission: &AdmissionConfig) -> Result<(), ConfigError> {
    if admission.session_ttl_ms == 0 {
        return Err(ConfigError::Invalid("session_ttl_ms must be greater than zero".into()));
    }
    if admission.rate_limit_window_ms == 0 {
        return Err(ConfigError::Invalid(
            "rate_limit_window_ms must be greater than zero".into(),
        ));
    }
    Ok(())
}

/// Validates the `[store]` section.
fn validate_store(store: &StoreConfig) -> Result<(), ConfigError> {
    if store.backend == StoreBackend::Sqlite && store.path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("store path must not be empty".into()));
    }
    if store.busy_timeout_ms == 0 {
        return Err(ConfigError::Invalid("busy_timeout_ms must be greater than zero".into()));
    }
    Ok(())
}

/// Validates the `[server]` section.
fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_addr.parse::<std::net::SocketAddr>().is_err() {
        return Err(ConfigError::Invalid(format!(
            "bind_addr is not a socket address: {}",
            server.bind_addr
        )));
    }
    Ok(())
}
