// crates/listing-gate-core/src/core/listing.rs
// ============================================================================
// Module: Listing Record Aggregate
// Description: Authoritative listing record, access configuration, and sessions.
// Purpose: Model the aggregate root mutated by reconciliation and admission.
// Dependencies: crate::core::{assets, identifiers, preview, screenshots, time},
// serde, subtle, thiserror
// ============================================================================

//! ## Overview
//! The listing record is the aggregate root of Listing Gate: identity,
//! editable fields, embedded screenshot slots, custom asset set, preview
//! selection, access configuration, and lifecycle status. Every accepted
//! edit produces a new monotonically ordered version; invariants are checked
//! before any version is persisted and fail closed.
//!
//! Security posture: records loaded from a store must be treated as
//! untrusted; `check_invariants` re-validates them before mutation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::core::assets::AssetSet;
use crate::core::identifiers::AnonId;
use crate::core::identifiers::ListingId;
use crate::core::identifiers::SessionId;
use crate::core::identifiers::Slug;
use crate::core::identifiers::UserId;
use crate::core::preview::PreviewRef;
use crate::core::screenshots::ScreenshotArray;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Server-configured bounds applied during reconciliation.
///
/// # Invariants
/// - All counts and lengths are greater than zero.
/// - `price_min <= price_max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingLimits {
    /// Maximum title length in characters.
    pub title_max_chars: usize,
    /// Maximum short description length in characters.
    pub description_max_chars: usize,
    /// Maximum long description length in characters.
    pub long_description_max_chars: usize,
    /// Maximum number of tags per listing.
    pub max_tags: usize,
    /// Maximum length of a single tag in characters.
    pub tag_max_chars: usize,
    /// Minimum accepted price.
    pub price_min: f64,
    /// Maximum accepted price.
    pub price_max: f64,
    /// Maximum screenshot URL length in characters.
    pub screenshot_url_max_chars: usize,
    /// Maximum screenshot upload size in bytes.
    pub screenshot_max_bytes: u64,
    /// Maximum number of custom assets per listing.
    pub max_custom_assets: usize,
    /// Maximum size of a single custom asset in bytes.
    pub custom_asset_max_bytes: u64,
    /// Allowed custom asset mime types (lowercase).
    pub allowed_asset_mime_types: Vec<String>,
    /// Maximum preview upload size in bytes.
    pub preview_max_bytes: u64,
    /// Allowed preview preset path prefixes.
    pub preview_preset_prefixes: Vec<String>,
    /// Maximum preset overlay text length in characters.
    pub overlay_max_chars: usize,
    /// Upper clamp for the concurrent PIN session cap.
    pub max_concurrent_pins_ceiling: u32,
}

impl Default for ListingLimits {
    fn default() -> Self {
        Self {
            title_max_chars: 120,
            description_max_chars: 500,
            long_description_max_chars: 4_000,
            max_tags: 20,
            tag_max_chars: 40,
            price_min: 0.5,
            price_max: 1_000.0,
            screenshot_url_max_chars: 1_024,
            screenshot_max_bytes: 1_024 * 1_024,
            max_custom_assets: 30,
            custom_asset_max_bytes: 100 * 1_024,
            allowed_asset_mime_types: vec![
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "image/jpg".to_string(),
                "image/gif".to_string(),
            ],
            preview_max_bytes: 1_024 * 1_024,
            preview_preset_prefixes: vec![
                "/preview-presets/".to_string(),
                "/assets/".to_string(),
            ],
            overlay_max_chars: 22,
            max_concurrent_pins_ceiling: 1_000,
        }
    }
}

// ============================================================================
// SECTION: Status Enums
// ============================================================================

/// Directory visibility of a listing.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Listed in public directories.
    Public,
    /// Reachable by URL only.
    Unlisted,
}

/// Moderation lifecycle status of a listing.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
/// - Transitions are driven by the external moderation collaborator; the
///   core only stores the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    /// Not yet submitted for review.
    Draft,
    /// Awaiting moderation.
    PendingReview,
    /// Approved but not yet published.
    Approved,
    /// Live in the marketplace.
    Published,
    /// Rejected by moderation.
    Rejected,
}

/// Owner-controlled activation state of a listing.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingState {
    /// Playable by viewers.
    Active,
    /// Hidden from play, still editable by the owner.
    Inactive,
}

// ============================================================================
// SECTION: Access Configuration
// ============================================================================

/// Gating policy for playing a listing.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Anyone may play.
    Public,
    /// Anonymous viewers must present the listing PIN.
    Pin,
    /// Named invitees only.
    Invite,
    /// Owner only.
    Private,
}

/// Listing PIN value.
///
/// # Invariants
/// - Stored verbatim; candidate comparison is constant-time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pin(String);

impl Pin {
    /// Creates a pin from an already validated value.
    #[must_use]
    pub fn new(pin: impl Into<String>) -> Self {
        Self(pin.into())
    }

    /// Returns the pin as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares a candidate against this pin in constant time.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

/// Access configuration embedded in a listing record.
///
/// # Invariants
/// - `pin` is `Some` if and only if `mode` is [`AccessMode::Pin`].
/// - `max_concurrent_pins` is within `[1, max_concurrent_pins_ceiling]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Gating policy.
    pub mode: AccessMode,
    /// Current pin; present only when `mode` is [`AccessMode::Pin`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<Pin>,
    /// Maximum number of concurrently live PIN sessions.
    pub max_concurrent_pins: u32,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self { mode: AccessMode::Public, pin: None, max_concurrent_pins: 1 }
    }
}

// ============================================================================
// SECTION: Listing Record
// ============================================================================

/// Authoritative listing record.
///
/// # Invariants
/// - `version` increases by exactly one on every accepted edit.
/// - `access.pin` is `Some` iff `access.mode` is [`AccessMode::Pin`].
/// - `price` is absent or within the configured bounds.
/// - `custom_assets` honors the set cap and case-insensitive name uniqueness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// Immutable internal key.
    pub id: ListingId,
    /// Stable external handle.
    pub slug: Slug,
    /// Exclusive owner; only the owner or an admin capability may mutate.
    pub owner_id: UserId,
    /// Monotonic version, bumped on every accepted edit.
    pub version: u64,
    /// Listing title.
    pub title: String,
    /// Short description.
    pub description: String,
    /// Long-form description.
    pub long_description: String,
    /// Tag set; insertion order irrelevant, duplicates rejected.
    pub tags: Vec<String>,
    /// Directory visibility.
    pub visibility: Visibility,
    /// Moderation lifecycle status.
    pub lifecycle_status: LifecycleStatus,
    /// Owner-controlled activation state.
    pub state: ListingState,
    /// Access gating configuration.
    pub access: AccessConfig,
    /// Optional price within server-configured bounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Fixed screenshot slots.
    pub screenshots: ScreenshotArray,
    /// Resolved preview reference, when one has been applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<PreviewRef>,
    /// Bounded named collection of custom graphics.
    pub custom_assets: AssetSet,
    /// Total recorded plays.
    pub plays_count: u64,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last accepted edit time.
    pub updated_at: Timestamp,
    /// Soft-delete marker; hidden from non-owners when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<Timestamp>,
}

impl ListingRecord {
    /// Creates a fresh draft record owned by `owner_id`.
    #[must_use]
    pub fn new(
        id: ListingId,
        slug: Slug,
        owner_id: UserId,
        title: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            slug,
            owner_id,
            version: 1,
            title: title.into(),
            description: String::new(),
            long_description: String::new(),
            tags: Vec::new(),
            visibility: Visibility::Public,
            lifecycle_status: LifecycleStatus::Draft,
            state: ListingState::Active,
            access: AccessConfig::default(),
            price: None,
            screenshots: ScreenshotArray::default(),
            preview: None,
            custom_assets: AssetSet::default(),
            plays_count: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Returns true when the record carries a soft-delete marker.
    #[must_use]
    pub const fn is_soft_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns true when the listing is visible to arbitrary viewers.
    #[must_use]
    pub fn is_publicly_visible(&self) -> bool {
        !self.is_soft_deleted()
            && (self.lifecycle_status == LifecycleStatus::Published
                || self.state == ListingState::Active)
    }

    /// Validates the aggregate invariants against the configured limits.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation`] naming the first violated invariant.
    pub fn check_invariants(&self, limits: &ListingLimits) -> Result<(), InvariantViolation> {
        match (self.access.mode, self.access.pin.as_ref()) {
            (AccessMode::Pin, None) => return Err(InvariantViolation::PinMissing),
            (AccessMode::Pin, Some(_)) => {}
            (_, Some(_)) => return Err(InvariantViolation::PinWithoutPinMode),
            (_, None) => {}
        }
        if self.access.max_concurrent_pins == 0
            || self.access.max_concurrent_pins > limits.max_concurrent_pins_ceiling
        {
            return Err(InvariantViolation::SessionCapOutOfRange {
                cap: self.access.max_concurrent_pins,
                ceiling: limits.max_concurrent_pins_ceiling,
            });
        }
        if let Some(price) = self.price
            && (!price.is_finite() || price < limits.price_min || price > limits.price_max)
        {
            return Err(InvariantViolation::PriceOutOfRange {
                min: limits.price_min,
                max: limits.price_max,
            });
        }
        if self.custom_assets.len() > limits.max_custom_assets {
            return Err(InvariantViolation::AssetCountExceeded {
                count: self.custom_assets.len(),
                max: limits.max_custom_assets,
            });
        }
        if !self.custom_assets.names_unique_case_insensitive() {
            return Err(InvariantViolation::AssetNamesNotUnique);
        }
        Ok(())
    }
}

/// Aggregate invariant violations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    /// Access mode is pin but no pin is stored.
    #[error("access mode is pin but no pin is set")]
    PinMissing,
    /// A pin is stored while the access mode is not pin.
    #[error("pin set while access mode is not pin")]
    PinWithoutPinMode,
    /// The concurrent session cap is outside the permitted range.
    #[error("max concurrent pins out of range: {cap} (ceiling {ceiling})")]
    SessionCapOutOfRange {
        /// Stored cap value.
        cap: u32,
        /// Configured ceiling.
        ceiling: u32,
    },
    /// The price is outside the configured bounds.
    #[error("price outside configured bounds [{min}, {max}]")]
    PriceOutOfRange {
        /// Configured minimum.
        min: f64,
        /// Configured maximum.
        max: f64,
    },
    /// The custom asset set exceeds the configured cap.
    #[error("custom asset count {count} exceeds cap {max}")]
    AssetCountExceeded {
        /// Stored asset count.
        count: usize,
        /// Configured cap.
        max: usize,
    },
    /// Custom asset names collide case-insensitively.
    #[error("custom asset names are not unique case-insensitively")]
    AssetNamesNotUnique,
}

// ============================================================================
// SECTION: PIN Sessions
// ============================================================================

/// Ephemeral grant of access to a pin-gated listing.
///
/// # Invariants
/// - `session_id` is unguessable; it is the only admission credential.
/// - `last_seen_at >= created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSession {
    /// Opaque session identifier.
    pub session_id: SessionId,
    /// Listing the session grants access to.
    pub listing_id: ListingId,
    /// Optional pseudonymous viewer identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anon_id: Option<AnonId>,
    /// Hash of the viewer address; raw addresses are never stored.
    pub ip_hash: String,
    /// Admission time.
    pub created_at: Timestamp,
    /// Last heartbeat time.
    pub last_seen_at: Timestamp,
}

impl PinSession {
    /// Returns true when the session has seen a heartbeat at or after `cutoff`.
    #[must_use]
    pub fn is_live(&self, cutoff: Timestamp) -> bool {
        self.last_seen_at >= cutoff
    }
}
