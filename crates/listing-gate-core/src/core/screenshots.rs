// crates/listing-gate-core/src/core/screenshots.rs
// ============================================================================
// Module: Screenshot Slot Array
// Description: Fixed-size array of optional screenshot references.
// Purpose: Model per-slot upload/remove state with cache-busting counters.
// Dependencies: crate::core::identifiers, serde, thiserror, url
// ============================================================================

//! ## Overview
//! Listings carry a fixed number of screenshot slots. Each slot holds an
//! optional image reference plus a version counter bumped on every successful
//! replace or remove; the counter exists purely for cache invalidation of the
//! resolved URL and has no correctness role. Slots are replaced individually
//! (each maps to one user-facing upload control) or wholesale through a
//! partial edit; they are never diffed as a batch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::core::identifiers::ContentRef;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of screenshot slots per listing.
pub const SCREENSHOT_SLOT_COUNT: usize = 2;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Screenshot slot operation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScreenshotError {
    /// Slot index outside `[0, SCREENSHOT_SLOT_COUNT)`.
    #[error("screenshot slot index {index} out of range (slots: {slots})")]
    InvalidIndex {
        /// Requested index.
        index: usize,
        /// Number of available slots.
        slots: usize,
    },
    /// URL is neither absolute http(s) nor root-relative.
    #[error("screenshot url has an invalid shape: {url}")]
    InvalidShape {
        /// Offending URL after normalization.
        url: String,
    },
    /// URL exceeds the configured length bound.
    #[error("screenshot url too long: {len} chars (max {max})")]
    UrlTooLong {
        /// Actual length in characters.
        len: usize,
        /// Configured maximum.
        max: usize,
    },
    /// Upload exceeds the configured size cap.
    #[error("screenshot too large: {size} bytes (max {max})")]
    TooLarge {
        /// Upload size in bytes.
        size: u64,
        /// Configured maximum.
        max: u64,
    },
    /// Upload mime type is not an image type.
    #[error("unsupported screenshot type: {mime}")]
    InvalidType {
        /// Rejected mime type.
        mime: String,
    },
}

// ============================================================================
// SECTION: Slot Types
// ============================================================================

/// One screenshot slot.
///
/// # Invariants
/// - `version_counter` increments on every successful replace or remove; it
///   is cache-busting metadata only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotSlot {
    /// Resolved image URL, when the slot is filled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Cache-busting counter.
    pub version_counter: u64,
}

/// Descriptor of an already-uploaded screenshot handed to a slot.
///
/// # Invariants
/// - `content_ref` points at bytes already persisted by the storage
///   collaborator; the core never sees raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotUpload {
    /// Durable reference to the uploaded image.
    pub content_ref: ContentRef,
    /// Declared mime type (lowercase).
    pub mime_type: String,
    /// Upload size in bytes.
    pub size_bytes: u64,
}

impl ScreenshotUpload {
    /// Validates the upload descriptor against the configured size cap.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenshotError::InvalidType`] for non-image mime types and
    /// [`ScreenshotError::TooLarge`] when the size cap is exceeded.
    pub fn validate(&self, max_bytes: u64) -> Result<(), ScreenshotError> {
        if !self.mime_type.to_ascii_lowercase().starts_with("image/") {
            return Err(ScreenshotError::InvalidType { mime: self.mime_type.clone() });
        }
        if self.size_bytes > max_bytes {
            return Err(ScreenshotError::TooLarge { size: self.size_bytes, max: max_bytes });
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Screenshot Array
// ============================================================================

/// Fixed-length ordered sequence of screenshot slots.
///
/// # Invariants
/// - Always exactly [`SCREENSHOT_SLOT_COUNT`] slots; indices are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotArray {
    /// Slot storage, index-addressed.
    slots: [ScreenshotSlot; SCREENSHOT_SLOT_COUNT],
}

impl ScreenshotArray {
    /// Returns all slots in order.
    #[must_use]
    pub fn slots(&self) -> &[ScreenshotSlot] {
        &self.slots
    }

    /// Returns one slot by index.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenshotError::InvalidIndex`] when `index` is out of range.
    pub fn slot(&self, index: usize) -> Result<&ScreenshotSlot, ScreenshotError> {
        self.slots
            .get(index)
            .ok_or(ScreenshotError::InvalidIndex { index, slots: SCREENSHOT_SLOT_COUNT })
    }

    /// Replaces or clears one slot, bumping its version counter.
    ///
    /// Returns the URL previously held by the slot so the caller can release
    /// the referenced content.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenshotError::InvalidIndex`] when `index` is out of range.
    pub fn set_slot(
        &mut self,
        index: usize,
        url: Option<String>,
    ) -> Result<Option<String>, ScreenshotError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(ScreenshotError::InvalidIndex { index, slots: SCREENSHOT_SLOT_COUNT })?;
        let previous = slot.url.take();
        slot.url = url;
        slot.version_counter = slot.version_counter.saturating_add(1);
        Ok(previous)
    }

    /// Replaces every slot from an ordered URL list (whole-collection
    /// replace used by partial edits). Counters are bumped only for slots
    /// whose URL actually changed.
    ///
    /// Returns the URLs displaced by the replacement.
    #[must_use]
    pub fn replace_urls(&mut self, urls: &[Option<String>]) -> Vec<String> {
        let mut displaced = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let next = urls.get(index).cloned().flatten();
            if slot.url == next {
                continue;
            }
            if let Some(previous) = slot.url.take() {
                displaced.push(previous);
            }
            slot.url = next;
            slot.version_counter = slot.version_counter.saturating_add(1);
        }
        displaced
    }

    /// Returns the filled slot URLs in slot order.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.slots.iter().filter_map(|slot| slot.url.clone()).collect()
    }
}

// ============================================================================
// SECTION: URL Validation
// ============================================================================

/// Normalizes and validates a screenshot URL.
///
/// Accepted shapes, mirroring the marketplace front end: absolute `http://`
/// or `https://` URLs, protocol-relative `//host/...` (upgraded to https),
/// root-relative `/path` references, and bare hosts (prefixed with
/// `https://`). Any other scheme is rejected.
///
/// # Errors
///
/// Returns [`ScreenshotError::InvalidShape`] for unacceptable shapes and
/// [`ScreenshotError::UrlTooLong`] when the normalized URL exceeds
/// `max_chars`.
pub fn normalize_screenshot_url(raw: &str, max_chars: usize) -> Result<String, ScreenshotError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ScreenshotError::InvalidShape { url: String::new() });
    }
    let candidate = if trimmed.starts_with("//") {
        format!("https:{trimmed}")
    } else {
        trimmed.to_string()
    };
    let normalized = if candidate.starts_with('/') {
        candidate
    } else if has_scheme(&candidate) {
        let parsed = Url::parse(&candidate)
            .map_err(|_| ScreenshotError::InvalidShape { url: candidate.clone() })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ScreenshotError::InvalidShape { url: candidate });
        }
        candidate
    } else {
        let upgraded = format!("https://{candidate}");
        Url::parse(&upgraded).map_err(|_| ScreenshotError::InvalidShape { url: candidate })?;
        upgraded
    };
    let len = normalized.chars().count();
    if len > max_chars {
        return Err(ScreenshotError::UrlTooLong { len, max: max_chars });
    }
    Ok(normalized)
}

/// Returns true when the candidate begins with a URI scheme.
fn has_scheme(candidate: &str) -> bool {
    candidate
        .split_once(':')
        .is_some_and(|(scheme, rest)| {
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
                && scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && rest.starts_with("//")
        })
}
