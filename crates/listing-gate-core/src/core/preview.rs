// crates/listing-gate-core/src/core/preview.rs
// ============================================================================
// Module: Preview Selection
// Description: Preset-or-custom preview choice resolved to one reference.
// Purpose: Validate preview selections and produce the effective preview ref.
// Dependencies: crate::core::{assets, identifiers}, serde, thiserror
// ============================================================================

//! ## Overview
//! A listing shows exactly one preview image, chosen either from a fixed set
//! of preset paths (optionally captioned with short overlay text) or from a
//! freshly uploaded custom image. Switching kinds replaces the stored
//! reference wholesale; overlay text is only meaningful for presets and is
//! silently dropped for custom selections.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::assets::AssetContent;
use crate::core::identifiers::ContentRef;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Preview selection errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreviewError {
    /// Preset path is outside the allowed prefixes.
    #[error("invalid preview preset path: {path}")]
    InvalidPresetPath {
        /// Rejected path after normalization.
        path: String,
    },
    /// Overlay text exceeds the configured bound.
    #[error("preview overlay too long: {len} chars (max {max})")]
    OverlayTooLong {
        /// Actual length in characters.
        len: usize,
        /// Configured maximum.
        max: usize,
    },
    /// Custom upload mime type is not an image type.
    #[error("unsupported preview type: {mime}")]
    InvalidType {
        /// Rejected mime type.
        mime: String,
    },
    /// Custom upload exceeds the configured size cap.
    #[error("preview too large: {size} bytes (max {max})")]
    TooLarge {
        /// Upload size in bytes.
        size: u64,
        /// Configured maximum.
        max: u64,
    },
}

// ============================================================================
// SECTION: Selection Types
// ============================================================================

/// Bounds applied while resolving a preview selection.
///
/// # Invariants
/// - `preset_prefixes` entries begin with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewBounds {
    /// Allowed preset path prefixes.
    pub preset_prefixes: Vec<String>,
    /// Maximum overlay text length in characters.
    pub overlay_max_chars: usize,
    /// Maximum custom upload size in bytes.
    pub max_bytes: u64,
}

/// Owner-submitted preview choice.
///
/// # Invariants
/// - Exactly one variant; the engine stores the resolved [`PreviewRef`],
///   never the raw selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreviewSelection {
    /// Fixed preset path with optional overlay text.
    Preset {
        /// Path under an allowed preset prefix.
        preset_path: String,
        /// Short caption rendered over the preset.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        overlay_text: Option<String>,
    },
    /// Freshly uploaded custom image.
    Custom {
        /// Descriptor of the already-uploaded image.
        content: AssetContent,
    },
}

/// Effective preview reference stored on the listing record.
///
/// # Invariants
/// - Exactly one reference is stored; switching kinds replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreviewRef {
    /// Preset path plus optional overlay.
    Preset {
        /// Validated preset path.
        path: String,
        /// Overlay caption, when supplied.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        overlay_text: Option<String>,
    },
    /// Custom uploaded image.
    Custom {
        /// Durable reference to the uploaded image.
        content_ref: ContentRef,
    },
}

impl PreviewRef {
    /// Returns the content reference held by a custom preview, if any, so
    /// the caller can release displaced uploads.
    #[must_use]
    pub const fn custom_content_ref(&self) -> Option<&ContentRef> {
        match self {
            Self::Custom { content_ref } => Some(content_ref),
            Self::Preset { .. } => None,
        }
    }
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Validates a selection and resolves it to the effective reference.
///
/// Preset paths are normalized to a leading `/` and must fall under one of
/// the allowed prefixes. Overlay text is bounded for presets and silently
/// dropped for custom selections.
///
/// # Errors
///
/// Returns [`PreviewError`] when the selection fails validation.
pub fn resolve_selection(
    selection: PreviewSelection,
    bounds: &PreviewBounds,
) -> Result<PreviewRef, PreviewError> {
    match selection {
        PreviewSelection::Preset { preset_path, overlay_text } => {
            let trimmed = preset_path.trim();
            let normalized = if trimmed.starts_with('/') {
                trimmed.to_string()
            } else {
                format!("/{trimmed}")
            };
            if !bounds.preset_prefixes.iter().any(|prefix| normalized.starts_with(prefix)) {
                return Err(PreviewError::InvalidPresetPath { path: normalized });
            }
            let overlay = overlay_text
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty());
            if let Some(text) = &overlay {
                let len = text.chars().count();
                if len > bounds.overlay_max_chars {
                    return Err(PreviewError::OverlayTooLong {
                        len,
                        max: bounds.overlay_max_chars,
                    });
                }
            }
            Ok(PreviewRef::Preset { path: normalized, overlay_text: overlay })
        }
        PreviewSelection::Custom { content } => {
            if !content.mime_type.to_ascii_lowercase().starts_with("image/") {
                return Err(PreviewError::InvalidType { mime: content.mime_type });
            }
            if content.size_bytes > bounds.max_bytes {
                return Err(PreviewError::TooLarge {
                    size: content.size_bytes,
                    max: bounds.max_bytes,
                });
            }
            Ok(PreviewRef::Custom { content_ref: content.content_ref })
        }
    }
}
