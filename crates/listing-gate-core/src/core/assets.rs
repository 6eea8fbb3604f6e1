// crates/listing-gate-core/src/core/assets.rs
// ============================================================================
// Module: Custom Asset Set
// Description: Bounded name-keyed collection of custom graphics and its diff.
// Purpose: Model persisted assets and plan atomic diff-and-sync commits.
// Dependencies: crate::core::{identifiers, time}, serde, thiserror
// ============================================================================

//! ## Overview
//! Custom assets are binary-backed records keyed by a sanitized name that is
//! unique within a listing case-insensitively. Clients accumulate edits
//! locally (add, rename, replace, remove) and submit one desired final list;
//! [`plan_sync`] computes the create/rename/replace/delete difference against
//! the persisted set by id and the whole plan commits atomically or not at
//! all. Client-side draft bookkeeping (locally-held bytes, "new" flags) never
//! reaches this module: content arrives as descriptors of bytes the storage
//! collaborator has already accepted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::AssetId;
use crate::core::identifiers::ContentRef;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum sanitized asset name length in characters.
pub const ASSET_NAME_MAX_CHARS: usize = 160;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Custom asset validation and sync errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Every variant is detected before any store mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    /// Desired list exceeds the configured set cap.
    #[error("custom asset count {count} exceeds cap {max}")]
    LimitExceeded {
        /// Desired entry count.
        count: usize,
        /// Configured cap.
        max: usize,
    },
    /// Two desired entries normalize to the same name.
    #[error("duplicate custom asset name: {name}")]
    DuplicateName {
        /// Colliding sanitized name (lowercase).
        name: String,
    },
    /// Content mime type is outside the allow-list.
    #[error("unsupported custom asset type: {mime}")]
    UnsupportedType {
        /// Rejected mime type.
        mime: String,
    },
    /// Content exceeds the per-asset byte cap.
    #[error("custom asset too large: {size} bytes (max {max})")]
    TooLarge {
        /// Content size in bytes.
        size: u64,
        /// Configured cap.
        max: u64,
    },
    /// Name is empty after sanitization.
    #[error("custom asset name is empty after sanitization")]
    InvalidName,
    /// Entry references an asset id absent from the persisted set.
    #[error("unknown custom asset reference: {id}")]
    UnknownAsset {
        /// Unresolvable asset id.
        id: AssetId,
    },
    /// Entry carries neither an id nor content.
    #[error("custom asset entry {name} has neither id nor content")]
    MissingContent {
        /// Entry name as submitted.
        name: String,
    },
}

// ============================================================================
// SECTION: Asset Records
// ============================================================================

/// Descriptor of already-uploaded asset content.
///
/// # Invariants
/// - `content_ref` points at bytes already persisted by the storage
///   collaborator; the core never sees raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetContent {
    /// Durable reference to the uploaded bytes.
    pub content_ref: ContentRef,
    /// Declared mime type (lowercase).
    pub mime_type: String,
    /// Content size in bytes.
    pub size_bytes: u64,
}

/// Persisted custom asset record.
///
/// # Invariants
/// - `id` is assigned once and stable across renames and replacements.
/// - `name` is sanitized and unique within its set case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomAssetRecord {
    /// Server-assigned identifier.
    pub id: AssetId,
    /// Sanitized display name.
    pub name: String,
    /// Declared mime type (lowercase).
    pub mime_type: String,
    /// Content size in bytes.
    pub size_bytes: u64,
    /// Durable reference to the stored bytes.
    pub content_ref: ContentRef,
    /// Last time the name or content changed.
    pub updated_at: Timestamp,
}

/// One entry of a desired final asset list.
///
/// Entries either keep/rename a persisted asset (`id` set, no `content`),
/// replace a persisted asset's content (`id` and `content` set), or
/// introduce new content (`content` set, no `id`).
///
/// # Invariants
/// - At least one of `id` and `content` is present; [`plan_sync`] rejects
///   entries with neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredAsset {
    /// Persisted asset id, when the entry refers to an existing record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AssetId>,
    /// Desired display name (sanitized during planning).
    pub name: String,
    /// New content descriptor, when the entry uploads or replaces bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<AssetContent>,
}

// ============================================================================
// SECTION: Asset Set
// ============================================================================

/// Bounded, insertion-ordered collection of custom asset records.
///
/// # Invariants
/// - Names are unique case-insensitively (enforced at construction).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetSet {
    /// Records in client-submitted order.
    records: Vec<CustomAssetRecord>,
}

impl AssetSet {
    /// Builds a set from records, enforcing case-insensitive name uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::DuplicateName`] on the first collision.
    pub fn from_records(records: Vec<CustomAssetRecord>) -> Result<Self, AssetError> {
        let mut seen = HashSet::new();
        for record in &records {
            if !seen.insert(record.name.to_lowercase()) {
                return Err(AssetError::DuplicateName { name: record.name.to_lowercase() });
            }
        }
        Ok(Self { records })
    }

    /// Returns the number of records in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when the set holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the records in order.
    #[must_use]
    pub fn records(&self) -> &[CustomAssetRecord] {
        &self.records
    }

    /// Returns the record with the given id, if present.
    #[must_use]
    pub fn get(&self, id: &AssetId) -> Option<&CustomAssetRecord> {
        self.records.iter().find(|record| &record.id == id)
    }

    /// Returns every content reference held by the set.
    #[must_use]
    pub fn content_refs(&self) -> Vec<ContentRef> {
        self.records.iter().map(|record| record.content_ref.clone()).collect()
    }

    /// Returns true when all names are unique case-insensitively.
    #[must_use]
    pub fn names_unique_case_insensitive(&self) -> bool {
        let mut seen = HashSet::new();
        self.records.iter().all(|record| seen.insert(record.name.to_lowercase()))
    }
}

// ============================================================================
// SECTION: Name Sanitization
// ============================================================================

/// Sanitizes a client-supplied asset name.
///
/// Carriage returns and line feeds are stripped, surrounding whitespace is
/// trimmed, path separator runs collapse to a single `-`, and the result is
/// truncated to [`ASSET_NAME_MAX_CHARS`].
///
/// # Errors
///
/// Returns [`AssetError::InvalidName`] when nothing remains after
/// sanitization.
pub fn sanitize_asset_name(raw: &str) -> Result<String, AssetError> {
    let stripped: String = raw.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    let trimmed = stripped.trim();
    let mut sanitized = String::with_capacity(trimmed.len());
    let mut in_separator_run = false;
    for c in trimmed.chars() {
        if c == '/' || c == '\\' {
            if !in_separator_run {
                sanitized.push('-');
                in_separator_run = true;
            }
        } else {
            sanitized.push(c);
            in_separator_run = false;
        }
    }
    let truncated: String = sanitized.chars().take(ASSET_NAME_MAX_CHARS).collect();
    if truncated.is_empty() {
        return Err(AssetError::InvalidName);
    }
    Ok(truncated)
}

// ============================================================================
// SECTION: Sync Planning
// ============================================================================

/// Validation bounds applied while planning a sync.
///
/// # Invariants
/// - `allowed_mime_types` entries are lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSyncBounds {
    /// Maximum number of assets per listing.
    pub max_count: usize,
    /// Maximum size of a single asset in bytes.
    pub max_bytes: u64,
    /// Allowed mime types (lowercase).
    pub allowed_mime_types: Vec<String>,
}

/// Outcome of planning one diff-and-sync operation.
///
/// # Invariants
/// - `next` honors the set cap and name uniqueness.
/// - `released` lists every content reference displaced by the plan
///   (deleted records plus replaced content), for best-effort storage release
///   after commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSyncPlan {
    /// The complete next asset set, in desired order.
    pub next: Vec<CustomAssetRecord>,
    /// Content references no longer referenced after commit.
    pub released: Vec<ContentRef>,
    /// True when the plan changes nothing (idempotent resubmission).
    pub unchanged: bool,
}

/// Computes the atomic difference between the persisted set and a desired
/// final list.
///
/// Entries are matched by id; entries without an id are matched by sanitized
/// name so that resubmitting an already-committed list is a no-op. All
/// validation (cap, duplicate names, mime allow-list, byte cap, dangling
/// references) completes before the plan is produced, so callers can commit
/// the whole plan or nothing.
///
/// # Errors
///
/// Returns the first [`AssetError`] encountered; the persisted set is never
/// touched by planning.
pub fn plan_sync(
    current: &AssetSet,
    desired: &[DesiredAsset],
    bounds: &AssetSyncBounds,
    mut next_id: impl FnMut() -> AssetId,
    now: Timestamp,
) -> Result<AssetSyncPlan, AssetError> {
    if desired.len() > bounds.max_count {
        return Err(AssetError::LimitExceeded { count: desired.len(), max: bounds.max_count });
    }

    let by_id: HashMap<&AssetId, &CustomAssetRecord> =
        current.records().iter().map(|record| (&record.id, record)).collect();
    let by_name: HashMap<String, &CustomAssetRecord> = current
        .records()
        .iter()
        .map(|record| (record.name.to_lowercase(), record))
        .collect();

    let mut names = HashSet::new();
    let mut next = Vec::with_capacity(desired.len());
    let mut released = Vec::new();

    for entry in desired {
        let name = sanitize_asset_name(&entry.name)?;
        if !names.insert(name.to_lowercase()) {
            return Err(AssetError::DuplicateName { name: name.to_lowercase() });
        }

        if let Some(content) = &entry.content {
            validate_content(content, bounds)?;
            // Entries without an id fall back to name matching so an
            // already-committed list resubmitted verbatim changes nothing.
            let existing = match &entry.id {
                Some(id) => {
                    Some(*by_id.get(id).ok_or_else(|| AssetError::UnknownAsset { id: id.clone() })?)
                }
                None => by_name.get(&name.to_lowercase()).copied(),
            };
            match existing {
                Some(record) if record.content_ref == content.content_ref => {
                    // Same bytes; treat as keep/rename.
                    next.push(renamed_record(record, name, now));
                }
                Some(record) => {
                    released.push(record.content_ref.clone());
                    next.push(CustomAssetRecord {
                        id: record.id.clone(),
                        name,
                        mime_type: content.mime_type.to_lowercase(),
                        size_bytes: content.size_bytes,
                        content_ref: content.content_ref.clone(),
                        updated_at: now,
                    });
                }
                None => {
                    next.push(CustomAssetRecord {
                        id: next_id(),
                        name,
                        mime_type: content.mime_type.to_lowercase(),
                        size_bytes: content.size_bytes,
                        content_ref: content.content_ref.clone(),
                        updated_at: now,
                    });
                }
            }
        } else if let Some(id) = &entry.id {
            let record =
                *by_id.get(id).ok_or_else(|| AssetError::UnknownAsset { id: id.clone() })?;
            next.push(renamed_record(record, name, now));
        } else {
            return Err(AssetError::MissingContent { name: entry.name.clone() });
        }
    }

    let kept: HashSet<&AssetId> = next.iter().map(|record| &record.id).collect();
    for record in current.records() {
        if !kept.contains(&record.id) {
            released.push(record.content_ref.clone());
        }
    }

    let unchanged = next == current.records();
    Ok(AssetSyncPlan { next, released, unchanged })
}

/// Returns the record with its name updated, bumping `updated_at` only when
/// the name actually changed so idempotent resubmissions stay byte-identical.
fn renamed_record(record: &CustomAssetRecord, name: String, now: Timestamp) -> CustomAssetRecord {
    if record.name == name {
        record.clone()
    } else {
        CustomAssetRecord { name, updated_at: now, ..record.clone() }
    }
}

/// Validates one content descriptor against the configured bounds.
fn validate_content(content: &AssetContent, bounds: &AssetSyncBounds) -> Result<(), AssetError> {
    let mime = content.mime_type.to_lowercase();
    if !bounds.allowed_mime_types.iter().any(|allowed| allowed == &mime) {
        return Err(AssetError::UnsupportedType { mime });
    }
    if content.size_bytes > bounds.max_bytes {
        return Err(AssetError::TooLarge { size: content.size_bytes, max: bounds.max_bytes });
    }
    Ok(())
}
