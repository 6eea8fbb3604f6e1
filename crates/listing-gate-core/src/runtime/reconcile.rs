// crates/listing-gate-core/src/runtime/reconcile.rs
// ============================================================================
// Module: Reconciliation Engine
// Description: Validates and merges partial edits into the listing aggregate.
// Purpose: Produce each next listing version atomically from sub-resource edits.
// Dependencies: crate::core, crate::interfaces, crate::runtime, thiserror, serde
// ============================================================================

//! ## Overview
//! The reconciliation engine accepts a partial edit touching one or more
//! sub-resources (core fields, screenshot slots, the custom asset set, the
//! preview selection), validates everything up front, and commits the merged
//! next version in a single store write. Validation failures are returned
//! before any mutation; a subsequent read can never observe a partially
//! applied edit. Merge semantics are last-writer-wins per field: scalars are
//! shallow-merged, `tags` and the screenshot URL list are replaced
//! wholesale, and the custom asset set is diffed and replaced atomically.
//!
//! Security posture: partial edits and stored records are untrusted;
//! aggregate invariants are re-checked before every persist.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use thiserror::Error;

use crate::core::assets::AssetError;
use crate::core::assets::AssetSet;
use crate::core::assets::AssetSyncBounds;
use crate::core::assets::CustomAssetRecord;
use crate::core::assets::DesiredAsset;
use crate::core::assets::plan_sync;
use crate::core::identifiers::AssetId;
use crate::core::identifiers::ContentRef;
use crate::core::identifiers::UserId;
use crate::core::listing::AccessMode;
use crate::core::listing::InvariantViolation;
use crate::core::listing::LifecycleStatus;
use crate::core::listing::ListingLimits;
use crate::core::listing::ListingRecord;
use crate::core::listing::ListingState;
use crate::core::listing::Pin;
use crate::core::listing::Visibility;
use crate::core::preview::PreviewBounds;
use crate::core::preview::PreviewError;
use crate::core::preview::PreviewRef;
use crate::core::preview::PreviewSelection;
use crate::core::preview::resolve_selection;
use crate::core::screenshots::SCREENSHOT_SLOT_COUNT;
use crate::core::screenshots::ScreenshotArray;
use crate::core::screenshots::ScreenshotError;
use crate::core::screenshots::ScreenshotUpload;
use crate::core::screenshots::normalize_screenshot_url;
use crate::core::time::Timestamp;
use crate::interfaces::SharedListingStore;
use crate::interfaces::SharedObjectStorage;
use crate::interfaces::SharedSessionStore;
use crate::interfaces::StoreError;
use crate::runtime::generate_pin;
use crate::runtime::random_hex;

// ============================================================================
// SECTION: Editor Context
// ============================================================================

/// Resolved identity of the caller attempting an operation.
///
/// # Invariants
/// - `user_id` comes from the external auth collaborator; the core never
///   inspects credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorContext {
    /// Authenticated user identifier.
    pub user_id: UserId,
    /// True when the caller presents an admin capability.
    pub admin: bool,
}

impl EditorContext {
    /// Creates a non-admin editor context.
    #[must_use]
    pub fn user(user_id: impl Into<UserId>) -> Self {
        Self { user_id: user_id.into(), admin: false }
    }

    /// Creates an admin editor context.
    #[must_use]
    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Self { user_id: user_id.into(), admin: true }
    }

    /// Returns true when this context may mutate the record.
    #[must_use]
    pub fn may_edit(&self, record: &ListingRecord) -> bool {
        self.admin || self.user_id == record.owner_id
    }
}

// ============================================================================
// SECTION: Partial Edit
// ============================================================================

/// Deserializes a nullable field so that an explicit `null` clears the value
/// while an absent field leaves it untouched.
fn deserialize_clearable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// One partial edit over a listing record.
///
/// `None` fields are left untouched; the `pin` field distinguishes "absent"
/// (untouched) from an explicit `null` (clear).
///
/// # Invariants
/// - Carries only desired values; no client-side draft bookkeeping crosses
///   this boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialEdit {
    /// New title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New short description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New long description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
    /// Replacement tag set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// New visibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    /// New access mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_mode: Option<AccessMode>,
    /// Pin update: `Some(Some(_))` sets, `Some(None)` clears, `None` leaves.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_clearable")]
    pub pin: Option<Option<String>>,
    /// New concurrent session cap (clamped to the configured ceiling).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_pins: Option<u32>,
    /// New price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Replacement screenshot URL list (whole-collection replace).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_urls: Option<Vec<String>>,
}

impl PartialEdit {
    /// Returns true when the edit specifies nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.long_description.is_none()
            && self.tags.is_none()
            && self.visibility.is_none()
            && self.access_mode.is_none()
            && self.pin.is_none()
            && self.max_concurrent_pins.is_none()
            && self.price.is_none()
            && self.screenshot_urls.is_none()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Reconciliation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Every failure is detected before any store mutation is committed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconcileError {
    /// Caller is neither the owner nor an admin capability.
    #[error("editor is not the listing owner")]
    Unauthorized,
    /// Listing (or referenced sub-resource) does not exist.
    #[error("listing not found")]
    NotFound,
    /// A field failed shape or bounds validation.
    #[error("validation failed for {field}: {reason}")]
    ValidationFailed {
        /// Offending field.
        field: &'static str,
        /// Human-presentable reason.
        reason: String,
    },
    /// A configured cap was exceeded.
    #[error("limit exceeded for {what}: {actual} (max {limit})")]
    LimitExceeded {
        /// Which limit was exceeded.
        what: &'static str,
        /// Configured limit.
        limit: u64,
        /// Submitted value.
        actual: u64,
    },
    /// Two submitted asset names collide case-insensitively.
    #[error("duplicate custom asset name: {name}")]
    DuplicateName {
        /// Colliding name (lowercase).
        name: String,
    },
    /// Store failure; nothing was committed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Builds a validation failure for one field.
fn validation(field: &'static str, reason: impl Into<String>) -> ReconcileError {
    ReconcileError::ValidationFailed { field, reason: reason.into() }
}

impl From<AssetError> for ReconcileError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::LimitExceeded { count, max } => Self::LimitExceeded {
                what: "custom_assets",
                limit: u64::try_from(max).unwrap_or(u64::MAX),
                actual: u64::try_from(count).unwrap_or(u64::MAX),
            },
            AssetError::DuplicateName { name } => Self::DuplicateName { name },
            AssetError::TooLarge { size, max } => {
                Self::LimitExceeded { what: "custom_asset_bytes", limit: max, actual: size }
            }
            AssetError::UnsupportedType { mime } => {
                validation("custom_assets", format!("unsupported mime type: {mime}"))
            }
            AssetError::InvalidName => validation("custom_assets", "asset name is empty"),
            AssetError::UnknownAsset { id } => {
                validation("custom_assets", format!("unknown asset id: {id}"))
            }
            AssetError::MissingContent { name } => {
                validation("custom_assets", format!("entry {name} has neither id nor content"))
            }
        }
    }
}

impl From<ScreenshotError> for ReconcileError {
    fn from(err: ScreenshotError) -> Self {
        match err {
            ScreenshotError::InvalidIndex { index, slots } => validation(
                "screenshot_slot",
                format!("index {index} out of range (slots: {slots})"),
            ),
            ScreenshotError::InvalidShape { url } => {
                validation("screenshot_urls", format!("invalid url shape: {url}"))
            }
            ScreenshotError::UrlTooLong { len, max } => {
                validation("screenshot_urls", format!("url too long: {len} chars (max {max})"))
            }
            ScreenshotError::TooLarge { size, max } => {
                Self::LimitExceeded { what: "screenshot_bytes", limit: max, actual: size }
            }
            ScreenshotError::InvalidType { mime } => {
                validation("screenshot_type", format!("unsupported mime type: {mime}"))
            }
        }
    }
}

impl From<PreviewError> for ReconcileError {
    fn from(err: PreviewError) -> Self {
        match err {
            PreviewError::InvalidPresetPath { path } => {
                validation("preview", format!("invalid preset path: {path}"))
            }
            PreviewError::OverlayTooLong { len, max } => {
                validation("preview", format!("overlay too long: {len} chars (max {max})"))
            }
            PreviewError::InvalidType { mime } => {
                validation("preview", format!("unsupported mime type: {mime}"))
            }
            PreviewError::TooLarge { size, max } => {
                Self::LimitExceeded { what: "preview_bytes", limit: max, actual: size }
            }
        }
    }
}

impl From<InvariantViolation> for ReconcileError {
    fn from(err: InvariantViolation) -> Self {
        validation("listing", err.to_string())
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Reconciliation engine over shared store handles.
///
/// # Invariants
/// - Every accepted edit commits through exactly one `ListingStore::save`.
/// - Content displaced by an accepted edit is released best-effort after the
///   commit; release failures never roll an edit back.
pub struct ReconciliationEngine {
    /// Listing persistence.
    listings: SharedListingStore,
    /// Session persistence, touched when access transitions leave pin mode.
    sessions: SharedSessionStore,
    /// Object storage collaborator for best-effort content release.
    storage: SharedObjectStorage,
    /// Configured validation bounds.
    limits: ListingLimits,
}

impl ReconciliationEngine {
    /// Creates an engine over the given stores and limits.
    #[must_use]
    pub fn new(
        listings: SharedListingStore,
        sessions: SharedSessionStore,
        storage: SharedObjectStorage,
        limits: ListingLimits,
    ) -> Self {
        Self { listings, sessions, storage, limits }
    }

    /// Returns the configured limits.
    #[must_use]
    pub const fn limits(&self) -> &ListingLimits {
        &self.limits
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Fetches the current listing for a viewer.
    ///
    /// Reads are side-effect-free. Soft-deleted and non-public listings are
    /// visible only to the owner or an admin capability; the stored pin is
    /// redacted for everyone else.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::NotFound`] for unknown or hidden listings
    /// and [`ReconcileError::Store`] on backend failure.
    pub fn fetch(
        &self,
        handle: &str,
        viewer: Option<&EditorContext>,
    ) -> Result<ListingRecord, ReconcileError> {
        let record = self.listings.resolve(handle)?.ok_or(ReconcileError::NotFound)?;
        let privileged = viewer.is_some_and(|v| v.may_edit(&record));
        if record.is_soft_deleted() && !privileged {
            return Err(ReconcileError::NotFound);
        }
        if !record.is_publicly_visible() && !privileged {
            return Err(ReconcileError::NotFound);
        }
        if privileged {
            Ok(record)
        } else {
            // The pin is owner-facing configuration; viewers obtain access
            // only through admission.
            let mut redacted = record;
            redacted.access.pin = None;
            Ok(redacted)
        }
    }

    // ------------------------------------------------------------------
    // Partial edits
    // ------------------------------------------------------------------

    /// Validates and applies one partial edit, returning the full new
    /// version so callers can resynchronize all derived state from a single
    /// payload.
    ///
    /// An empty edit is a no-op: it returns the current record without a
    /// version bump.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when authorization, validation, or the
    /// store commit fails; nothing is mutated on error.
    pub fn apply_edit(
        &self,
        handle: &str,
        editor: &EditorContext,
        edit: &PartialEdit,
        now: Timestamp,
    ) -> Result<ListingRecord, ReconcileError> {
        let mut record = self.load_for_edit(handle, editor)?;
        if edit.is_empty() {
            return Ok(record);
        }

        self.merge_text_fields(&mut record, edit)?;
        self.merge_price(&mut record, edit)?;
        let displaced = self.merge_screenshots(&mut record, edit)?;
        let left_pin_mode = self.merge_access(&mut record, edit)?;

        if let Some(visibility) = edit.visibility {
            record.visibility = visibility;
        }

        record.version += 1;
        record.updated_at = now;
        record.check_invariants(&self.limits)?;
        self.listings.save(&record)?;

        if left_pin_mode {
            self.sessions.remove_all(&record.id)?;
        }
        self.release_urls(&displaced);
        Ok(record)
    }

    /// Validates and merges the bounded text fields and tags.
    fn merge_text_fields(
        &self,
        record: &mut ListingRecord,
        edit: &PartialEdit,
    ) -> Result<(), ReconcileError> {
        if let Some(title) = &edit.title {
            let trimmed = title.trim();
            if trimmed.is_empty() {
                return Err(validation("title", "must not be empty"));
            }
            check_chars("title", trimmed, self.limits.title_max_chars)?;
            record.title = trimmed.to_string();
        }
        if let Some(description) = &edit.description {
            check_chars("description", description, self.limits.description_max_chars)?;
            record.description = description.clone();
        }
        if let Some(long_description) = &edit.long_description {
            check_chars(
                "long_description",
                long_description,
                self.limits.long_description_max_chars,
            )?;
            record.long_description = long_description.clone();
        }
        if let Some(tags) = &edit.tags {
            let mut cleaned: Vec<String> = Vec::new();
            for tag in tags {
                let trimmed = tag.trim();
                if trimmed.is_empty() {
                    continue;
                }
                check_chars("tags", trimmed, self.limits.tag_max_chars)?;
                if !cleaned.iter().any(|existing| existing == trimmed) {
                    cleaned.push(trimmed.to_string());
                }
            }
            if cleaned.len() > self.limits.max_tags {
                return Err(validation(
                    "tags",
                    format!("too many tags: {} (max {})", cleaned.len(), self.limits.max_tags),
                ));
            }
            record.tags = cleaned;
        }
        Ok(())
    }

    /// Validates and merges the price field.
    fn merge_price(
        &self,
        record: &mut ListingRecord,
        edit: &PartialEdit,
    ) -> Result<(), ReconcileError> {
        if let Some(price) = edit.price {
            if !price.is_finite()
                || price < self.limits.price_min
                || price > self.limits.price_max
            {
                return Err(validation(
                    "price",
                    format!(
                        "must be between {} and {}",
                        self.limits.price_min, self.limits.price_max
                    ),
                ));
            }
            record.price = Some(price);
        }
        Ok(())
    }

    /// Validates and merges a whole-collection screenshot URL replacement,
    /// returning the displaced URLs for best-effort release.
    fn merge_screenshots(
        &self,
        record: &mut ListingRecord,
        edit: &PartialEdit,
    ) -> Result<Vec<String>, ReconcileError> {
        let Some(urls) = &edit.screenshot_urls else {
            return Ok(Vec::new());
        };
        if urls.len() > SCREENSHOT_SLOT_COUNT {
            return Err(validation(
                "screenshot_urls",
                format!("too many entries: {} (slots: {SCREENSHOT_SLOT_COUNT})", urls.len()),
            ));
        }
        let mut normalized: Vec<Option<String>> = Vec::with_capacity(SCREENSHOT_SLOT_COUNT);
        for url in urls {
            if url.trim().is_empty() {
                normalized.push(None);
            } else {
                normalized.push(Some(normalize_screenshot_url(
                    url,
                    self.limits.screenshot_url_max_chars,
                )?));
            }
        }
        normalized.resize(SCREENSHOT_SLOT_COUNT, None);
        Ok(record.screenshots.replace_urls(&normalized))
    }

    /// Validates and merges the access configuration, returning whether the
    /// listing left pin mode (so live sessions must be invalidated).
    fn merge_access(
        &self,
        record: &mut ListingRecord,
        edit: &PartialEdit,
    ) -> Result<bool, ReconcileError> {
        let previous_mode = record.access.mode;
        let target_mode = edit.access_mode.unwrap_or(previous_mode);

        if let Some(update) = &edit.pin {
            match update {
                Some(raw) => {
                    validate_pin_shape(raw)?;
                    record.access.pin = Some(Pin::new(raw.clone()));
                }
                None => record.access.pin = None,
            }
        }
        if let Some(cap) = edit.max_concurrent_pins {
            record.access.max_concurrent_pins =
                cap.clamp(1, self.limits.max_concurrent_pins_ceiling);
        }

        record.access.mode = target_mode;
        if target_mode == AccessMode::Pin {
            if record.access.pin.is_none() {
                record.access.pin = Some(Pin::new(generate_pin()));
            }
        } else {
            record.access.pin = None;
        }
        Ok(previous_mode == AccessMode::Pin && target_mode != AccessMode::Pin)
    }

    // ------------------------------------------------------------------
    // Custom asset sync
    // ------------------------------------------------------------------

    /// Applies one atomic diff-and-sync of the custom asset set.
    ///
    /// Either the whole desired set is committed and returned, or nothing
    /// changes. Resubmitting an already-committed list is a no-op that
    /// returns byte-identical records.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when authorization, validation, or the
    /// store commit fails; the persisted set is unchanged on error.
    pub fn sync_assets(
        &self,
        handle: &str,
        editor: &EditorContext,
        desired: &[DesiredAsset],
        now: Timestamp,
    ) -> Result<Vec<CustomAssetRecord>, ReconcileError> {
        let mut record = self.load_for_edit(handle, editor)?;
        let bounds = AssetSyncBounds {
            max_count: self.limits.max_custom_assets,
            max_bytes: self.limits.custom_asset_max_bytes,
            allowed_mime_types: self.limits.allowed_asset_mime_types.clone(),
        };
        let plan = plan_sync(
            &record.custom_assets,
            desired,
            &bounds,
            || AssetId::new(random_hex(16)),
            now,
        )?;
        if plan.unchanged {
            return Ok(record.custom_assets.records().to_vec());
        }

        record.custom_assets = AssetSet::from_records(plan.next.clone())?;
        record.version += 1;
        record.updated_at = now;
        record.check_invariants(&self.limits)?;
        self.listings.save(&record)?;

        self.release_refs(&plan.released);
        Ok(plan.next)
    }

    // ------------------------------------------------------------------
    // Screenshot slots
    // ------------------------------------------------------------------

    /// Replaces or clears one screenshot slot atomically.
    ///
    /// Each slot operation is independent (slots are not diffed as a batch);
    /// the slot's version counter is bumped on success for cache
    /// invalidation.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when authorization, index, upload
    /// validation, or the store commit fails.
    pub fn set_screenshot_slot(
        &self,
        handle: &str,
        editor: &EditorContext,
        index: usize,
        upload: Option<ScreenshotUpload>,
        now: Timestamp,
    ) -> Result<ScreenshotArray, ReconcileError> {
        let mut record = self.load_for_edit(handle, editor)?;
        let url = match upload {
            Some(upload) => {
                upload.validate(self.limits.screenshot_max_bytes)?;
                Some(upload.content_ref.as_str().to_string())
            }
            None => None,
        };
        let previous = record.screenshots.set_slot(index, url)?;

        record.version += 1;
        record.updated_at = now;
        self.listings.save(&record)?;

        if let Some(previous) = previous {
            self.release_urls(&[previous]);
        }
        Ok(record.screenshots)
    }

    // ------------------------------------------------------------------
    // Preview selection
    // ------------------------------------------------------------------

    /// Validates a preview selection and stores the resolved reference,
    /// replacing any prior preview wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when authorization, validation, or the
    /// store commit fails.
    pub fn set_preview(
        &self,
        handle: &str,
        editor: &EditorContext,
        selection: PreviewSelection,
        now: Timestamp,
    ) -> Result<PreviewRef, ReconcileError> {
        let mut record = self.load_for_edit(handle, editor)?;
        let bounds = PreviewBounds {
            preset_prefixes: self.limits.preview_preset_prefixes.clone(),
            overlay_max_chars: self.limits.overlay_max_chars,
            max_bytes: self.limits.preview_max_bytes,
        };
        let resolved = resolve_selection(selection, &bounds)?;
        let displaced =
            record.preview.as_ref().and_then(|p| p.custom_content_ref().cloned());

        record.preview = Some(resolved.clone());
        record.version += 1;
        record.updated_at = now;
        self.listings.save(&record)?;

        if let Some(displaced) = displaced {
            self.release_refs(&[displaced]);
        }
        Ok(resolved)
    }

    // ------------------------------------------------------------------
    // State, lifecycle, deletion, counters
    // ------------------------------------------------------------------

    /// Toggles the owner-controlled activation state.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when authorization or the store commit
    /// fails.
    pub fn set_state(
        &self,
        handle: &str,
        editor: &EditorContext,
        state: ListingState,
        now: Timestamp,
    ) -> Result<ListingRecord, ReconcileError> {
        let mut record = self.load_for_edit(handle, editor)?;
        record.state = state;
        record.version += 1;
        record.updated_at = now;
        self.listings.save(&record)?;
        Ok(record)
    }

    /// Records a moderation lifecycle transition (admin capability only;
    /// review logic lives in the external moderation collaborator).
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Unauthorized`] without an admin capability
    /// and [`ReconcileError`] when the store commit fails.
    pub fn set_lifecycle_status(
        &self,
        handle: &str,
        editor: &EditorContext,
        status: LifecycleStatus,
        now: Timestamp,
    ) -> Result<ListingRecord, ReconcileError> {
        if !editor.admin {
            return Err(ReconcileError::Unauthorized);
        }
        let mut record = self.load(handle)?;
        record.lifecycle_status = status;
        record.version += 1;
        record.updated_at = now;
        self.listings.save(&record)?;
        Ok(record)
    }

    /// Deletes a listing.
    ///
    /// Soft deletion marks the record hidden (URL still resolvable for the
    /// owner); hard deletion purges the record and releases every referenced
    /// asset, preview, and screenshot best-effort. Both variants invalidate
    /// live sessions.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] when authorization or the store commit
    /// fails.
    pub fn delete(
        &self,
        handle: &str,
        editor: &EditorContext,
        hard: bool,
        now: Timestamp,
    ) -> Result<(), ReconcileError> {
        let mut record = self.load_for_edit(handle, editor)?;
        if hard {
            let mut refs = record.custom_assets.content_refs();
            if let Some(preview_ref) =
                record.preview.as_ref().and_then(|p| p.custom_content_ref())
            {
                refs.push(preview_ref.clone());
            }
            self.listings.remove(&record.id)?;
            self.sessions.remove_all(&record.id)?;
            self.release_refs(&refs);
            self.release_urls(&record.screenshots.urls());
        } else {
            record.deleted_at = Some(now);
            record.state = ListingState::Inactive;
            record.version += 1;
            record.updated_at = now;
            self.listings.save(&record)?;
            self.sessions.remove_all(&record.id)?;
        }
        Ok(())
    }

    /// Increments the play counter for a playable listing.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::NotFound`] for hidden listings and
    /// [`ReconcileError`] when the store commit fails.
    pub fn record_play(&self, handle: &str, now: Timestamp) -> Result<(), ReconcileError> {
        let mut record = self.load(handle)?;
        if !record.is_publicly_visible() {
            return Err(ReconcileError::NotFound);
        }
        record.plays_count += 1;
        record.version += 1;
        record.updated_at = now;
        self.listings.save(&record)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Loads a live (non-soft-deleted) record by handle.
    fn load(&self, handle: &str) -> Result<ListingRecord, ReconcileError> {
        let record = self.listings.resolve(handle)?.ok_or(ReconcileError::NotFound)?;
        if record.is_soft_deleted() {
            return Err(ReconcileError::NotFound);
        }
        Ok(record)
    }

    /// Loads a live record and authorizes the editor against it.
    fn load_for_edit(
        &self,
        handle: &str,
        editor: &EditorContext,
    ) -> Result<ListingRecord, ReconcileError> {
        let record = self.load(handle)?;
        if !editor.may_edit(&record) {
            return Err(ReconcileError::Unauthorized);
        }
        Ok(record)
    }

    /// Releases content references best-effort; failures are ignored
    /// because the owning edit has already committed.
    fn release_refs(&self, refs: &[ContentRef]) {
        for content_ref in refs {
            let _unused = self.storage.release(content_ref);
        }
    }

    /// Releases URL-shaped references best-effort.
    fn release_urls(&self, urls: &[String]) {
        for url in urls {
            let _unused = self.storage.release(&ContentRef::new(url.clone()));
        }
    }
}

// ============================================================================
// SECTION: Field Validation Helpers
// ============================================================================

/// Rejects values longer than `max` characters.
fn check_chars(field: &'static str, value: &str, max: usize) -> Result<(), ReconcileError> {
    let len = value.chars().count();
    if len > max {
        return Err(validation(field, format!("too long: {len} chars (max {max})")));
    }
    Ok(())
}

/// Validates the shape of an owner-supplied pin.
fn validate_pin_shape(raw: &str) -> Result<(), ReconcileError> {
    let len = raw.chars().count();
    if !(4..=128).contains(&len) {
        return Err(validation("pin", "must be between 4 and 128 characters"));
    }
    if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(validation("pin", "must not contain whitespace or control characters"));
    }
    Ok(())
}
