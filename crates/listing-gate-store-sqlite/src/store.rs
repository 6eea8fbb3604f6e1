// crates/listing-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Listing and Session Store
// Description: Durable ListingStore and SessionStore backed by SQLite WAL.
// Purpose: Persist listing snapshots and serialize per-listing admission.
// Dependencies: listing-gate-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Listing records are stored as canonical JSON snapshots keyed by id with a
//! unique slug column and a monotonic version column; saves run in a
//! transaction that rejects non-monotonic writes and slug collisions. PIN
//! sessions are stored relationally; [`SqliteStore`] performs admission's
//! evict-count-insert inside one transaction on the single guarded
//! connection, so two concurrent admissions for a listing can never both
//! pass the capacity check.
//!
//! Security posture: database contents are untrusted on load; snapshots that
//! fail deserialization surface as corruption errors and fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use listing_gate_core::ListingId;
use listing_gate_core::ListingRecord;
use listing_gate_core::ListingStore;
use listing_gate_core::PinSession;
use listing_gate_core::SessionId;
use listing_gate_core::SessionStore;
use listing_gate_core::StoreError;
use listing_gate_core::Timestamp;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds and is greater than zero.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a configuration with defaults for the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store open and schema errors.
///
/// # Invariants
/// - Error messages avoid embedding record payloads.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store configuration is invalid.
    #[error("sqlite store config error: {0}")]
    Invalid(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Schema version in the database is newer than this build supports.
    #[error("sqlite store schema version {found} unsupported (max {supported})")]
    SchemaVersion {
        /// Version found in the database.
        found: i64,
        /// Maximum supported version.
        supported: i64,
    },
}

/// Maps a rusqlite error into the shared store error.
fn db_err(err: &rusqlite::Error) -> StoreError {
    StoreError::Io(err.to_string())
}

/// Maps a mutex poisoning failure into the shared store error.
fn lock_err() -> StoreError {
    StoreError::Io("store connection lock poisoned".to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Durable listing and session store over one guarded `SQLite` connection.
///
/// # Invariants
/// - All writes run on the single guarded connection, so per-listing
///   admission and listing saves serialize process-wide.
/// - Listing snapshots round-trip through JSON; deserialization failures
///   fail closed as corruption.
pub struct SqliteStore {
    /// Guarded database connection.
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid, the database
    /// cannot be opened, or the schema is unsupported.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        if config.busy_timeout_ms == 0 {
            return Err(SqliteStoreError::Invalid(
                "busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if config.path.as_os_str().is_empty() {
            return Err(SqliteStoreError::Invalid("path must not be empty".to_string()));
        }
        if config.path.exists() && config.path.is_dir() {
            return Err(SqliteStoreError::Invalid(
                "store path must be a file, not a directory".to_string(),
            ));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let conn = Connection::open_with_flags(&config.path, flags)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Self::initialize(conn, config)
    }

    /// Opens an in-memory store for tests and ephemeral deployments.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be initialized.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let conn =
            Connection::open_in_memory().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let config = SqliteStoreConfig::new(Path::new(":memory:"));
        Self::initialize(conn, &config)
    }

    /// Applies pragmas and the schema to a fresh connection.
    fn initialize(
        conn: Connection,
        config: &SqliteStoreConfig,
    ) -> Result<Self, SqliteStoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = {};",
            config.journal_mode.pragma_value()
        ))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        conn.execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Self::apply_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Creates tables and records the schema version.
    fn apply_schema(conn: &Connection) -> Result<(), SqliteStoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_info (
                 id INTEGER PRIMARY KEY CHECK (id = 1),
                 version INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS listings (
                 id TEXT PRIMARY KEY,
                 slug TEXT NOT NULL UNIQUE,
                 version INTEGER NOT NULL,
                 snapshot TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS pin_sessions (
                 listing_id TEXT NOT NULL,
                 session_id TEXT NOT NULL,
                 anon_id TEXT,
                 ip_hash TEXT NOT NULL,
                 created_at INTEGER NOT NULL,
                 last_seen_at INTEGER NOT NULL,
                 PRIMARY KEY (listing_id, session_id)
             );
             CREATE INDEX IF NOT EXISTS idx_pin_sessions_live
                 ON pin_sessions (listing_id, last_seen_at);",
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;

        let stored: Option<i64> = conn
            .query_row("SELECT version FROM schema_info WHERE id = 1", [], |row| row.get(0))
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        match stored {
            Some(found) if found > SCHEMA_VERSION => {
                Err(SqliteStoreError::SchemaVersion { found, supported: SCHEMA_VERSION })
            }
            Some(_) => Ok(()),
            None => {
                conn.execute(
                    "INSERT INTO schema_info (id, version) VALUES (1, ?1)",
                    params![SCHEMA_VERSION],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
                Ok(())
            }
        }
    }

    /// Deserializes one listing snapshot, failing closed on corruption.
    fn decode_snapshot(snapshot: &str) -> Result<ListingRecord, StoreError> {
        serde_json::from_str(snapshot)
            .map_err(|err| StoreError::Corrupt(format!("listing snapshot: {err}")))
    }
}

// ============================================================================
// SECTION: Listing Store Impl
// ============================================================================

impl ListingStore for SqliteStore {
    fn get(&self, id: &ListingId) -> Result<Option<ListingRecord>, StoreError> {
        let guard = self.conn.lock().map_err(|_| lock_err())?;
        let snapshot: Option<String> = guard
            .query_row(
                "SELECT snapshot FROM listings WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_err(&err))?;
        snapshot.map(|text| Self::decode_snapshot(&text)).transpose()
    }

    fn resolve(&self, handle: &str) -> Result<Option<ListingRecord>, StoreError> {
        let guard = self.conn.lock().map_err(|_| lock_err())?;
        let snapshot: Option<String> = guard
            .query_row(
                "SELECT snapshot FROM listings WHERE slug = ?1 OR id = ?1
                 ORDER BY CASE WHEN slug = ?1 THEN 0 ELSE 1 END LIMIT 1",
                params![handle],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_err(&err))?;
        snapshot.map(|text| Self::decode_snapshot(&text)).transpose()
    }

    fn save(&self, record: &ListingRecord) -> Result<(), StoreError> {
        let mut guard = self.conn.lock().map_err(|_| lock_err())?;
        let tx = guard.transaction().map_err(|err| db_err(&err))?;

        let stored_version: Option<u64> = tx
            .query_row(
                "SELECT version FROM listings WHERE id = ?1",
                params![record.id.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(|err| db_err(&err))?
            .map(|v| u64::try_from(v).unwrap_or(u64::MAX));
        if let Some(stored) = stored_version
            && record.version <= stored
        {
            return Err(StoreError::VersionConflict { attempted: record.version, stored });
        }

        let slug_owner: Option<String> = tx
            .query_row(
                "SELECT id FROM listings WHERE slug = ?1 AND id <> ?2",
                params![record.slug.as_str(), record.id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_err(&err))?;
        if slug_owner.is_some() {
            return Err(StoreError::SlugTaken { slug: record.slug.as_str().to_string() });
        }

        let snapshot = serde_json::to_string(record)
            .map_err(|err| StoreError::Corrupt(format!("listing encode: {err}")))?;
        let version = i64::try_from(record.version).unwrap_or(i64::MAX);
        tx.execute(
            "INSERT INTO listings (id, slug, version, snapshot)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (id) DO UPDATE
                 SET slug = excluded.slug,
                     version = excluded.version,
                     snapshot = excluded.snapshot",
            params![record.id.as_str(), record.slug.as_str(), version, snapshot],
        )
        .map_err(|err| db_err(&err))?;
        tx.commit().map_err(|err| db_err(&err))
    }

    fn remove(&self, id: &ListingId) -> Result<bool, StoreError> {
        let guard = self.conn.lock().map_err(|_| lock_err())?;
        let removed = guard
            .execute("DELETE FROM listings WHERE id = ?1", params![id.as_str()])
            .map_err(|err| db_err(&err))?;
        Ok(removed > 0)
    }
}

// ============================================================================
// SECTION: Session Store Impl
// ============================================================================

/// Builds a session from one `pin_sessions` row.
fn session_from_row(row: &rusqlite::Row<'_>) -> Result<PinSession, rusqlite::Error> {
    let listing_id: String = row.get(0)?;
    let session_id: String = row.get(1)?;
    let anon_id: Option<String> = row.get(2)?;
    let ip_hash: String = row.get(3)?;
    let created_at: i64 = row.get(4)?;
    let last_seen_at: i64 = row.get(5)?;
    Ok(PinSession {
        session_id: SessionId::new(session_id),
        listing_id: ListingId::new(listing_id),
        anon_id: anon_id.map(listing_gate_core::AnonId::new),
        ip_hash,
        created_at: Timestamp::from_unix_millis(created_at),
        last_seen_at: Timestamp::from_unix_millis(last_seen_at),
    })
}

impl SessionStore for SqliteStore {
    fn admit_within_cap(
        &self,
        session: &PinSession,
        cutoff: Timestamp,
        cap: u32,
    ) -> Result<bool, StoreError> {
        let mut guard = self.conn.lock().map_err(|_| lock_err())?;
        let tx = guard.transaction().map_err(|err| db_err(&err))?;

        tx.execute(
            "DELETE FROM pin_sessions WHERE listing_id = ?1 AND last_seen_at < ?2",
            params![session.listing_id.as_str(), cutoff.as_unix_millis()],
        )
        .map_err(|err| db_err(&err))?;

        let live: u64 = tx
            .query_row(
                "SELECT COUNT(*) FROM pin_sessions WHERE listing_id = ?1",
                params![session.listing_id.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|err| db_err(&err))
            .map(|v| u64::try_from(v).unwrap_or(0))?;
        if live >= u64::from(cap) {
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO pin_sessions
                 (listing_id, session_id, anon_id, ip_hash, created_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.listing_id.as_str(),
                session.session_id.as_str(),
                session.anon_id.as_ref().map(listing_gate_core::AnonId::as_str),
                session.ip_hash,
                session.created_at.as_unix_millis(),
                session.last_seen_at.as_unix_millis(),
            ],
        )
        .map_err(|err| db_err(&err))?;
        tx.commit().map_err(|err| db_err(&err))?;
        Ok(true)
    }

    fn get(
        &self,
        listing_id: &ListingId,
        session_id: &SessionId,
    ) -> Result<Option<PinSession>, StoreError> {
        let guard = self.conn.lock().map_err(|_| lock_err())?;
        guard
            .query_row(
                "SELECT listing_id, session_id, anon_id, ip_hash, created_at, last_seen_at
                 FROM pin_sessions WHERE listing_id = ?1 AND session_id = ?2",
                params![listing_id.as_str(), session_id.as_str()],
                session_from_row,
            )
            .optional()
            .map_err(|err| db_err(&err))
    }

    fn touch(
        &self,
        listing_id: &ListingId,
        session_id: &SessionId,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        let guard = self.conn.lock().map_err(|_| lock_err())?;
        let updated = guard
            .execute(
                "UPDATE pin_sessions SET last_seen_at = ?3
                 WHERE listing_id = ?1 AND session_id = ?2",
                params![listing_id.as_str(), session_id.as_str(), now.as_unix_millis()],
            )
            .map_err(|err| db_err(&err))?;
        Ok(updated > 0)
    }

    fn remove(
        &self,
        listing_id: &ListingId,
        session_id: &SessionId,
    ) -> Result<bool, StoreError> {
        let guard = self.conn.lock().map_err(|_| lock_err())?;
        let removed = guard
            .execute(
                "DELETE FROM pin_sessions WHERE listing_id = ?1 AND session_id = ?2",
                params![listing_id.as_str(), session_id.as_str()],
            )
            .map_err(|err| db_err(&err))?;
        Ok(removed > 0)
    }

    fn remove_all(&self, listing_id: &ListingId) -> Result<u64, StoreError> {
        let guard = self.conn.lock().map_err(|_| lock_err())?;
        let removed = guard
            .execute(
                "DELETE FROM pin_sessions WHERE listing_id = ?1",
                params![listing_id.as_str()],
            )
            .map_err(|err| db_err(&err))?;
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    fn list_live(
        &self,
        listing_id: &ListingId,
        cutoff: Timestamp,
    ) -> Result<Vec<PinSession>, StoreError> {
        let mut guard = self.conn.lock().map_err(|_| lock_err())?;
        let tx = guard.transaction().map_err(|err| db_err(&err))?;
        tx.execute(
            "DELETE FROM pin_sessions WHERE listing_id = ?1 AND last_seen_at < ?2",
            params![listing_id.as_str(), cutoff.as_unix_millis()],
        )
        .map_err(|err| db_err(&err))?;

        let sessions = {
            let mut stmt = tx
                .prepare(
                    "SELECT listing_id, session_id, anon_id, ip_hash, created_at, last_seen_at
                     FROM pin_sessions WHERE listing_id = ?1 ORDER BY created_at ASC",
                )
                .map_err(|err| db_err(&err))?;
            let rows = stmt
                .query_map(params![listing_id.as_str()], session_from_row)
                .map_err(|err| db_err(&err))?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row.map_err(|err| db_err(&err))?);
            }
            sessions
        };
        tx.commit().map_err(|err| db_err(&err))?;
        Ok(sessions)
    }
}
