//! Durable key-value storage for the pet snapshot and the chat credential.
//!
//! Two logical keys are stored:
//!
//! - [`PET_STATE_KEY`]: the JSON-encoded [`PetState`] plus a revision number
//! - [`API_KEY_KEY`]: the chat backend credential
//!
//! Snapshots are revisioned. A save only lands if its revision is newer than
//! the stored one; otherwise it is reported as [`SaveOutcome::Stale`]. That is
//! what keeps a save of pre-update data from overwriting a newer write made
//! by the settings page.
//!
//! The SQLite schema is a single table:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS kv (
//!     key        TEXT PRIMARY KEY,
//!     value      BLOB NOT NULL,
//!     revision   INTEGER NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     checksum   TEXT
//! );
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::error::{PetError, Result};
use crate::state::PetState;

/// Storage key of the pet snapshot.
pub const PET_STATE_KEY: &str = "petState";
/// Storage key of the chat credential.
pub const API_KEY_KEY: &str = "geminiApiKey";

/// A snapshot as it sits in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredState {
    /// The decoded pet.
    pub state: PetState,
    /// Revision the snapshot was written at.
    pub revision: u64,
}

/// Result of a snapshot save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The snapshot is now the stored one.
    Saved,
    /// A snapshot with an equal or newer revision was already stored.
    Stale {
        /// Revision currently in the store.
        stored_revision: u64,
    },
}

/// Backing store for the engine.
///
/// Implementations are synchronous: the engine saves after every mutation
/// from its single event loop.
pub trait PetStore {
    /// Load the stored snapshot, if any.
    ///
    /// # Errors
    /// Storage or decoding failures.
    fn load_state(&self) -> Result<Option<StoredState>>;

    /// Store `state` at `revision`, unless the store already holds an equal or newer revision.
    ///
    /// # Errors
    /// Storage or encoding failures.
    fn save_state(&self, state: &PetState, revision: u64) -> Result<SaveOutcome>;

    /// Load the chat credential, if any.
    ///
    /// # Errors
    /// Storage failures.
    fn load_api_key(&self) -> Result<Option<String>>;

    /// Store the chat credential, replacing any previous one.
    ///
    /// # Errors
    /// Storage failures.
    fn save_api_key(&self, key: &str) -> Result<()>;
}

impl<S: PetStore + ?Sized> PetStore for Arc<S> {
    fn load_state(&self) -> Result<Option<StoredState>> {
        (**self).load_state()
    }

    fn save_state(&self, state: &PetState, revision: u64) -> Result<SaveOutcome> {
        (**self).save_state(state, revision)
    }

    fn load_api_key(&self) -> Result<Option<String>> {
        (**self).load_api_key()
    }

    fn save_api_key(&self, key: &str) -> Result<()> {
        (**self).save_api_key(key)
    }
}

impl<S: PetStore + ?Sized> PetStore for &S {
    fn load_state(&self) -> Result<Option<StoredState>> {
        (**self).load_state()
    }

    fn save_state(&self, state: &PetState, revision: u64) -> Result<SaveOutcome> {
        (**self).save_state(state, revision)
    }

    fn load_api_key(&self) -> Result<Option<String>> {
        (**self).load_api_key()
    }

    fn save_api_key(&self, key: &str) -> Result<()> {
        (**self).save_api_key(key)
    }
}

// ---------------------------------------------------------------------------
// CRC-32 checksum helper
// ---------------------------------------------------------------------------

fn crc32_hex(data: &[u8]) -> String {
    format!("{:08x}", crc32_compute(data))
}

/// CRC-32 (ISO 3309 / ITU-T V.42), bitwise.
fn crc32_compute(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            if crc & 1 == 1 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv (
    key        TEXT PRIMARY KEY,
    value      BLOB NOT NULL,
    revision   INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    checksum   TEXT
);";

/// SQLite-backed [`PetStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) a database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PetError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;
        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "Pet store opened"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            config: config.clone(),
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`PetError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn checksum(&self, data: &[u8]) -> Option<String> {
        self.config.checksum_enabled.then(|| crc32_hex(data))
    }

    fn read(&self, key: &str) -> Result<Option<(Vec<u8>, u64)>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT value, revision, checksum FROM kv WHERE key = ?1")?;
        let row: Option<(Vec<u8>, i64, Option<String>)> = stmt
            .query_row(params![key], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .optional()?;

        let Some((data, revision, stored_checksum)) = row else {
            return Ok(None);
        };

        if self.config.checksum_enabled {
            if let Some(expected) = stored_checksum {
                let actual = crc32_hex(&data);
                if expected != actual {
                    warn!(
                        key,
                        expected = %expected,
                        actual = %actual,
                        "Checksum mismatch, possible save corruption"
                    );
                }
            }
        }

        Ok(Some((data, u64::try_from(revision).unwrap_or(0))))
    }

    fn stored_revision(conn: &Connection, key: &str) -> Result<u64> {
        let revision: Option<i64> = conn
            .query_row("SELECT revision FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(revision.and_then(|r| u64::try_from(r).ok()).unwrap_or(0))
    }
}

impl PetStore for SqliteStore {
    fn load_state(&self) -> Result<Option<StoredState>> {
        let start = Instant::now();
        let Some((data, revision)) = self.read(PET_STATE_KEY)? else {
            return Ok(None);
        };
        let state: PetState = serde_json::from_slice(&data)?;

        debug!(
            revision,
            elapsed_us = start.elapsed().as_micros(),
            "Loaded pet state"
        );
        Ok(Some(StoredState { state, revision }))
    }

    fn save_state(&self, state: &PetState, revision: u64) -> Result<SaveOutcome> {
        let start = Instant::now();
        let json = serde_json::to_vec(state)?;
        let checksum = self.checksum(&json);
        let now = Utc::now().to_rfc3339();
        let rev = i64::try_from(revision)
            .map_err(|_| PetError::Serialization(format!("revision {revision} out of range")))?;

        let conn = self.conn.lock();
        let changed = conn.execute(
            "INSERT INTO kv (key, value, revision, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                revision = excluded.revision,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum
             WHERE excluded.revision > kv.revision",
            params![PET_STATE_KEY, json, rev, now, checksum],
        )?;

        if changed == 0 {
            let stored_revision = Self::stored_revision(&conn, PET_STATE_KEY)?;
            return Ok(SaveOutcome::Stale { stored_revision });
        }

        debug!(
            revision,
            bytes = json.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Saved pet state"
        );
        Ok(SaveOutcome::Saved)
    }

    fn load_api_key(&self) -> Result<Option<String>> {
        let Some((data, _)) = self.read(API_KEY_KEY)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    fn save_api_key(&self, key: &str) -> Result<()> {
        let json = serde_json::to_vec(key)?;
        let checksum = self.checksum(&json);
        let now = Utc::now().to_rfc3339();

        self.conn.lock().execute(
            "INSERT INTO kv (key, value, revision, updated_at, checksum)
             VALUES (?1, ?2, 0, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum",
            params![API_KEY_KEY, json, now, checksum],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryInner {
    values: HashMap<&'static str, (Vec<u8>, u64)>,
    fail_writes: bool,
    writes: u64,
}

/// In-process [`PetStore`] with the same semantics as [`SqliteStore`].
///
/// Values are kept JSON-encoded so decoding behaves exactly as on disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with a raw JSON snapshot at the given revision.
    #[must_use]
    pub fn with_raw_state(json: &str, revision: u64) -> Self {
        let store = Self::new();
        store
            .inner
            .lock()
            .values
            .insert(PET_STATE_KEY, (json.as_bytes().to_vec(), revision));
        store
    }

    /// Make every subsequent write fail with an I/O error (or stop failing).
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.inner.lock().writes
    }

    fn write_guard(inner: &MemoryInner) -> Result<()> {
        if inner.fail_writes {
            return Err(PetError::Io(std::io::Error::other("store is read-only")));
        }
        Ok(())
    }
}

impl PetStore for MemoryStore {
    fn load_state(&self) -> Result<Option<StoredState>> {
        let inner = self.inner.lock();
        let Some((data, revision)) = inner.values.get(PET_STATE_KEY) else {
            return Ok(None);
        };
        Ok(Some(StoredState {
            state: serde_json::from_slice(data)?,
            revision: *revision,
        }))
    }

    fn save_state(&self, state: &PetState, revision: u64) -> Result<SaveOutcome> {
        let mut inner = self.inner.lock();
        Self::write_guard(&inner)?;
        if let Some((_, stored_revision)) = inner.values.get(PET_STATE_KEY) {
            if *stored_revision >= revision {
                return Ok(SaveOutcome::Stale {
                    stored_revision: *stored_revision,
                });
            }
        }
        let json = serde_json::to_vec(state)?;
        inner.values.insert(PET_STATE_KEY, (json, revision));
        inner.writes += 1;
        Ok(SaveOutcome::Saved)
    }

    fn load_api_key(&self) -> Result<Option<String>> {
        let inner = self.inner.lock();
        inner
            .values
            .get(API_KEY_KEY)
            .map(|(data, _)| serde_json::from_slice(data).map_err(PetError::from))
            .transpose()
    }

    fn save_api_key(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::write_guard(&inner)?;
        inner
            .values
            .insert(API_KEY_KEY, (serde_json::to_vec(key)?, 0));
        inner.writes += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
