//! SQLite-backed cache store.
//!
//! One database file holds both the fingerprint table and the directory
//! index table. All access goes through a single mutex-guarded connection,
//! which serializes physical writes even when many workers produce
//! results.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

/// Bumped whenever the table layout changes; older stores are rebuilt.
const SCHEMA_VERSION: i64 = 2;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS fingerprints (
    path TEXT NOT NULL,
    algorithm TEXT NOT NULL,
    hash_size INTEGER NOT NULL,
    size INTEGER NOT NULL,
    mtime_ns INTEGER NOT NULL,
    bits BLOB NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (path, algorithm, hash_size)
);
CREATE INDEX IF NOT EXISTS idx_fingerprints_path ON fingerprints(path);
CREATE TABLE IF NOT EXISTS directory_index (
    root TEXT PRIMARY KEY,
    paths TEXT NOT NULL,
    path_count INTEGER NOT NULL,
    walk_options TEXT NOT NULL,
    signature TEXT NOT NULL,
    walked_at TEXT NOT NULL
);
";

/// Errors raised by the cache store.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// SQLite reported an error (includes "file is not a database").
    #[error("Cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Filesystem error around the database file.
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored directory listing could not be (de)serialized.
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another thread panicked while holding the connection.
    #[error("Cache connection lock poisoned")]
    Poisoned,
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Row counts and size of a cache store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Rows in the fingerprint table
    pub fingerprints: usize,
    /// Rows in the directory index table
    pub indexed_roots: usize,
    /// Size of the database file in bytes (0 for in-memory stores)
    pub file_size: u64,
}

/// Persistent store shared by [`super::HashCache`] and [`super::DirectoryIndex`].
pub struct CacheStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Open or create a store at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened, is not a SQLite database, or
    /// the schema cannot be created.
    pub fn open(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let journal: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        log::trace!("Cache journal mode: {}", journal);
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::init_schema(&conn)?;

        log::debug!("Opened cache store at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a throwaway store that lives only in memory.
    ///
    /// # Errors
    ///
    /// Fails only if SQLite cannot allocate the database.
    pub fn open_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    fn init_schema(conn: &Connection) -> CacheResult<()> {
        conn.execute_batch(SCHEMA)?;

        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match stored.as_deref().map(str::parse::<i64>) {
            Some(Ok(version)) if version == SCHEMA_VERSION => {}
            Some(_) => {
                log::warn!(
                    "Cache schema version {:?} does not match {}, rebuilding",
                    stored,
                    SCHEMA_VERSION
                );
                conn.execute_batch(
                    "DROP TABLE IF EXISTS fingerprints; DROP TABLE IF EXISTS directory_index;",
                )?;
                conn.execute_batch(SCHEMA)?;
                Self::write_version(conn)?;
            }
            None => Self::write_version(conn)?,
        }
        Ok(())
    }

    fn write_version(conn: &Connection) -> CacheResult<()> {
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )?;
        Ok(())
    }

    /// Location of the database file, `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn lock(&self) -> CacheResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }

    /// Row counts and file size.
    ///
    /// # Errors
    ///
    /// Propagates database errors.
    pub fn stats(&self) -> CacheResult<CacheStats> {
        let conn = self.lock()?;
        let fingerprints: i64 =
            conn.query_row("SELECT COUNT(*) FROM fingerprints", [], |row| row.get(0))?;
        let indexed_roots: i64 =
            conn.query_row("SELECT COUNT(*) FROM directory_index", [], |row| row.get(0))?;
        drop(conn);

        let file_size = self
            .path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map_or(0, |m| m.len());

        Ok(CacheStats {
            fingerprints: usize::try_from(fingerprints).unwrap_or(0),
            indexed_roots: usize::try_from(indexed_roots).unwrap_or(0),
            file_size,
        })
    }

    /// Delete every fingerprint and directory listing.
    ///
    /// # Errors
    ///
    /// Propagates database errors (e.g. a read-only file).
    pub fn clear(&self) -> CacheResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("DELETE FROM fingerprints; DELETE FROM directory_index;")?;
        log::info!("Cache cleared");
        Ok(())
    }

    /// Delete fingerprint rows whose file no longer exists.
    ///
    /// Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Propagates database errors.
    pub fn prune_missing(&self) -> CacheResult<usize> {
        let mut conn = self.lock()?;
        let paths: Vec<String> = {
            let mut stmt = conn.prepare("SELECT DISTINCT path FROM fingerprints")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };

        let missing: Vec<&String> = paths.iter().filter(|p| !Path::new(p).exists()).collect();
        if missing.is_empty() {
            return Ok(0);
        }

        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM fingerprints WHERE path = ?1")?;
            for path in &missing {
                removed += stmt.execute(params![path])?;
            }
        }
        tx.commit()?;
        log::info!("Pruned {} stale cache entries", removed);
        Ok(removed)
    }

    /// Flush and close the connection.
    ///
    /// # Errors
    ///
    /// Returns the SQLite error if the connection cannot be closed cleanly.
    pub fn close(self) -> CacheResult<()> {
        let conn = self.conn.into_inner().map_err(|_| CacheError::Poisoned)?;
        conn.close().map_err(|(_, e)| CacheError::Database(e))
    }
}
