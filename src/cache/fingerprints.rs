//! Fingerprint cache keyed by path, algorithm and hash size.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use rusqlite::{params, OptionalExtension};

use super::database::{CacheResult, CacheStore};
use super::entry::{mtime_to_nanos, path_key, size_to_sql, CacheEntry};
use crate::hashing::{Fingerprint, HashAlgorithm};

/// Persistent map from (path, size, mtime, algorithm, N) to a fingerprint.
///
/// Cheap to clone; clones share the underlying [`CacheStore`].
#[derive(Debug, Clone)]
pub struct HashCache {
    store: Arc<CacheStore>,
}

impl HashCache {
    #[must_use]
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store_handle(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Look up a fingerprint for the file's current state.
    ///
    /// Returns `Ok(None)` when there is no row, or when the stored size or
    /// mtime differs from the values given (a stale row is never a hit).
    ///
    /// # Errors
    ///
    /// Propagates database errors.
    pub fn lookup(
        &self,
        path: &Path,
        size: u64,
        mtime: SystemTime,
        algorithm: HashAlgorithm,
        hash_size: u32,
    ) -> CacheResult<Option<Fingerprint>> {
        let key = path_key(path);
        let row: Option<(i64, i64, Vec<u8>)> = {
            let conn = self.store.lock()?;
            conn.query_row(
                "SELECT size, mtime_ns, bits FROM fingerprints
                 WHERE path = ?1 AND algorithm = ?2 AND hash_size = ?3",
                params![key, algorithm.name(), hash_size],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
        };

        let Some((stored_size, stored_mtime, bits)) = row else {
            return Ok(None);
        };
        if stored_size != size_to_sql(size) || stored_mtime != mtime_to_nanos(mtime) {
            log::trace!("Cache stale: {}", path.display());
            return Ok(None);
        }

        match Fingerprint::from_bytes(algorithm, hash_size, bits) {
            Ok(fp) => Ok(Some(fp)),
            Err(e) => {
                log::debug!("Ignoring malformed cache row for {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    /// Insert or overwrite one entry.
    ///
    /// # Errors
    ///
    /// Propagates database errors.
    pub fn store(&self, entry: &CacheEntry) -> CacheResult<()> {
        self.store_batch(std::slice::from_ref(entry)).map(|_| ())
    }

    /// Insert or overwrite many entries in a single transaction.
    ///
    /// Either every entry is committed or none is.
    ///
    /// # Errors
    ///
    /// Propagates database errors; the transaction is rolled back.
    pub fn store_batch(&self, entries: &[CacheEntry]) -> CacheResult<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        let now = mtime_to_nanos(SystemTime::now());
        let mut conn = self.store.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO fingerprints (path, algorithm, hash_size, size, mtime_ns, bits, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(path, algorithm, hash_size) DO UPDATE SET
                    size = excluded.size,
                    mtime_ns = excluded.mtime_ns,
                    bits = excluded.bits,
                    updated_at = excluded.updated_at",
            )?;
            for entry in entries {
                stmt.execute(params![
                    path_key(&entry.path),
                    entry.algorithm().name(),
                    entry.hash_size(),
                    size_to_sql(entry.size),
                    mtime_to_nanos(entry.mtime),
                    entry.fingerprint.as_bytes(),
                    now,
                ])?;
            }
        }
        tx.commit()?;
        log::trace!("Cached {} fingerprints", entries.len());
        Ok(entries.len())
    }

    /// Number of cached fingerprints across all parameter combinations.
    ///
    /// # Errors
    ///
    /// Propagates database errors.
    pub fn len(&self) -> CacheResult<usize> {
        Ok(self.store.stats()?.fingerprints)
    }

    /// Whether the cache holds no fingerprints.
    ///
    /// # Errors
    ///
    /// Propagates database errors.
    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }
}
