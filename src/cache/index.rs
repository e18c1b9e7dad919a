//! Persistent directory listings.
//!
//! An index row remembers which image files a walk of `root` found, and
//! under which walk options. It is only an optimization: rows whose
//! signature no longer matches their payload, whose JSON does not parse,
//! or that were walked with different options are reported as absent so
//! the caller falls back to a live walk.
//!
//! Listed paths are stored exactly as the walk produced them. Only the
//! root is normalized, since it is a lookup key.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::database::{CacheResult, CacheStore};
use super::entry::path_key;
use crate::scanner::{ScanError, Walker, WalkerConfig};

/// A stored listing for one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedListing {
    /// Root directory the listing was taken from
    pub root: PathBuf,
    /// Image paths in walk order
    pub paths: Vec<PathBuf>,
    /// When the walk happened
    pub walked_at: DateTime<Utc>,
}

/// Directory index backed by a [`CacheStore`].
#[derive(Debug, Clone)]
pub struct DirectoryIndex {
    store: Arc<CacheStore>,
}

impl DirectoryIndex {
    #[must_use]
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    /// Stored listing for `root`, if any, intact, and walked with `walk`.
    ///
    /// # Errors
    ///
    /// Propagates database errors. Corrupt or mismatched rows are not errors.
    pub fn get(&self, root: &Path, walk: &WalkerConfig) -> CacheResult<Option<IndexedListing>> {
        let row: Option<(String, String, String, String)> = {
            let conn = self.store.lock()?;
            conn.query_row(
                "SELECT paths, walk_options, signature, walked_at
                 FROM directory_index WHERE root = ?1",
                params![path_key(root)],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?
        };

        let Some((payload, options, signature, walked_at)) = row else {
            log::debug!("No directory index for {}", root.display());
            return Ok(None);
        };

        if signature_of(&options, &payload) != signature {
            log::warn!(
                "Directory index for {} failed its signature check, ignoring it",
                root.display()
            );
            return Ok(None);
        }

        if options != walk.digest(root) {
            log::debug!(
                "Directory index for {} was walked with other options, ignoring it",
                root.display()
            );
            return Ok(None);
        }

        let paths: Vec<PathBuf> = match serde_json::from_str::<Vec<String>>(&payload) {
            Ok(paths) => paths.into_iter().map(PathBuf::from).collect(),
            Err(e) => {
                log::warn!("Directory index for {} is unreadable: {}", root.display(), e);
                return Ok(None);
            }
        };
        let walked_at = DateTime::parse_from_rfc3339(&walked_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default();

        log::debug!(
            "Directory index hit for {} ({} paths, walked {})",
            root.display(),
            paths.len(),
            walked_at
        );
        Ok(Some(IndexedListing {
            root: root.to_path_buf(),
            paths,
            walked_at,
        }))
    }

    /// Replace the stored listing for `root`, walked with `walk`.
    ///
    /// A listing holding a path that is not valid UTF-8 cannot be stored
    /// faithfully. It is returned but not persisted, and any previous
    /// listing for `root` is dropped so later runs walk live.
    ///
    /// # Errors
    ///
    /// Propagates database and serialization errors.
    pub fn put(
        &self,
        root: &Path,
        walk: &WalkerConfig,
        paths: &[PathBuf],
    ) -> CacheResult<IndexedListing> {
        let listing = IndexedListing {
            root: root.to_path_buf(),
            paths: paths.to_vec(),
            walked_at: Utc::now(),
        };

        let Some(names) = paths.iter().map(|p| p.to_str()).collect::<Option<Vec<&str>>>() else {
            log::warn!(
                "Not indexing {}: it holds a file name that is not valid UTF-8",
                root.display()
            );
            self.remove(root)?;
            return Ok(listing);
        };
        let payload = serde_json::to_string(&names)?;
        let options = walk.digest(root);

        let conn = self.store.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO directory_index
                 (root, paths, path_count, walk_options, signature, walked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                path_key(root),
                payload,
                i64::try_from(names.len()).unwrap_or(i64::MAX),
                options,
                signature_of(&options, &payload),
                listing.walked_at.to_rfc3339(),
            ],
        )?;
        log::debug!("Indexed {} paths under {}", names.len(), root.display());

        Ok(listing)
    }

    /// Walk `walker`'s root afresh and persist the result.
    ///
    /// Walk errors are returned alongside the listing; they do not stop
    /// the rebuild. Returns `None` without touching the stored listing
    /// when the walk was cut short by the shutdown flag.
    ///
    /// # Errors
    ///
    /// Propagates database and serialization errors from persisting.
    pub fn rebuild(
        &self,
        walker: &Walker,
    ) -> CacheResult<Option<(IndexedListing, Vec<ScanError>)>> {
        let (files, errors) = walker.collect();
        if walker.is_shutdown_requested() {
            log::info!(
                "Walk of {} interrupted, keeping the previous listing",
                walker.root().display()
            );
            return Ok(None);
        }
        let paths: Vec<PathBuf> = files.into_iter().map(|f| f.path).collect();
        let listing = self.put(walker.root(), walker.config(), &paths)?;
        Ok(Some((listing, errors)))
    }

    /// Forget the listing for `root`. Returns whether a row existed.
    ///
    /// # Errors
    ///
    /// Propagates database errors.
    pub fn remove(&self, root: &Path) -> CacheResult<bool> {
        let conn = self.store.lock()?;
        let n = conn.execute(
            "DELETE FROM directory_index WHERE root = ?1",
            params![path_key(root)],
        )?;
        Ok(n > 0)
    }
}

fn signature_of(options: &str, payload: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(options.as_bytes());
    hasher.update(b"\n");
    hasher.update(payload.as_bytes());
    hasher.finalize().to_hex().to_string()
}
