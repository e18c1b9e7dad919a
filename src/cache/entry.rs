//! Cache entry definitions and key helpers.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use unicode_normalization::UnicodeNormalization;

use crate::hashing::{Fingerprint, HashAlgorithm};

/// A fingerprint together with the file state it was computed from.
///
/// The entry stays valid only while the file's size and modification time
/// are unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Path of the hashed file
    pub path: PathBuf,
    /// File size in bytes at hashing time
    pub size: u64,
    /// Modification time at hashing time
    pub mtime: SystemTime,
    /// The computed fingerprint (carries algorithm and hash size)
    pub fingerprint: Fingerprint,
}

impl CacheEntry {
    #[must_use]
    pub fn new(path: PathBuf, size: u64, mtime: SystemTime, fingerprint: Fingerprint) -> Self {
        Self {
            path,
            size,
            mtime,
            fingerprint,
        }
    }

    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.fingerprint.algorithm()
    }

    #[must_use]
    pub fn hash_size(&self) -> u32 {
        self.fingerprint.hash_size()
    }
}

/// Key a path the same way regardless of the filesystem's Unicode form.
#[must_use]
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().nfc().collect()
}

/// Modification time as signed nanoseconds since the Unix epoch.
#[must_use]
pub fn mtime_to_nanos(mtime: SystemTime) -> i64 {
    match mtime.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_nanos())
            .map(|n| -n)
            .unwrap_or(i64::MIN),
    }
}

/// File size as a SQLite integer.
#[must_use]
pub fn size_to_sql(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}
