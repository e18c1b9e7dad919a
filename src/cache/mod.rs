//! Persistent caches.
//!
//! Both caches live in one SQLite file managed by [`CacheStore`]:
//!
//! * [`HashCache`]: fingerprints keyed by (path, algorithm, hash size),
//!   valid only while the file's size and mtime are unchanged.
//! * [`DirectoryIndex`]: the image paths found by the last walk of a root.
//!
//! Neither is a source of truth. Callers treat every [`CacheError`] as a
//! reason to carry on without the cache.

pub mod database;
pub mod entry;
pub mod fingerprints;
pub mod index;

pub use database::{CacheError, CacheResult, CacheStats, CacheStore};
pub use entry::CacheEntry;
pub use fingerprints::HashCache;
pub use index::{DirectoryIndex, IndexedListing};
