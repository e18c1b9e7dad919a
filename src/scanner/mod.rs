//! Scanner module for image discovery.
//!
//! - [`walker`]: parallel directory traversal via jwalk, filtered to
//!   supported image extensions
//!
//! # Example
//!
//! ```no_run
//! use lookalike::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     skip_hidden: true,
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("."), config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod walker;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub use walker::Walker;

/// Metadata for a discovered image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
}

impl FileEntry {
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
        }
    }

    /// Stat `path` and build an entry from its current metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] if the file is gone or unreadable.
    pub fn stat(path: PathBuf) -> Result<Self, ScanError> {
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                Ok(Self::new(path, meta.len(), modified))
            }
            Ok(_) => Err(ScanError::NotAFile(path)),
            Err(e) => Err(ScanError::from_io(path, e)),
        }
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Glob patterns to ignore (gitignore-style), applied in addition to
    /// a `.gitignore` at the root.
    pub ignore_patterns: Vec<String>,
}

impl WalkerConfig {
    #[must_use]
    pub fn new(follow_symlinks: bool, skip_hidden: bool, ignore_patterns: Vec<String>) -> Self {
        Self {
            follow_symlinks,
            skip_hidden,
            ignore_patterns,
        }
    }

    /// Digest of everything that decides which files a walk of `root`
    /// yields: the options, the ignore patterns in order, and the bytes of
    /// `root/.gitignore` if there is one.
    ///
    /// Two walks with equal digests over an unchanged tree list the same
    /// files, so a stored listing is only reusable under the same digest.
    #[must_use]
    pub fn digest(&self, root: &Path) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[u8::from(self.follow_symlinks), u8::from(self.skip_hidden)]);
        for pattern in &self.ignore_patterns {
            hasher.update(&(pattern.len() as u64).to_le_bytes());
            hasher.update(pattern.as_bytes());
        }
        match std::fs::read(root.join(".gitignore")) {
            Ok(contents) => {
                hasher.update(b"gitignore");
                hasher.update(&contents);
            }
            Err(_) => {
                hasher.update(b"no-gitignore");
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The path exists but is not a regular file.
    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: PathBuf, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            _ => Self::Io {
                path,
                source: error,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walker_config_default() {
        let config = WalkerConfig::default();

        assert!(!config.follow_symlinks);
        assert!(!config.skip_hidden);
        assert!(config.ignore_patterns.is_empty());
    }

    #[test]
    fn test_walker_config_new() {
        let config = WalkerConfig::new(true, true, vec!["*.tmp".to_string()]);

        assert!(config.follow_symlinks);
        assert!(config.skip_hidden);
        assert_eq!(config.ignore_patterns, vec!["*.tmp".to_string()]);
    }

    #[test]
    fn test_digest_tracks_walk_options() {
        let dir = tempfile::tempdir().unwrap();
        let base = WalkerConfig::default().digest(dir.path());

        assert_eq!(base, WalkerConfig::default().digest(dir.path()));
        assert_ne!(base, WalkerConfig::new(true, false, Vec::new()).digest(dir.path()));
        assert_ne!(base, WalkerConfig::new(false, true, Vec::new()).digest(dir.path()));
        assert_ne!(
            base,
            WalkerConfig::new(false, false, vec!["*.gif".to_string()]).digest(dir.path())
        );
        assert_ne!(
            WalkerConfig::new(false, false, vec!["ab".to_string(), "c".to_string()])
                .digest(dir.path()),
            WalkerConfig::new(false, false, vec!["a".to_string(), "bc".to_string()])
                .digest(dir.path())
        );

        std::fs::write(dir.path().join(".gitignore"), "*.gif\n").unwrap();
        assert_ne!(base, WalkerConfig::default().digest(dir.path()));
    }

    #[test]
    fn test_scan_error_display() {
        let err = ScanError::PermissionDenied(PathBuf::from("/test"));
        assert_eq!(err.to_string(), "Permission denied: /test");

        let err = ScanError::NotFound(PathBuf::from("/missing"));
        assert_eq!(err.to_string(), "Path not found: /missing");

        let err = ScanError::NotADirectory(PathBuf::from("/file.txt"));
        assert_eq!(err.to_string(), "Not a directory: /file.txt");
    }

    #[test]
    fn test_scan_error_from_io() {
        let err = ScanError::from_io(
            PathBuf::from("/gone.png"),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(matches!(err, ScanError::NotFound(_)));
    }

    #[test]
    fn test_stat_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileEntry::stat(dir.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, ScanError::NotFound(_)));

        let err = FileEntry::stat(dir.path().to_path_buf()).unwrap_err();
        assert!(matches!(err, ScanError::NotAFile(_)));
    }

    #[test]
    fn test_stat_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, b"12345").unwrap();
        let entry = FileEntry::stat(path.clone()).unwrap();
        assert_eq!(entry.path, path);
        assert_eq!(entry.size, 5);
    }
}
