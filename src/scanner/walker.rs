//! Directory walker implementation using jwalk for parallel traversal.
//!
//! # Overview
//!
//! [`Walker`] traverses a directory tree and yields every regular
//! file whose extension is a supported image format. It uses
//! [`jwalk`] to read directories in parallel on the rayon pool.
//!
//! - Sorted children, so the output order is deterministic
//! - Optional symlink following and hidden-file skipping
//! - Gitignore-style patterns via the `ignore` crate
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use lookalike::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Pictures"), WalkerConfig::default());
//! let (images, errors) = walker.collect();
//! println!("{} images, {} errors", images.len(), errors.len());
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;

use super::{FileEntry, ScanError, WalkerConfig};
use crate::source::is_image_path;

/// Directory walker for parallel image discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops yielding entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Root directory this walker scans.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Options this walker filters with.
    #[must_use]
    pub fn config(&self) -> &WalkerConfig {
        &self.config
    }

    /// Whether the shutdown flag has been raised.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build gitignore matcher from config patterns and .gitignore file.
    fn build_gitignore(&self) -> Option<Gitignore> {
        let mut builder = GitignoreBuilder::new(&self.root);

        let gitignore_path = self.root.join(".gitignore");
        if gitignore_path.exists() {
            if let Some(e) = builder.add(&gitignore_path) {
                log::warn!(
                    "Failed to load .gitignore from {}: {}",
                    gitignore_path.display(),
                    e
                );
            } else {
                log::debug!("Loaded .gitignore from {}", gitignore_path.display());
            }
        }

        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if gitignore.is_empty() => None,
            Ok(gitignore) => Some(gitignore),
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    /// Check a file against the ignore patterns, including patterns that
    /// match one of its parent directories.
    fn should_ignore(&self, path: &Path, gitignore: Option<&Gitignore>) -> bool {
        let Some(gi) = gitignore else {
            return false;
        };
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        gi.matched_path_or_any_parents(relative, false).is_ignore()
    }

    /// Walk the directory tree, yielding image file entries.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration. A missing or non-directory root yields a single error.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileEntry, ScanError>> + '_ {
        let gitignore = self.build_gitignore();
        let root_error = self.check_root().err();

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(self.config.skip_hidden)
            .process_read_dir(|_depth, _path, _read_dir_state, children| {
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        let entries = root_error
            .is_none()
            .then(|| walk_dir.into_iter())
            .into_iter()
            .flatten();

        root_error.map(Err).into_iter().chain(entries.filter_map(
            move |entry_result| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    return None;
                }

                match entry_result {
                    Ok(entry) => {
                        let path = entry.path();
                        let file_type = entry.file_type();

                        if path == self.root || file_type.is_dir() {
                            return None;
                        }
                        if !is_image_path(&path) {
                            return None;
                        }
                        if self.should_ignore(&path, gitignore.as_ref()) {
                            log::trace!("Ignoring file: {}", path.display());
                            return None;
                        }
                        if file_type.is_symlink() && !self.config.follow_symlinks {
                            log::trace!("Skipping symlink: {}", path.display());
                            return None;
                        }

                        self.process_file_entry(path)
                    }
                    Err(e) => {
                        let path = e
                            .path()
                            .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                        Some(Err(self.handle_jwalk_error(path, e)))
                    }
                }
            },
        ))
    }

    /// Walk the whole tree and return the images sorted by path, plus
    /// every error encountered along the way.
    #[must_use]
    pub fn collect(&self) -> (Vec<FileEntry>, Vec<ScanError>) {
        let mut files = Vec::new();
        let mut errors = Vec::new();
        for result in self.walk() {
            match result {
                Ok(file) => files.push(file),
                Err(e) => errors.push(e),
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        log::debug!(
            "Walked {}: {} images, {} errors",
            self.root.display(),
            files.len(),
            errors.len()
        );
        (files, errors)
    }

    fn check_root(&self) -> Result<(), ScanError> {
        match std::fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(ScanError::NotADirectory(self.root.clone())),
            Err(e) => Err(ScanError::from_io(self.root.clone(), e)),
        }
    }

    /// Stat a candidate and keep it if it is a regular file.
    fn process_file_entry(&self, path: PathBuf) -> Option<Result<FileEntry, ScanError>> {
        let metadata = if self.config.follow_symlinks {
            std::fs::metadata(&path)
        } else {
            std::fs::symlink_metadata(&path)
        };

        let metadata = match metadata {
            Ok(m) => m,
            Err(e) => return Some(Err(self.handle_io_error(&path, e))),
        };

        if !metadata.is_file() {
            return None;
        }

        let size = metadata.len();
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Some(Ok(FileEntry::new(path, size, modified)))
    }

    fn handle_io_error(&self, path: &Path, error: std::io::Error) -> ScanError {
        let err = ScanError::from_io(path.to_path_buf(), error);
        match &err {
            ScanError::NotFound(_) => {
                log::debug!("File not found (may have been deleted): {}", path.display());
            }
            other => log::warn!("{}", other),
        }
        err
    }

    fn handle_jwalk_error(&self, path: PathBuf, error: jwalk::Error) -> ScanError {
        log::warn!("Walker error for {}: {}", path.display(), error);
        match error.into_io_error() {
            Some(io) => ScanError::from_io(path, io),
            None => ScanError::Io {
                path,
                source: std::io::Error::other("directory walk failed"),
            },
        }
    }
}
