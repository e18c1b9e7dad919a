//! Application configuration management.
//!
//! Settings are layered, lowest priority first:
//!
//! 1. built-in defaults ([`Config::default`])
//! 2. a TOML file (`--config PATH`, else `config.toml` in the platform
//!    config directory)
//! 3. `LOOKALIKE_*` environment variables
//! 4. command-line flags (applied by the caller after [`Config::load`])
//!
//! Call [`Config::validate`] after the last layer is applied.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::hashing::{HashAlgorithm, ParseAlgorithmError};

/// Cache file used when no path is configured, relative to the working directory.
pub const DEFAULT_CACHE_FILE: &str = ".lookalike-cache.sqlite3";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "LOOKALIKE_";

/// Smallest and largest accepted hash sizes.
pub const MIN_HASH_SIZE: u32 = 2;
pub const MAX_HASH_SIZE: u32 = 64;

/// Rejected configuration. Nothing runs until it is fixed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    UnknownAlgorithm(#[from] ParseAlgorithmError),

    #[error("Threshold must be between 0 and 100, got {0}")]
    InvalidThreshold(f64),

    #[error("Hash size must be between {MIN_HASH_SIZE} and {MAX_HASH_SIZE}, got {0}")]
    InvalidHashSize(u32),

    #[error("Size tolerance must be a non-negative number, got {0}")]
    InvalidTolerance(f64),

    #[error("Batch size must be greater than zero")]
    InvalidBatchSize,

    #[error("Configuration file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

/// Every knob the search engine and CLI read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hashing algorithm.
    pub algorithm: HashAlgorithm,
    /// Hash size N (fingerprints have N² bits).
    pub hash_size: u32,
    /// Minimum similarity percentage for a match.
    pub threshold: f64,
    /// Whether the file-size prefilter runs at all.
    pub size_filter: bool,
    /// Allowed relative size difference, in percent of the reference size.
    pub size_tolerance: f64,
    /// Candidates per hashing batch.
    pub batch_size: usize,
    /// Worker threads, 0 for one per available core.
    pub workers: usize,
    /// Use the persistent fingerprint cache.
    pub cache: bool,
    /// Cache database location; [`DEFAULT_CACHE_FILE`] when unset.
    pub cache_path: Option<PathBuf>,
    /// Use the persistent directory index.
    pub index: bool,
    /// Follow symbolic links while walking.
    pub follow_symlinks: bool,
    /// Skip hidden files and directories while walking.
    pub skip_hidden: bool,
    /// Extra gitignore-style patterns to skip.
    pub ignore_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Perceptual,
            hash_size: 16,
            threshold: 90.0,
            size_filter: true,
            size_tolerance: 50.0,
            batch_size: 500,
            workers: 0,
            cache: true,
            cache_path: None,
            index: true,
            follow_symlinks: false,
            skip_hidden: false,
            ignore_patterns: Vec::new(),
        }
    }
}

impl Config {
    /// Load defaults, then the config file, then the environment.
    ///
    /// An explicitly named file must exist; the platform default file is
    /// optional.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on a missing explicit file, malformed TOML,
    /// or a value of the wrong type.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match config_file {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::MissingFile(path.to_path_buf()));
                }
                log::debug!("Loading configuration from {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = Self::default_config_path().filter(|p| p.is_file()) {
                    log::debug!("Loading configuration from {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Platform config file location (`.../lookalike/config.toml`).
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "lookalike").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_search_params(
            self.threshold,
            self.hash_size,
            self.size_filter.then_some(self.size_tolerance),
            self.batch_size,
        )
    }

    /// Set the algorithm from a user-supplied name or alias.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownAlgorithm`] with a suggestion when
    /// the name is close to a known one.
    pub fn set_algorithm(&mut self, name: &str) -> Result<(), ConfigError> {
        self.algorithm = name.parse()?;
        Ok(())
    }

    /// Cache database path, falling back to [`DEFAULT_CACHE_FILE`].
    #[must_use]
    pub fn cache_file(&self) -> PathBuf {
        self.cache_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_FILE))
    }

    /// Render as TOML, as printed by `lookalike config`.
    ///
    /// # Errors
    ///
    /// Fails only if a value cannot be represented in TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Shared range checks for engine parameters.
pub(crate) fn check_search_params(
    threshold: f64,
    hash_size: u32,
    size_tolerance: Option<f64>,
    batch_size: usize,
) -> Result<(), ConfigError> {
    if !(0.0..=100.0).contains(&threshold) {
        return Err(ConfigError::InvalidThreshold(threshold));
    }
    if !(MIN_HASH_SIZE..=MAX_HASH_SIZE).contains(&hash_size) {
        return Err(ConfigError::InvalidHashSize(hash_size));
    }
    if let Some(tolerance) = size_tolerance {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ConfigError::InvalidTolerance(tolerance));
        }
    }
    if batch_size == 0 {
        return Err(ConfigError::InvalidBatchSize);
    }
    Ok(())
}
