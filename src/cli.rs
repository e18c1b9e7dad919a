//! Command-line interface definitions for lookalike.
//!
//! # Example
//!
//! ```bash
//! # Find images that look like photo.jpg under ~/Pictures
//! lookalike search photo.jpg ~/Pictures
//!
//! # Looser match with the difference hash, JSON for scripting
//! lookalike search photo.jpg ~/Pictures -a dhash -t 80 --output json
//!
//! # Walk the directory again instead of trusting the stored listing
//! lookalike search photo.jpg ~/Pictures --refresh-index
//!
//! # Cache maintenance
//! lookalike cache stats
//! lookalike cache prune
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{Config, ConfigError};

/// Find images that look like a reference image.
///
/// lookalike fingerprints every image under a directory with a perceptual
/// hash and lists the ones within a similarity threshold of the reference.
#[derive(Debug, Parser)]
#[command(name = "lookalike")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors and results
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (default: platform config dir, lookalike/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Search a directory for images similar to a reference image
    Search(SearchArgs),
    /// Inspect or maintain the fingerprint cache
    Cache(CacheArgs),
    /// Rebuild or drop the stored listing of a directory
    Index(IndexArgs),
    /// Print the effective configuration as TOML
    Config,
}

/// Arguments for `lookalike search`.
///
/// Every option left unset falls back to the loaded configuration.
#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Reference image
    #[arg(value_name = "REFERENCE")]
    pub reference: PathBuf,

    /// Directory to search
    #[arg(value_name = "DIRECTORY")]
    pub directory: PathBuf,

    /// Hash algorithm: average, perceptual, difference, wavelet
    /// (aliases ahash, phash, dhash, whash)
    #[arg(short, long, value_name = "NAME")]
    pub algorithm: Option<String>,

    /// Minimum similarity percentage (0-100)
    #[arg(short, long, value_name = "PCT", value_parser = parse_percentage)]
    pub threshold: Option<f64>,

    /// Hash size N; fingerprints have N² bits
    #[arg(long, value_name = "N")]
    pub hash_size: Option<u32>,

    /// Allowed file size difference from the reference, in percent
    #[arg(long, value_name = "PCT", value_parser = parse_percentage_unbounded)]
    pub size_tolerance: Option<f64>,

    /// Compare every image regardless of file size
    #[arg(long, conflicts_with = "size_tolerance")]
    pub no_size_filter: bool,

    /// Images per hashing batch
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Worker threads (0 = one per core)
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Path to the cache database
    #[arg(long, value_name = "PATH")]
    pub cache_db: Option<PathBuf>,

    /// Disable the fingerprint cache and directory index
    #[arg(long, conflicts_with = "cache_db")]
    pub no_cache: bool,

    /// Do not read or write the stored directory listing
    #[arg(long)]
    pub no_index: bool,

    /// Walk the directory even if a stored listing exists
    #[arg(long, conflicts_with = "no_index")]
    pub refresh_index: bool,

    /// Gitignore-style patterns to skip (repeatable)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Follow symbolic links while walking
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories
    #[arg(long)]
    pub skip_hidden: bool,

    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

impl SearchArgs {
    /// Layer the flags that were given on top of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownAlgorithm`] for a bad algorithm name.
    pub fn apply_to(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(ref name) = self.algorithm {
            config.set_algorithm(name)?;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(hash_size) = self.hash_size {
            config.hash_size = hash_size;
        }
        if let Some(tolerance) = self.size_tolerance {
            config.size_filter = true;
            config.size_tolerance = tolerance;
        }
        if self.no_size_filter {
            config.size_filter = false;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(ref path) = self.cache_db {
            config.cache = true;
            config.cache_path = Some(path.clone());
        }
        if self.no_cache {
            config.cache = false;
        }
        if self.no_index {
            config.index = false;
        }
        if self.follow_symlinks {
            config.follow_symlinks = true;
        }
        if self.skip_hidden {
            config.skip_hidden = true;
        }
        config
            .ignore_patterns
            .extend(self.ignore_patterns.iter().cloned());
        Ok(())
    }
}

/// Arguments for `lookalike cache`.
#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,

    /// Path to the cache database
    #[arg(long, value_name = "PATH", global = true)]
    pub cache_db: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum CacheAction {
    /// Show entry counts and file size
    Stats,
    /// Delete every fingerprint and stored listing
    Clear,
    /// Delete fingerprints of files that no longer exist
    Prune,
}

/// Arguments for `lookalike index`.
#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Directory whose listing to rebuild
    #[arg(value_name = "DIRECTORY")]
    pub directory: PathBuf,

    /// Drop the stored listing instead of rebuilding it
    #[arg(long)]
    pub remove: bool,

    /// Path to the cache database
    #[arg(long, value_name = "PATH")]
    pub cache_db: Option<PathBuf>,

    /// Gitignore-style patterns to skip (repeatable)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Follow symbolic links while walking
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories
    #[arg(long)]
    pub skip_hidden: bool,
}

/// Output format for search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable list
    Text,
    /// JSON document for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a percentage in `[0, 100]`, with or without a trailing `%`.
///
/// # Examples
///
/// ```
/// use lookalike::cli::parse_percentage;
///
/// assert_eq!(parse_percentage("90").unwrap(), 90.0);
/// assert_eq!(parse_percentage("87.5%").unwrap(), 87.5);
/// assert!(parse_percentage("101").is_err());
/// ```
///
/// # Errors
///
/// Returns an error for non-numbers and values outside the range.
pub fn parse_percentage(s: &str) -> Result<f64, String> {
    let value = parse_percentage_unbounded(s)?;
    if value > 100.0 {
        return Err(format!("Percentage must be at most 100, got {value}"));
    }
    Ok(value)
}

/// Like [`parse_percentage`] but allows values above 100.
///
/// # Errors
///
/// Returns an error for non-numbers, negatives and non-finite values.
pub fn parse_percentage_unbounded(s: &str) -> Result<f64, String> {
    let s = s.trim();
    let num_str = s.strip_suffix('%').unwrap_or(s).trim();
    if num_str.is_empty() {
        return Err("Percentage cannot be empty".to_string());
    }
    let value: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;
    if !value.is_finite() {
        return Err(format!("Invalid number: '{num_str}'"));
    }
    if value < 0.0 {
        return Err("Percentage cannot be negative".to_string());
    }
    Ok(value)
}
