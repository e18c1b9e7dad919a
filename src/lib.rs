//! lookalike - find images that look like a reference image.
//!
//! Every image under a directory is reduced to a perceptual fingerprint
//! (average, perceptual, difference or wavelet hash) and compared with the
//! reference by Hamming distance. Fingerprints and directory listings are
//! kept in a SQLite cache so repeated searches skip decoding and walking.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod hashing;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod search;
pub mod signal;
pub mod similarity;
pub mod source;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use bytesize::ByteSize;

use crate::cache::{CacheStore, DirectoryIndex};
use crate::cli::{CacheAction, CacheArgs, Cli, Commands, IndexArgs, OutputFormat, SearchArgs};
use crate::config::Config;
use crate::error::ExitCode;
use crate::output::{JsonReport, TextReport};
use crate::progress::Progress;
use crate::scanner::{Walker, WalkerConfig};
use crate::search::{SearchConfig, SearchEngine};

/// Run one CLI invocation and return the exit code.
///
/// # Errors
///
/// Returns fatal errors: invalid configuration, a missing or unreadable
/// reference or directory, or an unusable cache for maintenance commands.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Search(ref args) => run_search(args, config, cli.quiet),
        Commands::Cache(ref args) => run_cache(args, &config),
        Commands::Index(ref args) => run_index(args, config),
        Commands::Config => {
            let text = config.to_toml().context("Failed to render configuration")?;
            print!("{}", text);
            Ok(ExitCode::Success)
        }
    }
}

fn run_search(args: &SearchArgs, mut config: Config, quiet: bool) -> anyhow::Result<ExitCode> {
    args.apply_to(&mut config)?;
    config.validate()?;
    log::debug!("Effective configuration: {:?}", config);

    let handler = signal::install_handler()?;
    let mut search_config = SearchConfig::from(&config)
        .with_index(config.index, args.refresh_index)
        .with_shutdown_flag(handler.get_flag());

    let mut cache_unavailable = false;
    if config.cache {
        let path = config.cache_file();
        match CacheStore::open(&path) {
            Ok(store) => search_config = search_config.with_cache(Arc::new(store)),
            Err(e) => {
                log::warn!(
                    "Cache {} unavailable: {}; continuing without cache",
                    path.display(),
                    e
                );
                cache_unavailable = true;
            }
        }
    }

    if !quiet && !args.no_progress {
        search_config = search_config.with_progress_callback(Arc::new(Progress::new(false)));
    }

    let engine = SearchEngine::new(search_config)?;
    let mut outcome = engine.run(&args.reference, &args.directory)?;
    outcome.stats.cache_degraded |= cache_unavailable;

    let exit_code = ExitCode::from_outcome(&outcome);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.output {
        OutputFormat::Json => JsonReport::new(&outcome, exit_code).write_to(&mut out, true)?,
        OutputFormat::Text => TextReport::new(&outcome)
            .with_failures(!quiet)
            .write_to(&mut out)?,
    }
    out.flush()?;

    Ok(exit_code)
}

fn open_existing_store(path: &Path) -> anyhow::Result<Option<CacheStore>> {
    if !path.exists() {
        return Ok(None);
    }
    let store = CacheStore::open(path)
        .with_context(|| format!("Failed to open cache {}", path.display()))?;
    Ok(Some(store))
}

fn run_cache(args: &CacheArgs, config: &Config) -> anyhow::Result<ExitCode> {
    let path = args.cache_db.clone().unwrap_or_else(|| config.cache_file());
    let Some(store) = open_existing_store(&path)? else {
        println!("No cache at {}", path.display());
        return Ok(ExitCode::Success);
    };

    match args.action {
        CacheAction::Stats => {
            let stats = store.stats()?;
            println!("Cache:        {}", path.display());
            println!("Fingerprints: {}", stats.fingerprints);
            println!("Indexed dirs: {}", stats.indexed_roots);
            println!("File size:    {}", ByteSize::b(stats.file_size));
        }
        CacheAction::Clear => {
            store.clear()?;
            println!("Cleared {}", path.display());
        }
        CacheAction::Prune => {
            let removed = store.prune_missing()?;
            println!("Removed {} stale fingerprint(s)", removed);
        }
    }
    store.close()?;
    Ok(ExitCode::Success)
}

fn run_index(args: &IndexArgs, mut config: Config) -> anyhow::Result<ExitCode> {
    if let Some(ref path) = args.cache_db {
        config.cache_path = Some(path.clone());
    }
    config.follow_symlinks |= args.follow_symlinks;
    config.skip_hidden |= args.skip_hidden;
    config
        .ignore_patterns
        .extend(args.ignore_patterns.iter().cloned());

    let root = std::fs::canonicalize(&args.directory)
        .with_context(|| format!("Search directory not found: {}", args.directory.display()))?;
    if !root.is_dir() {
        anyhow::bail!("Not a directory: {}", root.display());
    }

    let cache_path = config.cache_file();
    let store = Arc::new(
        CacheStore::open(&cache_path)
            .with_context(|| format!("Failed to open cache {}", cache_path.display()))?,
    );
    let index = DirectoryIndex::new(Arc::clone(&store));

    if args.remove {
        if index.remove(&root)? {
            println!("Removed listing for {}", root.display());
        } else {
            println!("No listing stored for {}", root.display());
        }
        return Ok(ExitCode::Success);
    }

    let handler = signal::install_handler()?;
    let walker = Walker::new(
        &root,
        WalkerConfig::new(
            config.follow_symlinks,
            config.skip_hidden,
            config.ignore_patterns.clone(),
        ),
    )
    .with_shutdown_flag(handler.get_flag());

    let Some((listing, errors)) = index.rebuild(&walker)? else {
        return Ok(ExitCode::Interrupted);
    };

    for err in &errors {
        log::warn!("{}", err);
    }
    println!(
        "Indexed {} image(s) under {}",
        listing.paths.len(),
        root.display()
    );
    if errors.is_empty() {
        Ok(ExitCode::Success)
    } else {
        Ok(ExitCode::PartialSuccess)
    }
}
