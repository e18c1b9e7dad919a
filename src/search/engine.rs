//! Search orchestration.
//!
//! # Pipeline
//!
//! 1. Fingerprint the reference image (fatal on failure)
//! 2. Discover candidates from the directory index or a live walk
//! 3. Stat candidates in parallel and apply the size prefilter
//! 4. Resolve fingerprints from the cache
//! 5. Decode and hash cache misses batch by batch on a rayon pool,
//!    committing each finished batch to the cache in one transaction
//! 6. Score everything against the reference and rank the matches
//!
//! Individual candidate failures are recorded and never stop the run.
//! Cache and index failures switch the cache off for the rest of the run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use super::prefilter::SizePrefilter;
use super::results::{
    rank_matches, CandidateFailure, CandidateRecord, MatchResult, ReferenceImage, SearchOutcome,
    SearchStatistics,
};
use crate::cache::{CacheEntry, CacheError, CacheStore, DirectoryIndex, HashCache};
use crate::config::{check_search_params, Config, ConfigError};
use crate::hashing::{Fingerprint, HashAlgorithm};
use crate::progress::{ProgressCallback, PHASE_HASHING, PHASE_WALKING};
use crate::scanner::{FileEntry, ScanError, Walker, WalkerConfig};
use crate::similarity::SimilarityMetric;
use crate::source::{DecodeError, ImageSource, PixelSource};

/// Fatal search errors. Per-candidate problems never surface here.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The reference image does not exist.
    #[error("Reference image not found: {0}")]
    ReferenceNotFound(PathBuf),

    /// The reference image exists but cannot be decoded or hashed.
    #[error("Could not process reference image {path}: {source}")]
    ReferenceUnreadable {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    /// The search root does not exist.
    #[error("Search directory not found: {0}")]
    RootNotFound(PathBuf),

    /// The search root is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Invalid engine parameters.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The worker pool could not be started.
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(String),
}

/// Engine parameters.
///
/// Every value is explicit; the engine applies no defaults of its own
/// beyond [`SearchConfig::default`].
#[derive(Clone)]
pub struct SearchConfig {
    pub algorithm: HashAlgorithm,
    pub hash_size: u32,
    /// Minimum similarity percentage
    pub threshold: f64,
    /// Size tolerance percentage, `None` disables the prefilter
    pub size_tolerance: Option<f64>,
    pub batch_size: usize,
    /// Worker threads, 0 = auto
    pub workers: usize,
    /// Read and write the directory index
    pub use_index: bool,
    /// Ignore any stored listing and walk afresh
    pub refresh_index: bool,
    pub walker: WalkerConfig,
    /// Cache store, `None` disables both caches
    pub cache: Option<Arc<CacheStore>>,
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
    pub shutdown_flag: Option<Arc<AtomicBool>>,
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("algorithm", &self.algorithm)
            .field("hash_size", &self.hash_size)
            .field("threshold", &self.threshold)
            .field("size_tolerance", &self.size_tolerance)
            .field("batch_size", &self.batch_size)
            .field("workers", &self.workers)
            .field("use_index", &self.use_index)
            .field("refresh_index", &self.refresh_index)
            .field("walker", &self.walker)
            .field("cache", &self.cache.is_some())
            .field("progress_callback", &self.progress_callback.is_some())
            .field("shutdown_flag", &self.shutdown_flag.is_some())
            .finish()
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SearchConfig {
    fn from(config: &Config) -> Self {
        Self {
            algorithm: config.algorithm,
            hash_size: config.hash_size,
            threshold: config.threshold,
            size_tolerance: config.size_filter.then_some(config.size_tolerance),
            batch_size: config.batch_size,
            workers: config.workers,
            use_index: config.index,
            refresh_index: false,
            walker: WalkerConfig::new(
                config.follow_symlinks,
                config.skip_hidden,
                config.ignore_patterns.clone(),
            ),
            cache: None,
            progress_callback: None,
            shutdown_flag: None,
        }
    }
}

impl SearchConfig {
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn with_hash_size(mut self, hash_size: u32) -> Self {
        self.hash_size = hash_size;
        self
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_size_tolerance(mut self, tolerance: Option<f64>) -> Self {
        self.size_tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_index(mut self, use_index: bool, refresh: bool) -> Self {
        self.use_index = use_index;
        self.refresh_index = refresh;
        self
    }

    #[must_use]
    pub fn with_walker_config(mut self, walker: WalkerConfig) -> Self {
        self.walker = walker;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, store: Arc<CacheStore>) -> Self {
        self.cache = Some(store);
        self
    }

    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// # Errors
    ///
    /// Returns the first parameter out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_search_params(
            self.threshold,
            self.hash_size,
            self.size_tolerance,
            self.batch_size,
        )
    }
}

/// Caches for one run. Any cache error turns both off.
struct RunCaches {
    hashes: Option<HashCache>,
    index: Option<DirectoryIndex>,
    degraded: bool,
}

impl RunCaches {
    fn new(store: Option<&Arc<CacheStore>>, use_index: bool) -> Self {
        Self {
            hashes: store.map(|s| HashCache::new(Arc::clone(s))),
            index: store
                .filter(|_| use_index)
                .map(|s| DirectoryIndex::new(Arc::clone(s))),
            degraded: false,
        }
    }

    fn degrade(&mut self, context: &str, err: &CacheError) {
        log::warn!("Cache unavailable ({}): {}; continuing without cache", context, err);
        self.hashes = None;
        self.index = None;
        self.degraded = true;
    }
}

/// Outcome of hashing one candidate on a worker.
enum HashOutcome {
    Hashed(Fingerprint),
    Failed(String),
    Skipped,
}

/// Image similarity search engine.
pub struct SearchEngine {
    config: SearchConfig,
    source: Arc<dyn PixelSource>,
}

impl SearchEngine {
    /// Create an engine that decodes with [`ImageSource`].
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for out-of-range parameters.
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        Self::with_source(config, Arc::new(ImageSource::new()))
    }

    /// Create an engine with a custom pixel source.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for out-of-range parameters.
    pub fn with_source(
        config: SearchConfig,
        source: Arc<dyn PixelSource>,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(Self { config, source })
    }

    #[must_use]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Find images under `root` similar to `reference`.
    ///
    /// # Errors
    ///
    /// Only fatal input errors are returned: a missing or undecodable
    /// reference, a missing root, or a worker pool that cannot start.
    pub fn run(&self, reference: &Path, root: &Path) -> Result<SearchOutcome, SearchError> {
        let start_time = Instant::now();
        let mut stats = SearchStatistics::default();
        let mut failures = Vec::new();

        let (reference_path, reference_size) = resolve_reference(reference)?;
        let root = resolve_root(root)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| SearchError::ThreadPool(e.to_string()))?;

        log::info!(
            "Searching {} for images like {} ({}, N={}, threshold {}%, {} workers)",
            root.display(),
            reference_path.display(),
            self.config.algorithm,
            self.config.hash_size,
            self.config.threshold,
            pool.current_num_threads()
        );

        let fingerprint = self
            .hash_file(&reference_path)
            .map_err(|source| SearchError::ReferenceUnreadable {
                path: reference_path.clone(),
                source,
            })?;
        log::info!("Reference fingerprint: {}", fingerprint);
        let reference = ReferenceImage {
            path: reference_path,
            size: reference_size,
            fingerprint,
        };

        let mut caches = RunCaches::new(self.config.cache.as_ref(), self.config.use_index);

        // Discovery
        let (paths, walk_errors) = self.discover(&root, &mut caches);
        stats.walk_errors = walk_errors;
        let paths: Vec<PathBuf> = paths
            .into_iter()
            .filter(|p| !is_same_file(p, &reference.path))
            .collect();
        stats.found = paths.len();
        log::info!("{} candidate images found", stats.found);

        // Stat + prefilter
        let entries: Vec<Result<FileEntry, ScanError>> =
            pool.install(|| paths.into_par_iter().map(FileEntry::stat).collect());

        let prefilter = match self.config.size_tolerance {
            Some(tolerance) => SizePrefilter::new(reference.size, tolerance),
            None => SizePrefilter::disabled(),
        };
        let mut candidates = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                Ok(file) if prefilter.passes(file.size) => {
                    candidates.push(CandidateRecord::new(file.path, file.size, file.modified));
                }
                Ok(file) => {
                    log::trace!("Prefiltered by size ({}): {}", file.size, file.path.display());
                    stats.prefiltered += 1;
                }
                Err(e) => {
                    log::warn!("Skipping candidate: {}", e);
                    failures.push(scan_failure(e));
                }
            }
        }
        if let Some((min, max)) = prefilter.bounds() {
            log::info!(
                "Size filter {}..={} bytes: {} candidates, {} removed",
                min,
                max,
                candidates.len(),
                stats.prefiltered
            );
        }

        // Cache lookup
        let mut matches = Vec::new();
        let mut misses = Vec::new();
        for mut record in candidates {
            if let Some(cache) = caches.hashes.as_ref() {
                match cache.lookup(
                    &record.path,
                    record.size,
                    record.modified,
                    self.config.algorithm,
                    self.config.hash_size,
                ) {
                    Ok(Some(fp)) => {
                        log::trace!("Cache hit: {}", record.path.display());
                        record.fingerprint = Some(fp);
                        stats.cache_hits += 1;
                        self.score(&reference, record, &mut stats, &mut matches, &mut failures);
                        continue;
                    }
                    Ok(None) => {}
                    Err(e) => caches.degrade("lookup", &e),
                }
            }
            misses.push(record);
        }
        stats.cache_misses = misses.len();
        log::info!(
            "{} cache hits, {} images to hash",
            stats.cache_hits,
            stats.cache_misses
        );

        // Batched hashing
        let hashed = self.hash_misses(&pool, misses, &mut caches, &mut stats);
        for record in hashed {
            if let Some(reason) = record.error.clone() {
                failures.push(CandidateFailure {
                    path: record.path,
                    reason,
                });
            } else {
                self.score(&reference, record, &mut stats, &mut matches, &mut failures);
            }
        }

        rank_matches(&mut matches);
        failures.sort_by(|a, b| a.path.cmp(&b.path));

        stats.matched = matches.len();
        stats.failed = failures.len();
        stats.cache_degraded = caches.degraded;
        stats.interrupted = self.config.is_shutdown_requested();
        stats.elapsed = start_time.elapsed();

        if stats.interrupted {
            log::info!("Search interrupted, returning partial results");
        }
        log::info!(
            "Search complete: {} processed, {} failed, {} matched in {:.2}s",
            stats.processed,
            stats.failed,
            stats.matched,
            stats.elapsed.as_secs_f64()
        );

        Ok(SearchOutcome {
            reference,
            matches,
            failures,
            stats,
        })
    }

    /// Decode and fingerprint one file at the configured parameters.
    fn hash_file(&self, path: &Path) -> Result<Fingerprint, DecodeError> {
        let (width, height) = self.config.algorithm.grid_dimensions(self.config.hash_size);
        let grid = self.source.decode(path, width, height)?;
        self.config
            .algorithm
            .hash(&grid, self.config.hash_size)
            .map_err(|source| DecodeError::Grid {
                path: path.display().to_string(),
                source,
            })
    }

    /// Candidate paths under `root`, plus the number of walk errors.
    fn discover(&self, root: &Path, caches: &mut RunCaches) -> (Vec<PathBuf>, usize) {
        if !self.config.refresh_index {
            if let Some(index) = caches.index.as_ref() {
                match index.get(root, &self.config.walker) {
                    Ok(Some(listing)) => {
                        log::info!(
                            "Using directory index for {} ({} images, walked {})",
                            root.display(),
                            listing.paths.len(),
                            listing.walked_at
                        );
                        return (listing.paths, 0);
                    }
                    Ok(None) => {}
                    Err(e) => caches.degrade("index read", &e),
                }
            }
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(PHASE_WALKING, 0);
        }

        let mut walker = Walker::new(root, self.config.walker.clone());
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }
        let (files, errors) = walker.collect();
        let paths: Vec<PathBuf> = files.into_iter().map(|f| f.path).collect();

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(PHASE_WALKING);
        }

        // A listing cut short by shutdown must not replace a full one.
        if !self.config.is_shutdown_requested() {
            if let Some(index) = caches.index.as_ref() {
                if let Err(e) = index.put(root, &self.config.walker, &paths) {
                    caches.degrade("index write", &e);
                }
            }
        }

        (paths, errors.len())
    }

    /// Hash cache misses batch by batch, committing each batch to the cache.
    fn hash_misses(
        &self,
        pool: &rayon::ThreadPool,
        misses: Vec<CandidateRecord>,
        caches: &mut RunCaches,
        stats: &mut SearchStatistics,
    ) -> Vec<CandidateRecord> {
        if misses.is_empty() {
            return Vec::new();
        }

        let total = misses.len();
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(PHASE_HASHING, total);
        }

        let completed = AtomicUsize::new(0);
        let mut done = Vec::with_capacity(total);
        let mut pending = misses.into_iter().peekable();

        while pending.peek().is_some() {
            if self.config.is_shutdown_requested() {
                log::debug!("Shutdown requested, not dispatching further batches");
                break;
            }

            let batch: Vec<CandidateRecord> =
                pending.by_ref().take(self.config.batch_size).collect();
            log::debug!("Hashing batch of {} images", batch.len());

            let outcomes: Vec<(CandidateRecord, HashOutcome)> = pool.install(|| {
                batch
                    .into_par_iter()
                    .map(|record| {
                        if self.config.is_shutdown_requested() {
                            return (record, HashOutcome::Skipped);
                        }
                        let outcome = match self.hash_file(&record.path) {
                            Ok(fp) => HashOutcome::Hashed(fp),
                            Err(e) => {
                                log::warn!("Failed to hash {}: {}", record.path.display(), e);
                                HashOutcome::Failed(e.to_string())
                            }
                        };
                        let current = completed.fetch_add(1, Ordering::Relaxed) + 1;
                        if let Some(ref callback) = self.config.progress_callback {
                            callback.on_progress(current, &record.path.to_string_lossy());
                        }
                        (record, outcome)
                    })
                    .collect()
            });

            let mut entries = Vec::new();
            for (mut record, outcome) in outcomes {
                match outcome {
                    HashOutcome::Hashed(fp) => {
                        stats.decoded += 1;
                        entries.push(CacheEntry::new(
                            record.path.clone(),
                            record.size,
                            record.modified,
                            fp.clone(),
                        ));
                        record.fingerprint = Some(fp);
                        done.push(record);
                    }
                    HashOutcome::Failed(reason) => {
                        record.error = Some(reason);
                        done.push(record);
                    }
                    HashOutcome::Skipped => {}
                }
            }

            if let Some(cache) = caches.hashes.as_ref() {
                if let Err(e) = cache.store_batch(&entries) {
                    caches.degrade("store", &e);
                }
            }
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(PHASE_HASHING);
        }
        done
    }

    /// Compare one fingerprinted candidate against the reference.
    fn score(
        &self,
        reference: &ReferenceImage,
        record: CandidateRecord,
        stats: &mut SearchStatistics,
        matches: &mut Vec<MatchResult>,
        failures: &mut Vec<CandidateFailure>,
    ) {
        let Some(fp) = record.fingerprint.as_ref() else {
            return;
        };
        let metric = SimilarityMetric::new(self.config.threshold);
        match metric.score(&reference.fingerprint, fp) {
            Ok(score) => {
                stats.processed += 1;
                if metric.is_match(&score) {
                    log::debug!(
                        "Match {:.2}% (distance {}): {}",
                        score.similarity,
                        score.distance,
                        record.path.display()
                    );
                    matches.push(MatchResult {
                        path: record.path,
                        size: record.size,
                        similarity: score.similarity,
                        distance: score.distance,
                    });
                }
            }
            Err(e) => failures.push(CandidateFailure {
                path: record.path,
                reason: e.to_string(),
            }),
        }
    }
}

fn resolve_reference(path: &Path) -> Result<(PathBuf, u64), SearchError> {
    let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SearchError::ReferenceNotFound(path.to_path_buf()),
        _ => SearchError::ReferenceUnreadable {
            path: path.to_path_buf(),
            source: DecodeError::Io {
                path: path.display().to_string(),
                source: e,
            },
        },
    })?;
    if !meta.is_file() {
        return Err(SearchError::ReferenceUnreadable {
            path: path.to_path_buf(),
            source: DecodeError::Unsupported {
                path: path.display().to_string(),
                reason: "not a regular file".to_string(),
            },
        });
    }
    let canonical = canonical_or_original(path);
    Ok((canonical, meta.len()))
}

fn resolve_root(path: &Path) -> Result<PathBuf, SearchError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(canonical_or_original(path)),
        Ok(_) => Err(SearchError::NotADirectory(path.to_path_buf())),
        Err(_) => Err(SearchError::RootNotFound(path.to_path_buf())),
    }
}

fn canonical_or_original(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Whether `candidate` is the reference file (after resolving links).
fn is_same_file(candidate: &Path, reference: &Path) -> bool {
    if candidate == reference {
        return true;
    }
    if candidate.file_name() != reference.file_name() {
        return false;
    }
    std::fs::canonicalize(candidate).is_ok_and(|c| c == reference)
}

fn scan_failure(err: ScanError) -> CandidateFailure {
    let path = match &err {
        ScanError::PermissionDenied(p)
        | ScanError::NotFound(p)
        | ScanError::NotADirectory(p)
        | ScanError::NotAFile(p) => p.clone(),
        ScanError::Io { path, .. } => path.clone(),
    };
    CandidateFailure {
        path,
        reason: err.to_string(),
    }
}
