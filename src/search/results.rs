//! Search results and statistics.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::hashing::{Fingerprint, HashAlgorithm};

/// The baseline every candidate is scored against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    /// Canonical path of the reference file
    pub path: PathBuf,
    /// Size on disk in bytes
    pub size: u64,
    /// Fingerprint computed with the configured algorithm and size
    pub fingerprint: Fingerprint,
}

impl ReferenceImage {
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.fingerprint.algorithm()
    }

    #[must_use]
    pub fn hash_size(&self) -> u32 {
        self.fingerprint.hash_size()
    }
}

/// One candidate file as it moves through the pipeline.
///
/// The fingerprint is attached exactly once, either from the cache or
/// after hashing.
#[derive(Debug, Clone)]
pub struct CandidateRecord {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
    pub fingerprint: Option<Fingerprint>,
    pub error: Option<String>,
}

impl CandidateRecord {
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
            fingerprint: None,
            error: None,
        }
    }
}

/// A candidate at or above the similarity threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub path: PathBuf,
    pub size: u64,
    pub similarity: f64,
    pub distance: u32,
}

impl MatchResult {
    /// Ranking order: descending similarity, then ascending path.
    #[must_use]
    pub fn rank(&self, other: &Self) -> Ordering {
        other
            .similarity
            .total_cmp(&self.similarity)
            .then_with(|| self.path.cmp(&other.path))
    }
}

/// A candidate that could not be read, decoded or hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Counters accumulated over one search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchStatistics {
    /// Image files discovered (reference excluded)
    pub found: usize,
    /// Candidates removed by the size prefilter
    pub prefiltered: usize,
    /// Candidates answered from the fingerprint cache
    pub cache_hits: usize,
    /// Candidates that needed decoding
    pub cache_misses: usize,
    /// Successful decode+hash operations
    pub decoded: usize,
    /// Candidates with a fingerprint that were scored
    pub processed: usize,
    /// Candidates that failed to stat, decode or hash
    pub failed: usize,
    /// Candidates at or above the threshold
    pub matched: usize,
    /// Errors met while walking the directory tree
    pub walk_errors: usize,
    /// Wall-clock time of the whole search
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// The search stopped early on request
    pub interrupted: bool,
    /// The cache failed during the run and was switched off
    pub cache_degraded: bool,
}

impl SearchStatistics {
    /// Scored candidates per second.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        self.processed as f64 / self.elapsed.as_secs_f64().max(0.001)
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Everything a search returns.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub reference: ReferenceImage,
    /// Matches in rank order
    pub matches: Vec<MatchResult>,
    /// Per-candidate failures, sorted by path
    pub failures: Vec<CandidateFailure>,
    pub stats: SearchStatistics,
}

impl SearchOutcome {
    /// Whether the run finished with some per-candidate failures.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.stats.failed > 0 || self.stats.walk_errors > 0
    }
}

/// Sort matches into rank order.
pub fn rank_matches(matches: &mut [MatchResult]) {
    matches.sort_by(MatchResult::rank);
}
