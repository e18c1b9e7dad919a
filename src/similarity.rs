//! Hamming distance and similarity scoring between fingerprints.
//!
//! Similarity is `100 * (1 - distance / total_bits)`, so identical
//! fingerprints score 100 and fully inverted ones score 0. Fingerprints
//! from different algorithms or hash sizes are never compared.

use crate::hashing::{Fingerprint, HashAlgorithm};

/// Result of comparing two fingerprints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// Number of differing bit positions.
    pub distance: u32,
    /// Similarity percentage in `[0, 100]`.
    pub similarity: f64,
}

/// Fingerprints that cannot be compared.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot compare {left_algorithm}/{left_size} fingerprint with {right_algorithm}/{right_size}")]
pub struct SimilarityError {
    pub left_algorithm: HashAlgorithm,
    pub left_size: u32,
    pub right_algorithm: HashAlgorithm,
    pub right_size: u32,
}

/// Count differing bits between two comparable fingerprints.
///
/// # Errors
///
/// Returns [`SimilarityError`] if the fingerprints come from different
/// algorithms or hash sizes.
pub fn hamming_distance(a: &Fingerprint, b: &Fingerprint) -> Result<u32, SimilarityError> {
    if !a.is_comparable(b) {
        return Err(SimilarityError {
            left_algorithm: a.algorithm(),
            left_size: a.hash_size(),
            right_algorithm: b.algorithm(),
            right_size: b.hash_size(),
        });
    }
    Ok(a.as_bytes()
        .iter()
        .zip(b.as_bytes())
        .map(|(x, y)| (x ^ y).count_ones())
        .sum())
}

/// Convert a Hamming distance over `total_bits` bits into a percentage.
#[must_use]
pub fn similarity_pct(distance: u32, total_bits: usize) -> f64 {
    if total_bits == 0 {
        return 100.0;
    }
    let ratio = f64::from(distance) / total_bits as f64;
    ((1.0 - ratio) * 100.0).clamp(0.0, 100.0)
}

/// Scores candidates against a threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityMetric {
    threshold: f64,
}

impl SimilarityMetric {
    /// Create a metric that accepts similarities `>= threshold` percent.
    ///
    /// The threshold is expected to be validated by the caller
    /// (see [`crate::config::Config::validate`]).
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Distance and similarity of `candidate` relative to `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`SimilarityError`] for incomparable fingerprints.
    pub fn score(
        &self,
        reference: &Fingerprint,
        candidate: &Fingerprint,
    ) -> Result<Score, SimilarityError> {
        let distance = hamming_distance(reference, candidate)?;
        Ok(Score {
            distance,
            similarity: similarity_pct(distance, reference.bit_len()),
        })
    }

    /// Whether a score clears the threshold.
    #[must_use]
    pub fn is_match(&self, score: &Score) -> bool {
        score.similarity >= self.threshold
    }
}
