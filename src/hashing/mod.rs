//! Perceptual hashing algorithms.
//!
//! Every algorithm maps a [`LumaGrid`] and a hash size `N` to an
//! `N²`-bit [`Fingerprint`]. The set of algorithms is closed and selected
//! at runtime through [`HashAlgorithm`]:
//!
//! - [`HashAlgorithm::Average`]: mean threshold over an `N x N` grid
//! - [`HashAlgorithm::Perceptual`]: median threshold over low DCT frequencies
//! - [`HashAlgorithm::Difference`]: horizontal gradient signs
//! - [`HashAlgorithm::Wavelet`]: median threshold over the Haar LL band
//!
//! # Example
//!
//! ```
//! use lookalike::hashing::{HashAlgorithm, LumaGrid};
//!
//! let grid = LumaGrid::from_fn(64, 64, |x, y| ((x * y) % 17) as f32 / 16.0);
//! let fp = HashAlgorithm::Perceptual.hash(&grid, 8).unwrap();
//! assert_eq!(fp.bit_len(), 64);
//! ```

mod dct;
pub mod fingerprint;
pub mod grid;
mod wavelet;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use fingerprint::Fingerprint;
pub use grid::{median, LumaGrid};

/// Scale factor between the hash size and the DCT working grid.
const DCT_OVERSAMPLE: usize = 4;

/// Scale factor between the LL band and the wavelet working grid (three Haar levels).
const WAVELET_OVERSAMPLE: usize = 8;

/// Supported perceptual hashing algorithms.
///
/// Serialized by [`HashAlgorithm::name`]; deserialized through [`FromStr`],
/// so configuration files accept the same aliases as the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "&'static str")]
pub enum HashAlgorithm {
    /// aHash - mean-based, fast, best for exact or near-exact duplicates.
    Average,
    /// pHash - DCT-based, robust to resizing, recompression and colour shifts.
    #[default]
    Perceptual,
    /// dHash - gradient-based, cheap and moderately robust.
    Difference,
    /// wHash - Haar wavelet based, most robust and most expensive.
    Wavelet,
}

impl HashAlgorithm {
    /// All algorithms, in a stable order.
    pub const ALL: [HashAlgorithm; 4] = [
        HashAlgorithm::Average,
        HashAlgorithm::Perceptual,
        HashAlgorithm::Difference,
        HashAlgorithm::Wavelet,
    ];

    /// Stable identifier, used for display, configuration and cache keys.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::Perceptual => "perceptual",
            Self::Difference => "difference",
            Self::Wavelet => "wavelet",
        }
    }

    /// Working grid `(width, height)` this algorithm samples for hash size `n`.
    ///
    /// Pixel sources should decode straight to this size so that
    /// [`HashAlgorithm::hash`] does not need to resample again.
    #[must_use]
    pub fn grid_dimensions(self, hash_size: u32) -> (usize, usize) {
        let n = hash_size as usize;
        match self {
            Self::Average => (n, n),
            Self::Perceptual => (n * DCT_OVERSAMPLE, n * DCT_OVERSAMPLE),
            Self::Difference => (n + 1, n),
            Self::Wavelet => {
                let side = n.next_power_of_two() * WAVELET_OVERSAMPLE;
                (side, side)
            }
        }
    }

    /// Compute the fingerprint of `grid` at hash size `hash_size`.
    ///
    /// Grids of any size are accepted; they are resampled to
    /// [`HashAlgorithm::grid_dimensions`] first when needed.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::InvalidHashSize`] when `hash_size` is zero.
    pub fn hash(self, grid: &LumaGrid, hash_size: u32) -> Result<Fingerprint, HashError> {
        if hash_size == 0 {
            return Err(HashError::InvalidHashSize(hash_size));
        }
        let (width, height) = self.grid_dimensions(hash_size);
        let working = grid.resample(width, height);
        let n = hash_size as usize;

        match self {
            Self::Average => average_hash(&working, hash_size),
            Self::Perceptual => perceptual_hash(&working, n, hash_size),
            Self::Difference => difference_hash(&working, n, hash_size),
            Self::Wavelet => wavelet_hash(working, n, hash_size),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ParseAlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "average" | "ahash" => Ok(Self::Average),
            "perceptual" | "phash" => Ok(Self::Perceptual),
            "difference" | "dhash" => Ok(Self::Difference),
            "wavelet" | "whash" => Ok(Self::Wavelet),
            _ => Err(ParseAlgorithmError {
                name: s.to_string(),
                suggestion: suggest_algorithm(&lowered),
            }),
        }
    }
}

impl TryFrom<String> for HashAlgorithm {
    type Error = ParseAlgorithmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HashAlgorithm> for &'static str {
    fn from(alg: HashAlgorithm) -> Self {
        alg.name()
    }
}

/// Closest algorithm name for a misspelled one, if any is close enough.
fn suggest_algorithm(input: &str) -> Option<&'static str> {
    HashAlgorithm::ALL
        .iter()
        .map(|alg| (alg.name(), strsim::jaro_winkler(input, alg.name())))
        .filter(|(_, score)| *score >= 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(name, _)| name)
}

/// An algorithm name that is not one of the four supported variants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown hash algorithm '{name}'{}", .suggestion.map(|s| format!(" (did you mean '{s}'?)")).unwrap_or_default())]
pub struct ParseAlgorithmError {
    /// The rejected input.
    pub name: String,
    /// Closest valid name, if any.
    pub suggestion: Option<&'static str>,
}

/// Errors produced while computing or rebuilding fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    /// Hash size must be at least 1.
    #[error("Invalid hash size: {0}")]
    InvalidHashSize(u32),

    /// A grid was built with a zero dimension.
    #[error("Sample grid is empty")]
    EmptyGrid,

    /// A grid was built from the wrong number of samples.
    #[error("Sample grid expected {expected} samples, got {actual}")]
    GridSizeMismatch {
        /// width * height
        expected: usize,
        /// samples supplied
        actual: usize,
    },

    /// A fingerprint was built from the wrong number of bits.
    #[error("Fingerprint expected {expected} bits, got {actual}")]
    BitCount {
        /// hash_size²
        expected: usize,
        /// bits supplied
        actual: usize,
    },

    /// Malformed hex fingerprint.
    #[error("Invalid fingerprint hex: {0}")]
    InvalidHex(String),
}

fn average_hash(grid: &LumaGrid, hash_size: u32) -> Result<Fingerprint, HashError> {
    let mean = grid.mean();
    Fingerprint::from_bits(
        HashAlgorithm::Average,
        hash_size,
        grid.samples().iter().map(|&s| s >= mean),
    )
}

fn perceptual_hash(grid: &LumaGrid, n: usize, hash_size: u32) -> Result<Fingerprint, HashError> {
    let coeffs: Vec<f32> = dct::dct_2d_low(grid.samples(), grid.width(), n)
        .into_iter()
        .map(|c| c as f32)
        .collect();
    // DC carries overall brightness only; it sits out of the median and its bit stays 0.
    let med = median(&coeffs[1..]);
    Fingerprint::from_bits(
        HashAlgorithm::Perceptual,
        hash_size,
        coeffs
            .iter()
            .enumerate()
            .map(|(i, &c)| i != 0 && c > med),
    )
}

fn difference_hash(grid: &LumaGrid, n: usize, hash_size: u32) -> Result<Fingerprint, HashError> {
    let bits = (0..n).flat_map(|y| (0..n).map(move |x| grid.get(x, y) < grid.get(x + 1, y)));
    Fingerprint::from_bits(HashAlgorithm::Difference, hash_size, bits)
}

fn wavelet_hash(grid: LumaGrid, n: usize, hash_size: u32) -> Result<Fingerprint, HashError> {
    let side = grid.width();
    let band = n.next_power_of_two();
    let levels = (side / band).trailing_zeros();
    let ll = wavelet::haar_ll_band(grid.into_samples(), side, levels);

    let ll = if band == n {
        ll
    } else {
        LumaGrid::new(band, band, ll)?.resample(n, n).into_samples()
    };

    let med = median(&ll);
    Fingerprint::from_bits(
        HashAlgorithm::Wavelet,
        hash_size,
        ll.iter().map(|&c| c > med),
    )
}
