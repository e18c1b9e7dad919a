//! JSON report for scripts and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "reference": {
//!     "path": "/photos/ref.jpg",
//!     "size": 182044,
//!     "algorithm": "perceptual",
//!     "hash_size": 16,
//!     "fingerprint": "0f3c..."
//!   },
//!   "matches": [
//!     {
//!       "reference": "/photos/ref.jpg",
//!       "candidate": "/photos/copy.jpg",
//!       "similarity_pct": 100.0,
//!       "distance": 0,
//!       "file_size": 182044
//!     }
//!   ],
//!   "failures": [
//!     { "path": "/photos/broken.jpg", "reason": "..." }
//!   ],
//!   "stats": {
//!     "found": 120,
//!     "processed": 80,
//!     "failed": 1,
//!     "matched": 1,
//!     "elapsed": 0.84,
//!     "exit_code": 3,
//!     "exit_code_name": "LK003"
//!   }
//! }
//! ```
//!
//! `stats` carries every [`SearchStatistics`] counter; the sample above
//! is abridged.

use std::io::Write;

use serde::Serialize;

use crate::error::ExitCode;
use crate::search::{SearchOutcome, SearchStatistics};

#[derive(Debug, Clone, Serialize)]
pub struct JsonReference {
    pub path: String,
    pub size: u64,
    pub algorithm: &'static str,
    pub hash_size: u32,
    /// Fingerprint as lowercase hex
    pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonMatch {
    pub reference: String,
    pub candidate: String,
    pub similarity_pct: f64,
    pub distance: u32,
    pub file_size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonFailure {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonStats {
    #[serde(flatten)]
    pub counters: SearchStatistics,
    /// Scored images per second
    pub throughput: f64,
    pub exit_code: i32,
    /// Machine-readable exit code, e.g. "LK000"
    pub exit_code_name: String,
}

/// Complete JSON document.
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport {
    pub reference: JsonReference,
    pub matches: Vec<JsonMatch>,
    pub failures: Vec<JsonFailure>,
    pub stats: JsonStats,
}

impl JsonReport {
    #[must_use]
    pub fn new(outcome: &SearchOutcome, exit_code: ExitCode) -> Self {
        let reference_path = outcome.reference.path.to_string_lossy().into_owned();
        Self {
            reference: JsonReference {
                path: reference_path.clone(),
                size: outcome.reference.size,
                algorithm: outcome.reference.algorithm().name(),
                hash_size: outcome.reference.hash_size(),
                fingerprint: outcome.reference.fingerprint.to_hex(),
            },
            matches: outcome
                .matches
                .iter()
                .map(|m| JsonMatch {
                    reference: reference_path.clone(),
                    candidate: m.path.to_string_lossy().into_owned(),
                    similarity_pct: round2(m.similarity),
                    distance: m.distance,
                    file_size: m.size,
                })
                .collect(),
            failures: outcome
                .failures
                .iter()
                .map(|f| JsonFailure {
                    path: f.path.to_string_lossy().into_owned(),
                    reason: f.reason.clone(),
                })
                .collect(),
            stats: JsonStats {
                counters: outcome.stats.clone(),
                throughput: round2(outcome.stats.throughput()),
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix().to_string(),
            },
        }
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error during JSON output: {0}")]
    Io(#[from] std::io::Error),
}
