//! Exit codes and structured error reporting.

use serde::Serialize;

use crate::search::SearchOutcome;

/// Process exit codes.
///
/// - 0: at least one match
/// - 1: fatal error (bad input, bad configuration, unexpected failure)
/// - 2: search completed, nothing matched
/// - 3: matches found but some candidates could not be processed
/// - 130: interrupted by Ctrl+C
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NoMatches = 2,
    PartialSuccess = 3,
    Interrupted = 130,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "LK000",
            Self::GeneralError => "LK001",
            Self::NoMatches => "LK002",
            Self::PartialSuccess => "LK003",
            Self::Interrupted => "LK130",
        }
    }

    /// Exit code for a finished search.
    ///
    /// Interruption wins over everything, then an empty match list;
    /// candidate failures only downgrade a successful run.
    #[must_use]
    pub fn from_outcome(outcome: &SearchOutcome) -> Self {
        if outcome.stats.interrupted {
            Self::Interrupted
        } else if outcome.matches.is_empty() {
            Self::NoMatches
        } else if outcome.is_partial() {
            Self::PartialSuccess
        } else {
            Self::Success
        }
    }
}

/// Fatal error rendered as JSON for `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// Code prefix, e.g. "LK001"
    pub code: String,
    pub exit_code: i32,
    pub message: String,
    pub interrupted: bool,
}

impl StructuredError {
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
