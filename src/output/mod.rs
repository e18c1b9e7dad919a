//! Renderers for search results.
//!
//! - [`text`]: numbered list plus a statistics block, for terminals
//! - [`json`]: one JSON document, for scripts
//!
//! # Example
//!
//! ```no_run
//! use lookalike::error::ExitCode;
//! use lookalike::output::json::JsonReport;
//! use lookalike::search::{SearchConfig, SearchEngine};
//! use std::path::Path;
//!
//! let engine = SearchEngine::new(SearchConfig::default()).unwrap();
//! let outcome = engine.run(Path::new("photo.jpg"), Path::new(".")).unwrap();
//!
//! let report = JsonReport::new(&outcome, ExitCode::from_outcome(&outcome));
//! println!("{}", report.to_json_pretty().unwrap());
//! ```

pub mod json;
pub mod text;

pub use json::{JsonOutputError, JsonReport};
pub use text::TextReport;

/// Format a duration as a human-readable string.
pub(crate) fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, duration.subsec_millis())
    } else {
        format!("{}ms", duration.subsec_millis())
    }
}
