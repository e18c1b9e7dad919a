//! Similarity search over a directory tree.
//!
//! # Example
//!
//! ```no_run
//! use lookalike::search::{SearchConfig, SearchEngine};
//! use std::path::Path;
//!
//! let engine = SearchEngine::new(SearchConfig::default().with_threshold(85.0))?;
//! let outcome = engine.run(Path::new("photo.jpg"), Path::new("/home/user/Pictures"))?;
//! for m in &outcome.matches {
//!     println!("{:.1}% {}", m.similarity, m.path.display());
//! }
//! # Ok::<(), lookalike::search::SearchError>(())
//! ```

pub mod engine;
pub mod prefilter;
pub mod results;

pub use engine::{SearchConfig, SearchEngine, SearchError};
pub use prefilter::SizePrefilter;
pub use results::{
    CandidateFailure, CandidateRecord, MatchResult, ReferenceImage, SearchOutcome,
    SearchStatistics,
};
