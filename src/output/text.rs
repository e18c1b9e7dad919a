//! Plain-text report for terminals.
//!
//! Colour comes from `yansi` and follows its global switch, which the
//! binary turns off for `--no-color` / `NO_COLOR`.

use std::io::{self, Write};

use bytesize::ByteSize;
use yansi::Paint;

use super::format_duration;
use crate::search::SearchOutcome;

/// Numbered match list followed by a statistics block.
pub struct TextReport<'a> {
    outcome: &'a SearchOutcome,
    show_failures: bool,
}

impl<'a> TextReport<'a> {
    #[must_use]
    pub fn new(outcome: &'a SearchOutcome) -> Self {
        Self {
            outcome,
            show_failures: true,
        }
    }

    /// List each failed candidate, not just the count.
    #[must_use]
    pub fn with_failures(mut self, show: bool) -> Self {
        self.show_failures = show;
        self
    }

    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let outcome = self.outcome;
        let reference = &outcome.reference;

        writeln!(
            w,
            "{} {} ({}, {}, N={})",
            "Reference:".bold(),
            reference.path.display(),
            ByteSize::b(reference.size),
            reference.algorithm(),
            reference.hash_size()
        )?;
        writeln!(w)?;

        if outcome.matches.is_empty() {
            writeln!(w, "{}", "No similar images found.".yellow())?;
        } else {
            writeln!(
                w,
                "{}",
                format!("{} similar image(s):", outcome.matches.len()).green().bold()
            )?;
            let width = outcome.matches.len().to_string().len();
            for (i, m) in outcome.matches.iter().enumerate() {
                let similarity = format!("{:6.2}%", m.similarity);
                let similarity = if m.distance == 0 {
                    similarity.green().bold()
                } else {
                    similarity.green()
                };
                writeln!(
                    w,
                    "{:>width$}. {}  {}  {}",
                    i + 1,
                    similarity,
                    m.path.display(),
                    format!("(distance {}, {})", m.distance, ByteSize::b(m.size)).dim(),
                )?;
            }
        }

        if self.show_failures && !outcome.failures.is_empty() {
            writeln!(w)?;
            writeln!(
                w,
                "{}",
                format!("{} image(s) could not be processed:", outcome.failures.len()).red()
            )?;
            for failure in &outcome.failures {
                writeln!(w, "  {}: {}", failure.path.display(), failure.reason.dim())?;
            }
        }

        self.write_stats(w)
    }

    fn write_stats<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let stats = &self.outcome.stats;
        writeln!(w)?;
        writeln!(w, "{}", "Statistics".bold())?;
        writeln!(w, "  Found:       {}", stats.found)?;
        if stats.prefiltered > 0 {
            writeln!(w, "  Size-skipped: {}", stats.prefiltered)?;
        }
        writeln!(w, "  Processed:   {}", stats.processed)?;
        writeln!(w, "  Failed:      {}", stats.failed)?;
        writeln!(w, "  Matched:     {}", stats.matched)?;
        writeln!(
            w,
            "  Cache hits:  {} ({} decoded)",
            stats.cache_hits, stats.decoded
        )?;
        if stats.walk_errors > 0 {
            writeln!(w, "  Walk errors: {}", stats.walk_errors)?;
        }
        writeln!(
            w,
            "  Elapsed:     {} ({:.1} img/s)",
            format_duration(stats.elapsed),
            stats.throughput()
        )?;
        if stats.cache_degraded {
            writeln!(w, "  {}", "Cache was unavailable; results were computed without it.".yellow())?;
        }
        if stats.interrupted {
            writeln!(w, "  {}", "Interrupted: results are partial.".yellow().bold())?;
        }
        Ok(())
    }

    /// Render into a `String`.
    #[must_use]
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.write_to(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
