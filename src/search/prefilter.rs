//! File-size prefilter.
//!
//! Visually similar images usually encode to similar sizes. Candidates
//! whose size differs from the reference by more than the tolerance are
//! dropped before any decoding. This trades recall for speed: a heavily
//! recompressed copy can fall outside the band and will then be missed.

/// Size band around a reference file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizePrefilter {
    reference_size: u64,
    tolerance: f64,
    enabled: bool,
}

impl SizePrefilter {
    /// A filter accepting sizes within `tolerance_pct` percent of `reference_size`.
    #[must_use]
    pub fn new(reference_size: u64, tolerance_pct: f64) -> Self {
        Self {
            reference_size,
            tolerance: tolerance_pct.max(0.0) / 100.0,
            enabled: true,
        }
    }

    /// A filter that passes everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            reference_size: 0,
            tolerance: 0.0,
            enabled: false,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a candidate of `size` bytes should be hashed.
    #[must_use]
    pub fn passes(&self, size: u64) -> bool {
        if !self.enabled {
            return true;
        }
        if self.reference_size == 0 {
            return size == 0;
        }
        let diff = size.abs_diff(self.reference_size) as f64;
        diff / self.reference_size as f64 <= self.tolerance
    }

    /// Inclusive `(min, max)` sizes that pass, `None` when disabled.
    #[must_use]
    pub fn bounds(&self) -> Option<(u64, u64)> {
        if !self.enabled {
            return None;
        }
        let s = self.reference_size as f64;
        let min = (s * (1.0 - self.tolerance)).max(0.0).ceil() as u64;
        let max = (s * (1.0 + self.tolerance)).floor() as u64;
        Some((min, max))
    }
}
