//! Normalized grayscale sample grids.
//!
//! A [`LumaGrid`] is the common currency between the pixel source and the
//! hashing algorithms: a row-major grid of luma samples in `[0, 1]`.

use super::HashError;

/// Row-major grid of grayscale samples.
#[derive(Debug, Clone, PartialEq)]
pub struct LumaGrid {
    width: usize,
    height: usize,
    samples: Vec<f32>,
}

impl LumaGrid {
    /// Build a grid from row-major samples.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::EmptyGrid`] for a zero-sized grid and
    /// [`HashError::GridSizeMismatch`] when `samples.len() != width * height`.
    pub fn new(width: usize, height: usize, samples: Vec<f32>) -> Result<Self, HashError> {
        if width == 0 || height == 0 {
            return Err(HashError::EmptyGrid);
        }
        if samples.len() != width * height {
            return Err(HashError::GridSizeMismatch {
                expected: width * height,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// Build a grid by evaluating `f(x, y)` for every cell.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero.
    #[must_use]
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        assert!(width > 0 && height > 0, "grid dimensions must be non-zero");
        let mut samples = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                samples.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            samples,
        }
    }

    /// Build a grid from 8-bit luma values, scaling them into `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`LumaGrid::new`].
    pub fn from_luma8(width: usize, height: usize, pixels: &[u8]) -> Result<Self, HashError> {
        let samples = pixels.iter().map(|&p| f32::from(p) / 255.0).collect();
        Self::new(width, height, samples)
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Sample at column `x`, row `y`.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.samples[y * self.width + x]
    }

    /// All samples in row-major order.
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Mean of all samples.
    #[must_use]
    pub fn mean(&self) -> f32 {
        let sum: f64 = self.samples.iter().map(|&s| f64::from(s)).sum();
        (sum / self.samples.len() as f64) as f32
    }

    /// Resample to `width` x `height` with an area-averaging filter.
    ///
    /// Each output cell is the coverage-weighted mean of the source cells
    /// it overlaps, which degrades to nearest-neighbour when upsampling.
    /// Returns a clone when the size already matches.
    #[must_use]
    pub fn resample(&self, width: usize, height: usize) -> Self {
        if width == self.width && height == self.height {
            return self.clone();
        }

        let sx = self.width as f64 / width as f64;
        let sy = self.height as f64 / height as f64;

        Self::from_fn(width, height, |ox, oy| {
            let x0 = ox as f64 * sx;
            let x1 = x0 + sx;
            let y0 = oy as f64 * sy;
            let y1 = y0 + sy;

            let mut acc = 0.0f64;
            let mut weight = 0.0f64;

            let mut y = y0.floor() as usize;
            while (y as f64) < y1 && y < self.height {
                let wy = (y1.min(y as f64 + 1.0) - y0.max(y as f64)).max(0.0);
                let mut x = x0.floor() as usize;
                while (x as f64) < x1 && x < self.width {
                    let wx = (x1.min(x as f64 + 1.0) - x0.max(x as f64)).max(0.0);
                    let w = wx * wy;
                    acc += f64::from(self.get(x, y)) * w;
                    weight += w;
                    x += 1;
                }
                y += 1;
            }

            if weight > 0.0 {
                (acc / weight) as f32
            } else {
                0.0
            }
        })
    }
}

/// Median of a set of values: the middle element, or the mean of the two
/// middle elements for an even count.
///
/// Returns `0.0` for an empty slice.
#[must_use]
pub fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
