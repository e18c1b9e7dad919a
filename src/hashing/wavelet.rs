//! Multi-level 2-D Haar wavelet decomposition used by the wavelet hash.
//!
//! The transform runs in place on a square power-of-two matrix. After each
//! level the top-left quadrant holds the approximation (LL) band, and the
//! next level recurses into it, the usual Mallat layout.

use std::f32::consts::FRAC_1_SQRT_2;

/// Decompose `data` (a `size` x `size` row-major matrix) by `levels`
/// levels of the orthonormal Haar transform and return the resulting LL
/// band, which is `(size >> levels)` square.
///
/// # Panics
///
/// Panics if `size` is not a power of two, `data.len() != size * size`, or
/// `levels` would shrink the LL band below a single sample.
#[must_use]
pub(crate) fn haar_ll_band(mut data: Vec<f32>, size: usize, levels: u32) -> Vec<f32> {
    assert!(size.is_power_of_two(), "haar transform needs a power-of-two size");
    assert_eq!(data.len(), size * size, "matrix must be size x size");
    assert!(
        levels <= size.trailing_zeros(),
        "too many decomposition levels for size {size}"
    );

    let mut current = size;
    let mut scratch = vec![0.0f32; size];
    for _ in 0..levels {
        haar_level(&mut data, size, current, &mut scratch);
        current /= 2;
    }

    let mut ll = Vec::with_capacity(current * current);
    for y in 0..current {
        ll.extend_from_slice(&data[y * size..y * size + current]);
    }
    ll
}

/// One decomposition level over the top-left `extent` x `extent` block of a
/// matrix with row stride `stride`.
fn haar_level(data: &mut [f32], stride: usize, extent: usize, scratch: &mut [f32]) {
    let half = extent / 2;

    for y in 0..extent {
        let row = &mut data[y * stride..y * stride + extent];
        for i in 0..half {
            let a = row[2 * i];
            let b = row[2 * i + 1];
            scratch[i] = (a + b) * FRAC_1_SQRT_2;
            scratch[half + i] = (a - b) * FRAC_1_SQRT_2;
        }
        row.copy_from_slice(&scratch[..extent]);
    }

    for x in 0..extent {
        for i in 0..half {
            let a = data[(2 * i) * stride + x];
            let b = data[(2 * i + 1) * stride + x];
            scratch[i] = (a + b) * FRAC_1_SQRT_2;
            scratch[half + i] = (a - b) * FRAC_1_SQRT_2;
        }
        for (y, &value) in scratch[..extent].iter().enumerate() {
            data[y * stride + x] = value;
        }
    }
}
