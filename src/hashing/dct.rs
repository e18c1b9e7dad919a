//! Two-dimensional DCT-II used by the perceptual hash.

use std::f64::consts::PI;

/// Compute the top-left `keep` x `keep` block of the orthonormal 2-D
/// DCT-II of a square `size` x `size` row-major matrix.
///
/// Only the low-frequency coefficients are ever consumed, so the row pass
/// computes `keep` frequencies per row and the column pass `keep`
/// frequencies per retained column.
///
/// # Panics
///
/// Panics if `pixels.len() != size * size` or `keep > size`.
#[must_use]
pub(crate) fn dct_2d_low(pixels: &[f32], size: usize, keep: usize) -> Vec<f64> {
    assert_eq!(pixels.len(), size * size, "matrix must be size x size");
    assert!(keep <= size, "cannot keep more coefficients than the matrix has");

    let table = cosine_table(size, keep);
    let scale0 = (1.0 / size as f64).sqrt();
    let scale = (2.0 / size as f64).sqrt();
    let norm = |u: usize| if u == 0 { scale0 } else { scale };

    // Rows: size x keep
    let mut rows = vec![0.0f64; size * keep];
    for y in 0..size {
        let row = &pixels[y * size..(y + 1) * size];
        for u in 0..keep {
            let coeffs = &table[u * size..(u + 1) * size];
            let sum: f64 = row
                .iter()
                .zip(coeffs)
                .map(|(&p, &c)| f64::from(p) * c)
                .sum();
            rows[y * keep + u] = sum * norm(u);
        }
    }

    // Columns: keep x keep
    let mut out = vec![0.0f64; keep * keep];
    for u in 0..keep {
        for v in 0..keep {
            let coeffs = &table[v * size..(v + 1) * size];
            let mut sum = 0.0;
            for (y, &c) in coeffs.iter().enumerate() {
                sum += rows[y * keep + u] * c;
            }
            out[v * keep + u] = sum * norm(v);
        }
    }

    out
}

/// `table[k * size + n] = cos(pi * (2n + 1) * k / (2 * size))` for `k < keep`.
fn cosine_table(size: usize, keep: usize) -> Vec<f64> {
    let mut table = Vec::with_capacity(keep * size);
    for k in 0..keep {
        for n in 0..size {
            table.push((PI * (2 * n + 1) as f64 * k as f64 / (2.0 * size as f64)).cos());
        }
    }
    table
}
