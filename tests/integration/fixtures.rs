//! Fixture images for integration tests.

use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};

/// Smooth scene: two low-frequency waves and a bright block.
pub fn scene(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let fx = x as f32 / width as f32;
        let fy = y as f32 / height as f32;
        let mut v = 128.0
            + 50.0 * (fx * std::f32::consts::TAU).sin()
            + 40.0 * (fy * std::f32::consts::PI * 1.5).cos();
        if (0.55..0.8).contains(&fx) && (0.2..0.45).contains(&fy) {
            v += 60.0;
        }
        Luma([v.clamp(0.0, 255.0) as u8])
    })
}

/// Diagonal stripes with no relation to [`scene`].
pub fn stripes(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        if ((x + 2 * y) / 24) % 2 == 0 {
            Luma([230])
        } else {
            Luma([25])
        }
    })
}

/// Lay out the standard search scenario under `dir`:
///
/// - `reference.png`: the scene at 256x256
/// - `copy.png`: byte-identical copy of the reference
/// - `resized.png`: the scene downscaled to 128x128
/// - `unrelated.png`: stripes
///
/// Returns the reference path.
pub fn scenario(dir: &Path) -> PathBuf {
    let reference = dir.join("reference.png");
    scene(256, 256).save(&reference).unwrap();
    std::fs::copy(&reference, dir.join("copy.png")).unwrap();

    let small = image::imageops::resize(
        &scene(256, 256),
        128,
        128,
        image::imageops::FilterType::Triangle,
    );
    small.save(dir.join("resized.png")).unwrap();
    stripes(256, 256).save(dir.join("unrelated.png")).unwrap();
    reference
}

/// A file with an image extension that no decoder accepts.
pub fn corrupt(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"\xff\xd8\xff\xe0 definitely not a jpeg").unwrap();
    path
}

pub fn file_names(paths: impl IntoIterator<Item = PathBuf>) -> Vec<String> {
    paths
        .into_iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}
