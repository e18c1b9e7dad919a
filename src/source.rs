//! Pixel sources: decoding image files into normalized luma grids.
//!
//! The search engine only ever talks to the [`PixelSource`] trait. The
//! bundled [`ImageSource`] is backed by the `image` crate; formats it
//! cannot decode (HEIC/HEIF/AVIF without native decoders) come back as
//! [`DecodeError::Unsupported`] for that one file.

use std::path::Path;

use image::imageops::FilterType;

use crate::hashing::{HashError, LumaGrid};

/// File extensions treated as images during discovery (lowercase, no dot).
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "bmp", "gif", "tiff", "tif", "webp", "ico", "heic", "heif", "avif",
];

/// Whether `path` has one of the [`IMAGE_EXTENSIONS`] (case-insensitive).
#[must_use]
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Errors from decoding a single image.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The file could not be opened or read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// No decoder is available for this format.
    #[error("Unsupported image format for {path}: {reason}")]
    Unsupported { path: String, reason: String },

    /// The decoder rejected the data.
    #[error("Failed to decode {path}: {reason}")]
    Malformed { path: String, reason: String },

    /// The decoded image could not be turned into a grid.
    #[error("Failed to sample {path}: {source}")]
    Grid {
        path: String,
        #[source]
        source: HashError,
    },
}

/// Decodes a file into a grayscale sample grid of a requested size.
///
/// Implementations must be shareable across worker threads.
pub trait PixelSource: Send + Sync {
    /// Decode `path` and resample it to `width` x `height`.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] when the file cannot be read or decoded.
    fn decode(&self, path: &Path, width: usize, height: usize) -> Result<LumaGrid, DecodeError>;
}

/// [`PixelSource`] backed by the `image` crate.
#[derive(Debug, Clone, Copy)]
pub struct ImageSource {
    filter: FilterType,
}

impl ImageSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            filter: FilterType::Lanczos3,
        }
    }

    /// Use a different resampling filter.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }
}

impl Default for ImageSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelSource for ImageSource {
    fn decode(&self, path: &Path, width: usize, height: usize) -> Result<LumaGrid, DecodeError> {
        let display = path.display().to_string();
        let img = image::open(path).map_err(|e| map_image_error(&display, e))?;
        let luma = img.to_luma8();
        let resized = image::imageops::resize(&luma, width as u32, height as u32, self.filter);
        LumaGrid::from_luma8(width, height, resized.as_raw()).map_err(|source| DecodeError::Grid {
            path: display,
            source,
        })
    }
}

fn map_image_error(path: &str, err: image::ImageError) -> DecodeError {
    match err {
        image::ImageError::IoError(source) => DecodeError::Io {
            path: path.to_string(),
            source,
        },
        image::ImageError::Unsupported(e) => DecodeError::Unsupported {
            path: path.to_string(),
            reason: e.to_string(),
        },
        other => DecodeError::Malformed {
            path: path.to_string(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_is_image_path() {
        assert!(is_image_path(&PathBuf::from("a/b/photo.JPG")));
        assert!(is_image_path(&PathBuf::from("scan.tif")));
        assert!(is_image_path(&PathBuf::from("phone.heic")));
        assert!(!is_image_path(&PathBuf::from("notes.txt")));
        assert!(!is_image_path(&PathBuf::from("png")));
        assert!(!is_image_path(&PathBuf::from("archive.png.gz")));
    }

    #[test]
    fn test_decode_to_requested_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("white.png");
        RgbImage::from_pixel(40, 30, Rgb([255, 255, 255]))
            .save(&path)
            .unwrap();

        let grid = ImageSource::new().decode(&path, 9, 8).unwrap();
        assert_eq!((grid.width(), grid.height()), (9, 8));
        assert!(grid.samples().iter().all(|&s| (s - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(ImageSource::new().decode(&path, 8, 8).is_err());
    }

    #[test]
    fn test_decode_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = ImageSource::new()
            .decode(&dir.path().join("missing.png"), 8, 8)
            .unwrap_err();
        assert!(matches!(err, DecodeError::Io { .. }));
    }
}
