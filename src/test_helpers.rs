//! Shared test utilities for the imgbatch test suite.
//!
//! Synthetic images and fixture directories, generated on the fly so tests
//! never depend on binary files checked into the repo.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_rgb_png(tmp.path(), "a.png", 200, 200);
//! write_corrupt(tmp.path(), "b.png");
//! ```

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

// =========================================================================
// In-memory images
// =========================================================================

/// RGBA image with a horizontal red ramp, a vertical green ramp and
/// partially transparent pixels along the right half.
pub fn gradient_rgba(width: u32, height: u32) -> DynamicImage {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        let a = if x * 2 >= width { 128 } else { 255 };
        Rgba([r, g, 64, a])
    });
    DynamicImage::ImageRgba8(img)
}

/// Solid RGB image.
pub fn solid_rgb(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

// =========================================================================
// On-disk fixtures
// =========================================================================

/// Write `image` to `dir/name`, format chosen by extension.
pub fn write_image(dir: &Path, name: &str, image: &DynamicImage) -> PathBuf {
    let path = dir.join(name);
    image.save(&path).unwrap();
    path
}

/// Write a mid-grey RGB PNG of the given size.
pub fn write_rgb_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    write_image(dir, name, &solid_rgb(width, height, [128, 128, 128]))
}

/// Write a file with an image extension that cannot be decoded.
pub fn write_corrupt(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"definitely not an image").unwrap();
    path
}

/// File names directly inside `dir`, sorted.
pub fn list_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
