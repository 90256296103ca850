//! Pure geometry for the transforms.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::CropMargins;

/// A crop rectangle in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Compute the crop box for an image of `dims` trimmed by `margins`.
///
/// Returns `None` when the remaining area has a non-positive width or height.
///
/// ```
/// # use imgbatch::imaging::calculations::{crop_box, CropBox};
/// # use imgbatch::imaging::CropMargins;
/// let margins = CropMargins { left: 10, top: 5, right: 20, bottom: 15 };
/// assert_eq!(
///     crop_box((100, 80), margins),
///     Some(CropBox { x: 10, y: 5, width: 70, height: 60 })
/// );
/// assert_eq!(crop_box((100, 80), CropMargins { left: 60, right: 40, ..margins }), None);
/// ```
pub fn crop_box(dims: (u32, u32), margins: CropMargins) -> Option<CropBox> {
    let (w, h) = (i64::from(dims.0), i64::from(dims.1));
    let width = w - i64::from(margins.left) - i64::from(margins.right);
    let height = h - i64::from(margins.top) - i64::from(margins.bottom);
    if width <= 0 || height <= 0 {
        return None;
    }
    Some(CropBox {
        x: margins.left,
        y: margins.top,
        width: width as u32,
        height: height as u32,
    })
}

/// Number of counter-clockwise quarter turns if `degrees` is a multiple of 90.
///
/// Right-angle rotations take a lossless fast path instead of resampling.
pub fn quarter_turns(degrees: f32) -> Option<u32> {
    let turns = f64::from(degrees).rem_euclid(360.0) / 90.0;
    let rounded = turns.round();
    if (turns - rounded).abs() < 1e-6 {
        Some(rounded as u32 % 4)
    } else {
        None
    }
}

/// Canvas size that fully contains a `dims` image rotated by `degrees`.
///
/// Matches the bounding box of the rotated corners, rounded up. A tiny
/// tolerance keeps float noise (e.g. `cos(90°) ≈ 6e-17`) from adding a pixel.
pub fn expanded_canvas(dims: (u32, u32), degrees: f32) -> (u32, u32) {
    let (w, h) = (f64::from(dims.0), f64::from(dims.1));
    let theta = f64::from(degrees).to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let fit = |v: f64| ((v - 1e-6).ceil().max(1.0)) as u32;
    (fit(w * cos + h * sin), fit(w * sin + h * cos))
}
