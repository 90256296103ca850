//! Pixel operations behind each transform.
//!
//! Resampling, cropping and right-angle rotation come straight from the
//! `image` crate; arbitrary-angle rotation uses `imageproc`'s projective warp
//! onto an expanded canvas. The four enhancement operations follow the
//! classic "blend with a degenerate image" model:
//!
//! ```text
//! out = degenerate + factor * (image - degenerate)
//! ```
//!
//! | Operation | Degenerate image |
//! |---|---|
//! | brightness | black |
//! | contrast | uniform grey at the mean luminance |
//! | sharpness | 3×3 smoothed copy (border pixels untouched) |
//! | color | grayscale copy (ITU-R 601 luma) |
//!
//! A factor of 1.0 returns the image unchanged; alpha is never touched.

use super::calculations::{self, CropBox};
use super::params::{EnhanceFactors, ResizeParams};
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use rayon::prelude::*;

/// Opaque white, the background used when flattening alpha.
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Resize to exactly `params.width × params.height`, ignoring aspect ratio.
pub fn resize_exact(image: &DynamicImage, params: ResizeParams) -> DynamicImage {
    image.resize_exact(params.width, params.height, FilterType::CatmullRom)
}

pub fn crop(image: &DynamicImage, bounds: CropBox) -> DynamicImage {
    image.crop_imm(bounds.x, bounds.y, bounds.width, bounds.height)
}

/// Rotate counter-clockwise by `degrees`, growing the canvas so no corner is clipped.
///
/// Uncovered canvas is transparent for images with alpha and black otherwise.
pub fn rotate_expand(image: DynamicImage, degrees: f32) -> DynamicImage {
    match calculations::quarter_turns(degrees) {
        Some(0) => image,
        Some(1) => image.rotate270(),
        Some(2) => image.rotate180(),
        Some(3) => image.rotate90(),
        _ => rotate_arbitrary(&image, degrees),
    }
}

fn rotate_arbitrary(image: &DynamicImage, degrees: f32) -> DynamicImage {
    let (w, h) = image.dimensions();
    let (new_w, new_h) = calculations::expanded_canvas((w, h), degrees);

    // Projection::rotate turns clockwise in image space.
    let projection = Projection::translate(new_w as f32 / 2.0, new_h as f32 / 2.0)
        * Projection::rotate(-degrees.to_radians())
        * Projection::translate(-(w as f32) / 2.0, -(h as f32) / 2.0);

    if image.color().has_alpha() {
        let source = image.to_rgba8();
        let mut out = RgbaImage::new(new_w, new_h);
        warp_into(
            &source,
            &projection,
            Interpolation::Bilinear,
            Rgba([0, 0, 0, 0]),
            &mut out,
        );
        DynamicImage::ImageRgba8(out)
    } else {
        let source = image.to_rgb8();
        let mut out = RgbImage::new(new_w, new_h);
        warp_into(
            &source,
            &projection,
            Interpolation::Bilinear,
            Rgb([0, 0, 0]),
            &mut out,
        );
        DynamicImage::ImageRgb8(out)
    }
}

/// Composite an image with alpha onto an opaque `background`, using alpha as the mask.
///
/// Images without an alpha channel are returned unchanged.
pub fn flatten_alpha(image: DynamicImage, background: Rgb<u8>) -> DynamicImage {
    if !image.color().has_alpha() {
        return image;
    }
    let rgba = image.to_rgba8();
    let flat = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let px = rgba.get_pixel(x, y);
        let alpha = f32::from(px[3]) / 255.0;
        let mix = |c: usize| {
            (f32::from(px[c]) * alpha + f32::from(background[c]) * (1.0 - alpha)).round() as u8
        };
        Rgb([mix(0), mix(1), mix(2)])
    });
    DynamicImage::ImageRgb8(flat)
}

// ============================================================================
// Enhancement
// ============================================================================

/// Apply all four enhancement factors in order: brightness → contrast → sharpness → color.
///
/// Factors equal to 1.0 are skipped; with all four at 1.0 the input comes back
/// untouched. The result keeps the input's channel layout (gray stays gray,
/// alpha stays alpha) for 8-bit images.
pub fn enhance(image: DynamicImage, factors: &EnhanceFactors) -> DynamicImage {
    if factors.is_identity() {
        return image;
    }
    let color = image.color();
    let mut rgba = image.to_rgba8();

    if factors.brightness != 1.0 {
        adjust_brightness(&mut rgba, factors.brightness);
    }
    if factors.contrast != 1.0 {
        adjust_contrast(&mut rgba, factors.contrast);
    }
    if factors.sharpness != 1.0 {
        adjust_sharpness(&mut rgba, factors.sharpness);
    }
    if factors.color != 1.0 {
        adjust_color(&mut rgba, factors.color);
    }

    restore_layout(DynamicImage::ImageRgba8(rgba), color)
}

fn restore_layout(image: DynamicImage, original: ColorType) -> DynamicImage {
    match original {
        ColorType::L8 => DynamicImage::ImageLuma8(image.to_luma8()),
        ColorType::La8 => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        ColorType::Rgb8 => DynamicImage::ImageRgb8(image.to_rgb8()),
        other if !other.has_alpha() => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    }
}

pub fn adjust_brightness(image: &mut RgbaImage, factor: f32) {
    let black = RgbaImage::new(image.width(), image.height());
    blend_toward(image, &black, factor);
}

pub fn adjust_contrast(image: &mut RgbaImage, factor: f32) {
    let mean = mean_luma(image);
    let grey = RgbaImage::from_pixel(image.width(), image.height(), Rgba([mean, mean, mean, 0]));
    blend_toward(image, &grey, factor);
}

pub fn adjust_sharpness(image: &mut RgbaImage, factor: f32) {
    let smoothed = smooth(image);
    blend_toward(image, &smoothed, factor);
}

pub fn adjust_color(image: &mut RgbaImage, factor: f32) {
    let gray = RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let px = image.get_pixel(x, y);
        let l = luma(px);
        Rgba([l, l, l, px[3]])
    });
    blend_toward(image, &gray, factor);
}

/// `image = degenerate + factor * (image - degenerate)` on the color channels.
fn blend_toward(image: &mut RgbaImage, degenerate: &RgbaImage, factor: f32) {
    let pixels: &mut [u8] = image;
    pixels
        .par_chunks_mut(4)
        .zip(degenerate.as_raw().par_chunks(4))
        .for_each(|(px, base)| {
            for c in 0..3 {
                let b = f32::from(base[c]);
                px[c] = (b + factor * (f32::from(px[c]) - b)).round().clamp(0.0, 255.0) as u8;
            }
        });
}

fn luma(px: &Rgba<u8>) -> u8 {
    (0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2])).round() as u8
}

fn mean_luma(image: &RgbaImage) -> u8 {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return 0;
    }
    let sum: u64 = image.pixels().map(|px| u64::from(luma(px))).sum();
    ((sum as f64 / count as f64) + 0.5) as u8
}

/// 3×3 smoothing kernel `[1 1 1; 1 5 1; 1 1 1] / 13`. Edge rows and columns are copied.
fn smooth(image: &RgbaImage) -> RgbaImage {
    const KERNEL: [[u32; 3]; 3] = [[1, 1, 1], [1, 5, 1], [1, 1, 1]];
    let (w, h) = image.dimensions();
    let mut out = image.clone();
    if w < 3 || h < 3 {
        return out;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = [0u32; 3];
            for (ky, row) in KERNEL.iter().enumerate() {
                for (kx, weight) in row.iter().enumerate() {
                    let px = image.get_pixel(x + kx as u32 - 1, y + ky as u32 - 1);
                    for c in 0..3 {
                        acc[c] += u32::from(px[c]) * weight;
                    }
                }
            }
            let px = out.get_pixel_mut(x, y);
            for c in 0..3 {
                px[c] = ((acc[c] + 6) / 13) as u8;
            }
        }
    }
    out
}
