//! Mask post-processing for background removal.
//!
//! A segmentation model produces a soft grayscale mask (0 = background,
//! 255 = foreground). With alpha matting enabled the mask is split into a
//! trimap: pixels confidently inside the foreground or background are
//! snapped to fully opaque or fully transparent, and only the band between
//! them keeps the model's soft value. A pixel is confident only when it is
//! strictly above the foreground threshold or strictly below the background
//! threshold. Both confident regions are then eroded with an
//! `erode_size`×`erode_size` box, which widens the band around every edge.

use super::params::RemovalOptions;
use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::erode;

/// Refine a soft mask according to `options`.
///
/// Returns the mask unchanged when alpha matting is off.
pub fn refine_alpha(mask: &GrayImage, options: &RemovalOptions) -> GrayImage {
    if !options.alpha_matting {
        return mask.clone();
    }

    let region = |keep: &dyn Fn(u8) -> bool| -> GrayImage {
        let mut out = GrayImage::new(mask.width(), mask.height());
        for (src, dst) in mask.pixels().zip(out.pixels_mut()) {
            *dst = Luma([if keep(src.0[0]) { 255 } else { 0 }]);
        }
        erode(&out, Norm::LInf, options.erode_size / 2)
    };
    let foreground = region(&|v| v > options.foreground_threshold);
    let background = region(&|v| v < options.background_threshold);

    let mut refined = mask.clone();
    for ((px, fg), bg) in refined
        .pixels_mut()
        .zip(foreground.pixels())
        .zip(background.pixels())
    {
        if fg.0[0] == 255 {
            px.0[0] = 255;
        } else if bg.0[0] == 255 {
            px.0[0] = 0;
        }
    }
    refined
}

/// Combine `image` with `mask` as its alpha channel.
///
/// The mask must have the image's dimensions.
pub fn apply_mask(image: &RgbaImage, mask: &GrayImage) -> RgbaImage {
    let mut result = RgbaImage::new(image.width(), image.height());
    for ((dst, src), alpha) in result.pixels_mut().zip(image.pixels()).zip(mask.pixels()) {
        *dst = Rgba([src.0[0], src.0[1], src.0[2], alpha.0[0]]);
    }
    result
}
