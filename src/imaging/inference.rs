//! Background-removal inference seam.
//!
//! Segmentation runs behind two traits so the batch pipeline never depends
//! on a particular runtime:
//!
//! - [`InferenceEngine`] knows where models live and loads them by name.
//! - [`InferenceSession`] is one loaded model. It is created lazily on the
//!   first file of a batch and reused for the rest.
//!
//! Engines may hand back their result in any of three shapes
//! ([`ImageRepresentation`]). [`normalize`] folds all of them into a single
//! [`ImageOutput`] ready for saving.
//!
//! The production engine is [`OnnxEngine`](super::onnx::OnnxEngine), behind
//! the `onnx` cargo feature. Tests use `MockEngine` from this module.

use super::codec::ImageOutput;
use super::params::RemovalOptions;
use crate::transform::TransformError;
use image::{DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("model file not found: {0}")]
    ModelNotFound(PathBuf),
    #[error("failed to load model: {0}")]
    ModelLoad(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// The shapes an engine may return a cut-out in.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageRepresentation {
    Decoded(DynamicImage),
    /// An encoded file in memory (PNG, JPEG, ...).
    Encoded(Vec<u8>),
    /// Raw 8-bit samples in row-major order.
    ///
    /// `shape` is `[height, width]` or `[height, width, channels]` with
    /// 1 to 4 channels (L, LA, RGB, RGBA).
    PixelArray { shape: Vec<usize>, data: Vec<u8> },
}

/// Loads segmentation models by name.
pub trait InferenceEngine: Send + Sync {
    fn load_session(&self, model: &str) -> Result<Box<dyn InferenceSession>, InferenceError>;
}

/// A loaded segmentation model.
pub trait InferenceSession: Send {
    /// Cut the foreground out of `image`. The result carries an alpha channel.
    fn infer(
        &mut self,
        image: &RgbaImage,
        options: &RemovalOptions,
    ) -> Result<ImageRepresentation, InferenceError>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Arc<E> {
    fn load_session(&self, model: &str) -> Result<Box<dyn InferenceSession>, InferenceError> {
        (**self).load_session(model)
    }
}

/// Convert whatever the engine returned into something [`save_output`](super::codec::save_output) accepts.
///
/// Encoded PNG bytes are kept as-is; other encoded formats are decoded so
/// they can be written as PNG. Anything unrecognised is an
/// [`UnsupportedOutputRepresentation`](TransformError::UnsupportedOutputRepresentation).
pub fn normalize(repr: ImageRepresentation) -> Result<ImageOutput, TransformError> {
    match repr {
        ImageRepresentation::Decoded(image) => Ok(ImageOutput::Image(image)),
        ImageRepresentation::Encoded(bytes) => match image::guess_format(&bytes) {
            Ok(ImageFormat::Png) => Ok(ImageOutput::Encoded(bytes)),
            Ok(format) => image::load_from_memory_with_format(&bytes, format)
                .map(ImageOutput::Image)
                .map_err(|e| {
                    TransformError::UnsupportedOutputRepresentation(format!(
                        "encoded {:?} output could not be decoded: {}",
                        format, e
                    ))
                }),
            Err(_) => Err(TransformError::UnsupportedOutputRepresentation(format!(
                "{} bytes in an unrecognised encoding",
                bytes.len()
            ))),
        },
        ImageRepresentation::PixelArray { shape, data } => {
            pixel_array_to_image(&shape, data).map(ImageOutput::Image)
        }
    }
}

fn pixel_array_to_image(shape: &[usize], data: Vec<u8>) -> Result<DynamicImage, TransformError> {
    let unsupported =
        |why: &str| TransformError::UnsupportedOutputRepresentation(format!("pixel array {:?}: {}", shape, why));

    let (height, width, channels) = match *shape {
        [h, w] => (h, w, 1),
        [h, w, c] => (h, w, c),
        _ => return Err(unsupported("expected [height, width] or [height, width, channels]")),
    };
    if width == 0 || height == 0 {
        return Err(unsupported("zero-sized"));
    }
    let (w, h) = match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => return Err(unsupported("too large")),
    };
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels));
    if expected != Some(data.len()) {
        return Err(unsupported(&format!("{} samples for this shape", data.len())));
    }

    let image = match channels {
        1 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
        2 => GrayAlphaImage::from_raw(w, h, data).map(DynamicImage::ImageLumaA8),
        3 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
        _ => return Err(unsupported("channel count must be 1 to 4")),
    };
    image.ok_or_else(|| unsupported("buffer does not fit dimensions"))
}
