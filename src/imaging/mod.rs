//! Image processing in pure Rust, plus an optional ONNX engine.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (format sniffed from content) |
//! | **Resize** | `resize_exact` with Catmull-Rom |
//! | **Crop** | `crop_imm` |
//! | **Rotate** | `rotate90/180/270`, or `imageproc::warp_into` for other angles |
//! | **Enhance** | per-pixel blends over `rayon` |
//! | **Background removal** | [`InferenceEngine`] trait, `ort` behind the `onnx` feature |
//! | **Encode** | `image` encoders, written atomically via `tempfile` |
//!
//! The module is split into:
//! - **Calculations**: pure geometry (crop boxes, rotated canvas sizes)
//! - **Parameters**: data structures describing each transform
//! - **Operations**: pixel work on in-memory images
//! - **Codec**: loading from and saving to disk
//! - **Inference / matting**: the segmentation seam and mask refinement

pub mod calculations;
pub mod codec;
pub mod inference;
pub mod matting;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod operations;
mod params;

pub use codec::{ImageOutput, load_image, save_output};
pub use inference::{
    ImageRepresentation, InferenceEngine, InferenceError, InferenceSession, normalize,
};
#[cfg(feature = "onnx")]
pub use onnx::OnnxEngine;
pub use params::{
    CropMargins, DEFAULT_MODEL, EnhanceFactors, Quality, RemovalOptions, ResizeParams,
    RotateConvertParams, TargetFormat,
};

use std::path::Path;

/// The inference engine compiled into this build, if any.
///
/// Without the `onnx` feature there is none, and background removal fails
/// per file with an inference error.
pub fn default_engine(models_dir: &Path) -> Option<Box<dyn InferenceEngine>> {
    #[cfg(feature = "onnx")]
    {
        Some(Box::new(OnnxEngine::new(models_dir)))
    }
    #[cfg(not(feature = "onnx"))]
    {
        log::debug!(
            "no inference engine compiled in; models in {} are unused",
            models_dir.display()
        );
        None
    }
}
