//! ONNX Runtime segmentation engine (`onnx` feature).
//!
//! Models are looked up as `<models_dir>/<model>.onnx`. Each file goes
//! through the same steps:
//!
//! 1. Resize to the model's square input size and normalise into an NCHW
//!    `f32` tensor.
//! 2. Run the session and take the first output as the mask logits.
//! 3. Min-max normalise the mask to `0..=255` and resize it back to the
//!    source dimensions.
//! 4. Optionally refine with [`refine_alpha`], then attach it as alpha.

use super::inference::{ImageRepresentation, InferenceEngine, InferenceError, InferenceSession};
use super::matting::{apply_mask, refine_alpha};
use super::params::RemovalOptions;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use ndarray::{Array4, ArrayViewD};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::PathBuf;

/// Input geometry and normalisation for a model family.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ModelProfile {
    input_size: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl ModelProfile {
    fn for_model(model: &str) -> Self {
        if model.starts_with("isnet") {
            Self {
                input_size: 1024,
                mean: [0.5, 0.5, 0.5],
                std: [1.0, 1.0, 1.0],
            }
        } else {
            // u2net, u2netp, u2net_human_seg, silueta
            Self {
                input_size: 320,
                mean: [0.485, 0.456, 0.406],
                std: [0.229, 0.224, 0.225],
            }
        }
    }
}

/// Loads `.onnx` segmentation models from a directory.
#[derive(Debug, Clone)]
pub struct OnnxEngine {
    models_dir: PathBuf,
}

impl OnnxEngine {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    pub fn model_path(&self, model: &str) -> PathBuf {
        self.models_dir.join(format!("{}.onnx", model))
    }
}

impl InferenceEngine for OnnxEngine {
    fn load_session(&self, model: &str) -> Result<Box<dyn InferenceSession>, InferenceError> {
        let path = self.model_path(model);
        if !path.exists() {
            return Err(InferenceError::ModelNotFound(path));
        }

        log::info!("Loading ONNX model from: {}", path.display());
        let session = Session::builder()
            .and_then(|b| b.commit_from_file(&path))
            .map_err(|e| InferenceError::ModelLoad(format!("{}: {}", path.display(), e)))?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .ok_or_else(|| InferenceError::ModelLoad(format!("{}: model has no inputs", path.display())))?;
        let output_name = session
            .outputs()
            .first()
            .map(|o| o.name().to_string())
            .ok_or_else(|| InferenceError::ModelLoad(format!("{}: model has no outputs", path.display())))?;

        Ok(Box::new(OnnxSession {
            session,
            input_name,
            output_name,
            profile: ModelProfile::for_model(model),
        }))
    }
}

struct OnnxSession {
    session: Session,
    input_name: String,
    output_name: String,
    profile: ModelProfile,
}

impl InferenceSession for OnnxSession {
    fn infer(
        &mut self,
        image: &RgbaImage,
        options: &RemovalOptions,
    ) -> Result<ImageRepresentation, InferenceError> {
        let input = preprocess(image, &self.profile);
        let tensor = TensorRef::from_array_view(input.view())
            .map_err(|e| InferenceError::Inference(e.to_string()))?;
        let outputs = self
            .session
            .run(ort::inputs! { self.input_name.as_str() => tensor })
            .map_err(|e| InferenceError::Inference(e.to_string()))?;
        let logits = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(|e| InferenceError::Inference(e.to_string()))?;

        let mask = mask_from_logits(logits)?;
        let mask = imageops::resize(&mask, image.width(), image.height(), FilterType::Triangle);
        let mask = refine_alpha(&mask, options);
        Ok(ImageRepresentation::Decoded(DynamicImage::ImageRgba8(
            apply_mask(image, &mask),
        )))
    }
}

fn preprocess(image: &RgbaImage, profile: &ModelProfile) -> Array4<f32> {
    let size = profile.input_size;
    let resized = imageops::resize(image, size, size, FilterType::Triangle);
    let mut input = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
    for (x, y, px) in resized.enumerate_pixels() {
        for c in 0..3 {
            let v = f32::from(px.0[c]) / 255.0;
            input[[0, c, y as usize, x as usize]] = (v - profile.mean[c]) / profile.std[c];
        }
    }
    input
}

/// Turn the first mask plane of a `[.., H, W]` output into a grayscale image.
fn mask_from_logits(logits: ArrayViewD<'_, f32>) -> Result<GrayImage, InferenceError> {
    let shape = logits.shape();
    let (h, w) = match *shape {
        [.., h, w] if h > 0 && w > 0 => (h, w),
        _ => {
            return Err(InferenceError::Inference(format!(
                "unexpected output shape {:?}",
                shape
            )));
        }
    };
    let plane: Vec<f32> = logits.iter().take(h * w).copied().collect();
    let (min, max) = plane
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = if max > min { max - min } else { 1.0 };

    let mut mask = GrayImage::new(w as u32, h as u32);
    for (px, v) in mask.pixels_mut().zip(plane) {
        *px = Luma([(((v - min) / range) * 255.0).round().clamp(0.0, 255.0) as u8]);
    }
    Ok(mask)
}
