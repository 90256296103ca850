//! The transforms a batch can apply, and the error taxonomy for a batch.
//!
//! A [`TransformSpec`] is built once per batch from user input and never
//! mutated. [`Transformer`] applies it to one decoded image at a time.
//!
//! | Variant | Default naming | Default extensions |
//! |---|---|---|
//! | [`Resize`](TransformSpec::Resize) | `resized/<name>` | `.png` |
//! | [`Crop`](TransformSpec::Crop) | `cropped/<name>` | extended |
//! | [`RotateConvert`](TransformSpec::RotateConvert) | `output/<stem>.<target>` | extended |
//! | [`Enhance`](TransformSpec::Enhance) | `enhanced_images/enhanced_<name>` | extended |
//! | [`BackgroundRemoval`](TransformSpec::BackgroundRemoval) | `<stem>_nobg.png` | standard |
//!
//! ## Background removal sessions
//!
//! The inference session is loaded on the first file that needs it and then
//! kept for the rest of the batch. If loading fails, that file is recorded
//! as an [`InferenceFailure`](TransformError::InferenceFailure) and the next
//! file tries again.

use crate::imaging::calculations::crop_box;
use crate::imaging::{
    CropMargins, EnhanceFactors, ImageOutput, InferenceEngine, InferenceSession, RemovalOptions,
    ResizeParams, RotateConvertParams, normalize, operations,
};
use crate::naming::{NamingPolicy, OutputFormat};
use crate::scan::ExtensionSet;
use image::{DynamicImage, GenericImageView};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("cannot decode image: {0}")]
    DecodeFailure(String),
    #[error("transform failed: {0}")]
    TransformFailure(String),
    #[error("cannot save image: {0}")]
    SaveFailure(String),
    #[error("unsupported engine output: {0}")]
    UnsupportedOutputRepresentation(String),
    #[error("inference failed: {0}")]
    InferenceFailure(String),
}

impl TransformError {
    /// Stable label for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DirectoryNotFound(_) => "DirectoryNotFound",
            Self::InvalidParameter(_) => "InvalidParameter",
            Self::DecodeFailure(_) => "DecodeFailure",
            Self::TransformFailure(_) => "TransformFailure",
            Self::SaveFailure(_) => "SaveFailure",
            Self::UnsupportedOutputRepresentation(_) => "UnsupportedOutputRepresentation",
            Self::InferenceFailure(_) => "InferenceFailure",
        }
    }
}

/// One transform and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformSpec {
    Resize(ResizeParams),
    Crop(CropMargins),
    RotateConvert(RotateConvertParams),
    Enhance(EnhanceFactors),
    BackgroundRemoval(RemovalOptions),
}

impl TransformSpec {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resize(_) => "resize",
            Self::Crop(_) => "crop",
            Self::RotateConvert(_) => "convert",
            Self::Enhance(_) => "enhance",
            Self::BackgroundRemoval(_) => "remove-bg",
        }
    }

    /// Check the batch-wide parameters. Runs before any file is touched.
    ///
    /// Crop margins can only be checked against each image, so a crop that
    /// consumes the whole image fails per file instead.
    pub fn validate(&self) -> Result<(), TransformError> {
        let invalid = |msg: String| Err(TransformError::InvalidParameter(msg));
        match self {
            Self::Resize(p) => check_dimensions(*p),
            Self::Crop(_) => Ok(()),
            Self::RotateConvert(p) => {
                if let Some(deg) = p.rotate_degrees.filter(|d| !d.is_finite()) {
                    return invalid(format!("rotation must be a finite number, got {}", deg));
                }
                match p.resize {
                    Some(r) => check_dimensions(r),
                    None => Ok(()),
                }
            }
            Self::Enhance(f) => {
                for (name, value) in [
                    ("brightness", f.brightness),
                    ("contrast", f.contrast),
                    ("sharpness", f.sharpness),
                    ("color", f.color),
                ] {
                    if !value.is_finite() {
                        return invalid(format!("{} factor must be a finite number, got {}", name, value));
                    }
                }
                Ok(())
            }
            Self::BackgroundRemoval(o) => {
                if o.model.trim().is_empty() {
                    return invalid("model name must not be empty".to_string());
                }
                if o.alpha_matting && o.background_threshold >= o.foreground_threshold {
                    return invalid(format!(
                        "background threshold ({}) must be below foreground threshold ({})",
                        o.background_threshold, o.foreground_threshold
                    ));
                }
                Ok(())
            }
        }
    }

    /// Extension policy of the files this transform writes.
    pub fn output_format(&self) -> OutputFormat {
        match self {
            Self::RotateConvert(p) => OutputFormat::Force(p.extension.clone()),
            Self::BackgroundRemoval(_) => OutputFormat::Force("png".to_string()),
            _ => OutputFormat::Preserve,
        }
    }

    pub fn default_naming(&self) -> NamingPolicy {
        match self {
            Self::Resize(_) => NamingPolicy::subfolder("resized"),
            Self::Crop(_) => NamingPolicy::subfolder("cropped"),
            Self::RotateConvert(_) => NamingPolicy::subfolder("output"),
            Self::Enhance(_) => NamingPolicy::prefix("enhanced_").with_subfolder("enhanced_images"),
            Self::BackgroundRemoval(_) => NamingPolicy::suffix("_nobg"),
        }
    }

    pub fn default_extensions(&self) -> ExtensionSet {
        match self {
            Self::Resize(_) => ExtensionSet::png_only(),
            Self::BackgroundRemoval(_) => ExtensionSet::standard(),
            _ => ExtensionSet::extended(),
        }
    }
}

fn check_dimensions(p: ResizeParams) -> Result<(), TransformError> {
    if p.width == 0 || p.height == 0 {
        return Err(TransformError::InvalidParameter(format!(
            "resize dimensions must be positive, got {}x{}",
            p.width, p.height
        )));
    }
    Ok(())
}

/// Applies a [`TransformSpec`] to decoded images.
///
/// Holds the inference engine and, once loaded, its session.
pub struct Transformer {
    engine: Option<Box<dyn InferenceEngine>>,
    session: Option<(String, Box<dyn InferenceSession>)>,
}

impl Transformer {
    pub fn new(engine: Option<Box<dyn InferenceEngine>>) -> Self {
        Self {
            engine,
            session: None,
        }
    }

    pub fn apply(
        &mut self,
        spec: &TransformSpec,
        image: DynamicImage,
    ) -> Result<ImageOutput, TransformError> {
        match spec {
            TransformSpec::Resize(p) => Ok(ImageOutput::Image(operations::resize_exact(&image, *p))),
            TransformSpec::Crop(margins) => {
                let dims = image.dimensions();
                let bounds = crop_box(dims, *margins).ok_or_else(|| {
                    TransformError::InvalidParameter(format!(
                        "margins {}/{}/{}/{} (left/top/right/bottom) leave nothing of a {}x{} image",
                        margins.left, margins.top, margins.right, margins.bottom, dims.0, dims.1
                    ))
                })?;
                Ok(ImageOutput::Image(operations::crop(&image, bounds)))
            }
            TransformSpec::RotateConvert(p) => {
                let mut image = image;
                if let Some(deg) = p.rotate_degrees {
                    image = operations::rotate_expand(image, deg);
                }
                if let Some(size) = p.resize {
                    image = operations::resize_exact(&image, size);
                }
                if !p.format.supports_alpha() {
                    image = operations::flatten_alpha(image, operations::WHITE);
                }
                Ok(ImageOutput::Image(image))
            }
            TransformSpec::Enhance(factors) => {
                Ok(ImageOutput::Image(operations::enhance(image, factors)))
            }
            TransformSpec::BackgroundRemoval(options) => self.remove_background(options, image),
        }
    }

    fn remove_background(
        &mut self,
        options: &RemovalOptions,
        image: DynamicImage,
    ) -> Result<ImageOutput, TransformError> {
        let session = match self.session.take() {
            Some((model, session)) if model == options.model => session,
            _ => {
                let engine = self.engine.as_ref().ok_or_else(|| {
                    TransformError::InferenceFailure("no inference engine compiled in".to_string())
                })?;
                log::info!("Loading background-removal model '{}'", options.model);
                engine
                    .load_session(&options.model)
                    .map_err(|e| TransformError::InferenceFailure(e.to_string()))?
            }
        };
        let (_, session) = self.session.insert((options.model.clone(), session));

        let repr = session
            .infer(&image.to_rgba8(), options)
            .map_err(|e| TransformError::InferenceFailure(e.to_string()))?;
        normalize(repr)
    }
}
