//! Decoding source files and writing results.
//!
//! | Step | Crate / function |
//! |---|---|
//! | Decode | `image::ImageReader` with content sniffing |
//! | Encode | `DynamicImage::write_to`, `JpegEncoder` for quality control |
//! | Atomic write | `tempfile::NamedTempFile` in the destination dir + `persist` |
//!
//! The output format always follows the destination path's extension.

use super::operations::{self, WHITE};
use super::params::Quality;
use crate::transform::TransformError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// What a transform hands back for saving.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutput {
    /// A decoded image, encoded according to the destination extension.
    Image(DynamicImage),
    /// Bytes already encoded by an external engine.
    Encoded(Vec<u8>),
}

/// Open and decode an image from disk.
pub fn load_image(path: &Path) -> Result<DynamicImage, TransformError> {
    ImageReader::open(path)
        .map_err(|e| TransformError::DecodeFailure(format!("{}: {}", path.display(), e)))?
        .with_guessed_format()
        .map_err(|e| TransformError::DecodeFailure(format!("{}: {}", path.display(), e)))?
        .decode()
        .map_err(|e| TransformError::DecodeFailure(format!("{}: {}", path.display(), e)))
}

/// Encode `output` to `path`. The file is either fully written or not created.
pub fn save_output(output: ImageOutput, path: &Path, quality: Quality) -> Result<(), TransformError> {
    let format = ImageFormat::from_path(path).map_err(|e| {
        TransformError::SaveFailure(format!("{}: unsupported output format: {}", path.display(), e))
    })?;

    let image = match output {
        ImageOutput::Encoded(bytes) if image::guess_format(&bytes).ok() == Some(format) => {
            return write_atomic(path, |w| w.write_all(&bytes).map_err(|e| e.to_string()));
        }
        ImageOutput::Encoded(bytes) => image::load_from_memory(&bytes).map_err(|e| {
            TransformError::SaveFailure(format!("{}: re-encoding engine output: {}", path.display(), e))
        })?,
        ImageOutput::Image(image) => image,
    };

    write_atomic(path, |w| encode(&image, format, quality, w))
}

fn encode(
    image: &DynamicImage,
    format: ImageFormat,
    quality: Quality,
    writer: &mut BufWriter<NamedTempFile>,
) -> Result<(), String> {
    match format {
        ImageFormat::Jpeg => {
            let flat = operations::flatten_alpha(image.clone(), WHITE).to_rgb8();
            let encoder = JpegEncoder::new_with_quality(writer, quality.value());
            DynamicImage::ImageRgb8(flat)
                .write_with_encoder(encoder)
                .map_err(|e| e.to_string())
        }
        ImageFormat::Gif => DynamicImage::ImageRgba8(image.to_rgba8())
            .write_to(writer, format)
            .map_err(|e| e.to_string()),
        _ => image.write_to(writer, format).map_err(|e| e.to_string()),
    }
}

fn write_atomic<F>(path: &Path, write: F) -> Result<(), TransformError>
where
    F: FnOnce(&mut BufWriter<NamedTempFile>) -> Result<(), String>,
{
    let fail = |detail: String| TransformError::SaveFailure(format!("{}: {}", path.display(), detail));
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let tmp = NamedTempFile::new_in(dir).map_err(|e| fail(e.to_string()))?;
    let mut writer = BufWriter::new(tmp);
    write(&mut writer).map_err(fail)?;
    let tmp = writer.into_inner().map_err(|e| fail(e.to_string()))?;
    tmp.persist(path).map_err(|e| fail(e.error.to_string()))?;
    Ok(())
}
