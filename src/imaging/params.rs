//! Parameter types for the batch transforms.
//!
//! These structs describe *what* to do to each image, not *how*. They are
//! built once per batch from user input (CLI flags, config file) and then
//! shared read-only by every file the batch touches. The pixel work lives in
//! [`operations`](super::operations); validation of the values lives in
//! [`TransformSpec::validate`](crate::transform::TransformSpec::validate).
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1–100, default 90). Clamped on construction.
//! - [`ResizeParams`]: exact target dimensions. Aspect ratio is never preserved.
//! - [`CropMargins`]: pixels to trim from each edge.
//! - [`RotateConvertParams`]: optional rotation + optional resize + target format.
//! - [`EnhanceFactors`]: brightness/contrast/sharpness/color factors centered on 1.0.
//! - [`RemovalOptions`]: segmentation model name and alpha-matting settings.

use image::ImageFormat;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Exact output dimensions for a resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeParams {
    pub width: u32,
    pub height: u32,
}

impl ResizeParams {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Margins trimmed from each edge of the image.
///
/// The crop box is `(left, top, width - right, height - bottom)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CropMargins {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

/// Output format for the rotate/convert transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Jpeg,
    Png,
    Bmp,
    Gif,
}

impl TargetFormat {
    /// Parse a user-supplied format name. Unknown names fall back to JPEG.
    ///
    /// Returns the format together with the file extension to write, which
    /// keeps the user's spelling (`jpg` stays `jpg`, `jpeg` stays `jpeg`).
    pub fn parse(input: &str) -> (Self, String) {
        let name = input.trim().trim_start_matches('.').to_ascii_lowercase();
        match name.as_str() {
            "jpeg" | "jpg" => (Self::Jpeg, name),
            "png" => (Self::Png, name),
            "bmp" => (Self::Bmp, name),
            "gif" => (Self::Gif, name),
            _ => (Self::Jpeg, "jpg".to_string()),
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Bmp => ImageFormat::Bmp,
            Self::Gif => ImageFormat::Gif,
        }
    }

    /// Whether the format can store an alpha channel.
    pub fn supports_alpha(self) -> bool {
        !matches!(self, Self::Jpeg)
    }
}

/// Parameters for the rotate-and-convert transform.
///
/// Steps run in order: rotate (canvas expanded to fit), resize, then
/// flatten onto white when the target format has no alpha channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RotateConvertParams {
    /// Counter-clockwise rotation in degrees.
    pub rotate_degrees: Option<f32>,
    pub resize: Option<ResizeParams>,
    pub format: TargetFormat,
    /// Extension written on output files, without the dot.
    pub extension: String,
}

impl RotateConvertParams {
    pub fn new(format_name: &str) -> Self {
        let (format, extension) = TargetFormat::parse(format_name);
        Self {
            rotate_degrees: None,
            resize: None,
            format,
            extension,
        }
    }
}

/// Enhancement factors. `1.0` leaves the image unchanged.
///
/// Applied in the fixed order brightness → contrast → sharpness → color.
/// Values are not clamped: negative or extreme factors are passed through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhanceFactors {
    pub brightness: f32,
    pub contrast: f32,
    pub sharpness: f32,
    pub color: f32,
}

impl EnhanceFactors {
    /// The factors used when none are given on the command line.
    pub fn recommended() -> Self {
        Self {
            brightness: 1.2,
            contrast: 1.5,
            sharpness: 2.0,
            color: 1.5,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.brightness == 1.0 && self.contrast == 1.0 && self.sharpness == 1.0 && self.color == 1.0
    }
}

impl Default for EnhanceFactors {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
            sharpness: 1.0,
            color: 1.0,
        }
    }
}

/// Background-removal settings passed through to the inference engine.
///
/// - `model`: segmentation model name, e.g. `u2net` (general purpose) or `u2net_human_seg`
/// - `alpha_matting`: high-precision mode; refines the mask edge using the thresholds below
/// - `foreground_threshold`: mask values at or above this are treated as certain foreground
/// - `background_threshold`: mask values at or below this are treated as certain background
/// - `erode_size`: erosion radius applied to both certain regions before refinement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalOptions {
    pub model: String,
    pub alpha_matting: bool,
    pub foreground_threshold: u8,
    pub background_threshold: u8,
    pub erode_size: u8,
}

pub const DEFAULT_MODEL: &str = "u2net";

impl Default for RemovalOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            alpha_matting: false,
            foreground_threshold: 240,
            background_threshold: 10,
            erode_size: 10,
        }
    }
}
