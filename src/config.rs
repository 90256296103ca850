//! Tool configuration.
//!
//! Configuration is optional and read-only: it is loaded only when
//! `--config <FILE>` is passed, and nothing is ever written back. The stock
//! defaults are overridden by the values in the user file, and command-line
//! flags override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [extensions]
//! default = ["png", "jpg", "jpeg"]               # remove-bg
//! extended = ["png", "jpg", "jpeg", "bmp", "gif"] # crop, convert, enhance
//!
//! [encoding]
//! jpeg_quality = 90          # JPEG output quality (1-100)
//!
//! [background_removal]
//! model = "u2net"            # Segmentation model name
//! models_dir = "models"      # Where <model>.onnx files live
//! alpha_matting = false      # High-precision edge refinement
//! foreground_threshold = 240 # Mask values >= this are certain foreground
//! background_threshold = 10  # Mask values <= this are certain background
//! erode_size = 10            # Erosion radius for the certain regions
//!
//! [processing]
//! max_threads = 4            # Pixel-operation threads (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [background_removal]
//! alpha_matting = true
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{DEFAULT_MODEL, Quality, RemovalOptions};
use crate::scan::ExtensionSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from an `imgbatch.toml` file.
///
/// All fields have defaults. User config files need only specify the
/// values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Accepted input extensions.
    pub extensions: ExtensionsConfig,
    /// Encoder settings.
    pub encoding: EncodingConfig,
    /// Background-removal engine settings.
    pub background_removal: BackgroundRemovalConfig,
    /// Thread pool settings.
    pub processing: ProcessingConfig,
}

impl ToolConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.encoding.jpeg_quality) {
            return Err(ConfigError::Validation(
                "encoding.jpeg_quality must be 1-100".into(),
            ));
        }
        if self.extensions.default_set().is_empty() || self.extensions.extended_set().is_empty() {
            return Err(ConfigError::Validation(
                "extensions lists must not be empty".into(),
            ));
        }
        let bg = &self.background_removal;
        if bg.model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "background_removal.model must not be empty".into(),
            ));
        }
        if bg.background_threshold >= bg.foreground_threshold {
            return Err(ConfigError::Validation(
                "background_removal.background_threshold must be below foreground_threshold".into(),
            ));
        }
        if self.processing.max_threads == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn jpeg_quality(&self) -> Quality {
        Quality::new(self.encoding.jpeg_quality)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtensionsConfig {
    /// Extensions scanned by commands using the standard set.
    pub default: Vec<String>,
    /// Extensions scanned by commands using the extended set.
    pub extended: Vec<String>,
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            default: ExtensionSet::standard().iter().map(String::from).collect(),
            extended: ExtensionSet::extended().iter().map(String::from).collect(),
        }
    }
}

impl ExtensionsConfig {
    pub fn default_set(&self) -> ExtensionSet {
        ExtensionSet::new(&self.default)
    }

    pub fn extended_set(&self) -> ExtensionSet {
        ExtensionSet::new(&self.extended)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    /// JPEG quality (1-100).
    pub jpeg_quality: u32,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: u32::from(Quality::default().value()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackgroundRemovalConfig {
    pub model: String,
    pub models_dir: PathBuf,
    pub alpha_matting: bool,
    pub foreground_threshold: u8,
    pub background_threshold: u8,
    pub erode_size: u8,
}

impl Default for BackgroundRemovalConfig {
    fn default() -> Self {
        let stock = RemovalOptions::default();
        Self {
            model: DEFAULT_MODEL.to_string(),
            models_dir: PathBuf::from("models"),
            alpha_matting: stock.alpha_matting,
            foreground_threshold: stock.foreground_threshold,
            background_threshold: stock.background_threshold,
            erode_size: stock.erode_size,
        }
    }
}

impl BackgroundRemovalConfig {
    pub fn removal_options(&self) -> RemovalOptions {
        RemovalOptions {
            model: self.model.clone(),
            alpha_matting: self.alpha_matting,
            foreground_threshold: self.foreground_threshold,
            background_threshold: self.background_threshold,
            erode_size: self.erode_size,
        }
    }
}

/// Thread pool settings for the pixel operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of threads used inside a single image operation.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_threads.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// The base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ToolConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// The file was named explicitly, so a missing file is an error.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(value)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ToolConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ToolConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the tool configuration.
///
/// With no path, returns the stock defaults. Otherwise merges the file on
/// top of them, rejects unknown keys, and validates the result.
pub fn load_config(path: Option<&Path>) -> Result<ToolConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = path.map(load_raw_config).transpose()?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `imgbatch.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgbatch configuration
# ======================
#
# Pass this file with `imgbatch --config imgbatch.toml <command> ...`.
# Every key is optional; delete the ones you don't change.
# Command-line flags always win over values here.
# Unknown keys are rejected to catch typos early.

# ---------------------------------------------------------------------------
# Accepted input extensions (case-insensitive, without the dot)
# ---------------------------------------------------------------------------
[extensions]
# Used by remove-bg.
default = ["png", "jpg", "jpeg"]
# Used by crop, convert and enhance.
extended = ["png", "jpg", "jpeg", "bmp", "gif"]

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[encoding]
# Quality for JPEG output (1-100). Other formats are lossless.
jpeg_quality = 90

# ---------------------------------------------------------------------------
# Background removal
# ---------------------------------------------------------------------------
[background_removal]
# Segmentation model. Looked up as <models_dir>/<model>.onnx.
# u2net (general), u2netp (small), u2net_human_seg (people), silueta,
# isnet-general-use.
model = "u2net"
models_dir = "models"
# High-precision mode: snap confident regions, keep soft edges.
alpha_matting = false
# Mask values at or above this are certain foreground (0-255).
foreground_threshold = 240
# Mask values at or below this are certain background (0-255).
background_threshold = 10
# Erosion radius in pixels applied to both certain regions.
erode_size = 10

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Threads used inside a single image operation (enhance, resampling).
# Omit for auto (one per CPU core). Larger values are clamped down.
# max_threads = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = ToolConfig::default();
        assert_eq!(config.encoding.jpeg_quality, 90);
        assert_eq!(config.extensions.default, vec!["png", "jpg", "jpeg"]);
        assert_eq!(config.extensions.extended.len(), 5);
        assert_eq!(config.background_removal.model, "u2net");
        assert_eq!(config.background_removal.foreground_threshold, 240);
        assert_eq!(config.processing.max_threads, None);
    }

    #[test]
    fn removal_options_from_config() {
        let mut config = BackgroundRemovalConfig::default();
        config.alpha_matting = true;
        config.model = "silueta".into();
        let opts = config.removal_options();
        assert!(opts.alpha_matting);
        assert_eq!(opts.model, "silueta");
        assert_eq!(opts.erode_size, 10);
    }

    #[test]
    fn parse_partial_config() {
        let config: ToolConfig = toml::from_str(
            r#"
[background_removal]
alpha_matting = true
"#,
        )
        .unwrap();
        assert!(config.background_removal.alpha_matting);
        assert_eq!(config.background_removal.model, "u2net");
        assert_eq!(config.encoding.jpeg_quality, 90);
    }

    // =========================================================================
    // effective_threads
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_threads: Some(100_000),
        };
        assert!(effective_threads(&config) <= 100_000);
        assert!(effective_threads(&config) >= 1);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_threads: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"jpeg_quality = 90"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"jpeg_quality = 70"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("jpeg_quality").unwrap().as_integer(), Some(70));
    }

    #[test]
    fn merge_toml_table_merge_preserves_base_keys() {
        let base: toml::Value = toml::from_str(
            r#"
[background_removal]
model = "u2net"
erode_size = 10
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[background_removal]
model = "silueta"
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let bg = merged.get("background_removal").unwrap();
        assert_eq!(bg.get("model").unwrap().as_str(), Some("silueta"));
        assert_eq!(bg.get("erode_size").unwrap().as_integer(), Some(10));
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str(r#"default = ["png", "jpg"]"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"default = ["webp"]"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("default").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Unknown key rejection
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<ToolConfig, _> = toml::from_str(
            r#"
[encoding]
jpeg_qualty = 90
"#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<ToolConfig, _> = toml::from_str(
            r#"
[encodings]
jpeg_quality = 90
"#,
        );
        assert!(result.is_err());
    }

    // =========================================================================
    // validate
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(ToolConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_quality_bounds() {
        let mut config = ToolConfig::default();
        config.encoding.jpeg_quality = 0;
        assert!(config.validate().is_err());
        config.encoding.jpeg_quality = 101;
        assert!(config.validate().is_err());
        config.encoding.jpeg_quality = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_threshold_order() {
        let mut config = ToolConfig::default();
        config.background_removal.background_threshold = 240;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_empty_extensions() {
        let mut config = ToolConfig::default();
        config.extensions.extended = vec![".".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_threads() {
        let mut config = ToolConfig::default();
        config.processing.max_threads = Some(0);
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // load_config
    // =========================================================================

    #[test]
    fn load_config_without_path_is_default() {
        assert_eq!(load_config(None).unwrap(), ToolConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("imgbatch.toml");
        fs::write(
            &path,
            r#"
[encoding]
jpeg_quality = 75

[extensions]
extended = ["png", "tiff"]
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.jpeg_quality().value(), 75);
        assert_eq!(
            config.extensions.extended_set(),
            ExtensionSet::new(["png", "tiff"])
        );
        assert_eq!(config.extensions.default, vec!["png", "jpg", "jpeg"]);
    }

    #[test]
    fn load_config_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(Some(&tmp.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("imgbatch.toml");
        fs::write(&path, "this is not toml [[[").unwrap();
        assert!(matches!(load_config(Some(&path)), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("imgbatch.toml");
        fs::write(&path, "[encoding]\njpeg_quality = 0\n").unwrap();
        assert!(matches!(
            load_config(Some(&path)),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: ToolConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, ToolConfig::default());
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let value = stock_defaults_value().unwrap();
        let table = value.as_table().unwrap();
        for section in ["extensions", "encoding", "background_removal", "processing"] {
            assert!(table.contains_key(section), "missing section {}", section);
        }
    }
}
