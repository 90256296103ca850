//! Output path derivation.
//!
//! Every transform writes its results next to, or below, the source folder
//! under a name derived from the input file. Three policies cover every
//! command, and they compose:
//!
//! - **Suffix**: `photo.jpg` → `photo_nobg.png` (same directory)
//! - **Prefix**: `photo.jpg` → `enhanced_photo.jpg`
//! - **Subfolder**: `photo.jpg` → `resized/photo.jpg`
//!
//! The extension is either kept or forced (`.png` for background removal,
//! the target format for convert).
//!
//! A resolved path is never the input path itself: a policy that would write
//! over the source is rejected.

use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NamingError {
    #[error("output would overwrite the source file: {0}")]
    WouldOverwrite(PathBuf),
    #[error("not a file path: {0}")]
    NoFileName(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How output file names are derived from input file names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamingPolicy {
    /// Directory the output goes to. Relative paths are taken relative to
    /// the source directory; `None` means the source directory itself.
    pub subfolder: Option<PathBuf>,
    pub prefix: String,
    pub suffix: String,
}

impl NamingPolicy {
    pub fn suffix(suffix: &str) -> Self {
        Self {
            suffix: suffix.to_string(),
            ..Self::default()
        }
    }

    pub fn prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            ..Self::default()
        }
    }

    pub fn subfolder(dir: impl Into<PathBuf>) -> Self {
        Self {
            subfolder: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.suffix = suffix.to_string();
        self
    }

    pub fn with_subfolder(mut self, dir: impl Into<PathBuf>) -> Self {
        self.subfolder = Some(dir.into());
        self
    }

    /// A policy with no subfolder, prefix or suffix maps every file onto
    /// itself when the extension is preserved.
    pub fn is_identity(&self) -> bool {
        self.subfolder.is_none() && self.prefix.is_empty() && self.suffix.is_empty()
    }
}

/// Extension of the output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    /// Keep the input file's extension.
    Preserve,
    /// Always write this extension (without the dot).
    Force(String),
}

/// Resolves output paths for one batch.
#[derive(Debug, Clone)]
pub struct OutputPathResolver {
    output_dir: PathBuf,
    policy: NamingPolicy,
    format: OutputFormat,
}

impl OutputPathResolver {
    pub fn new(source_dir: &Path, policy: NamingPolicy, format: OutputFormat) -> Self {
        let output_dir = match &policy.subfolder {
            Some(sub) => source_dir.join(sub),
            None => source_dir.to_path_buf(),
        };
        Self {
            output_dir,
            policy,
            format,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Destination path for `input`.
    pub fn resolve(&self, input: &Path) -> Result<PathBuf, NamingError> {
        let stem = input
            .file_stem()
            .ok_or_else(|| NamingError::NoFileName(input.to_path_buf()))?;
        let ext = match &self.format {
            OutputFormat::Preserve => input.extension(),
            OutputFormat::Force(ext) => Some(OsStr::new(ext.as_str())),
        };

        // Built as an OsString so stems that are not valid UTF-8 survive.
        let mut name = OsString::from(&self.policy.prefix);
        name.push(stem);
        name.push(&self.policy.suffix);
        if let Some(ext) = ext {
            name.push(".");
            name.push(ext);
        }
        let output = self.output_dir.join(name);

        if same_file(&output, input) {
            return Err(NamingError::WouldOverwrite(output));
        }
        Ok(output)
    }

    /// Create the output directory if it does not exist yet.
    pub fn prepare(&self) -> Result<(), NamingError> {
        ensure_directory(&self.output_dir)?;
        Ok(())
    }
}

/// Create `path` and its parents. Succeeds if it already exists.
pub fn ensure_directory(path: &Path) -> std::io::Result<()> {
    match std::fs::create_dir_all(path) {
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        other => other,
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
