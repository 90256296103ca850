//! Directory scanning.
//!
//! Stage 1 of a batch run: list the files directly inside the source
//! directory whose extension is in the accepted set.
//!
//! ```text
//! photos/
//! ├── a.png          ✓
//! ├── B.JPG          ✓  (case-insensitive)
//! ├── notes.txt      ✗  (extension not accepted)
//! ├── folder.png/    ✗  (directories are never candidates)
//! └── resized/       ✗  (not descended into)
//!     └── a.png
//! ```
//!
//! Results are sorted by file name, so the order is stable across runs and
//! platforms.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<walkdir::Error> for ScanError {
    fn from(err: walkdir::Error) -> Self {
        match err.into_io_error() {
            Some(io) => ScanError::Io(io),
            None => ScanError::Io(std::io::Error::other("filesystem loop detected")),
        }
    }
}

/// A set of accepted file extensions.
///
/// Stored lowercase and without the leading dot, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSet(Vec<String>);

impl ExtensionSet {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set: Vec<String> = Vec::new();
        for ext in extensions {
            let ext = ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase();
            if !ext.is_empty() && !set.contains(&ext) {
                set.push(ext);
            }
        }
        Self(set)
    }

    /// `.png`, `.jpg`, `.jpeg`
    pub fn standard() -> Self {
        Self::new(["png", "jpg", "jpeg"])
    }

    /// The standard set plus `.bmp` and `.gif`.
    pub fn extended() -> Self {
        Self::new(["png", "jpg", "jpeg", "bmp", "gif"])
    }

    pub fn png_only() -> Self {
        Self::new(["png"])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Whether `file_name` ends with `.<ext>` for some accepted extension.
    pub fn matches(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.0.iter().any(|ext| {
            lower
                .strip_suffix(ext.as_str())
                .is_some_and(|stem| stem.ends_with('.'))
        })
    }
}

impl fmt::Display for ExtensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dotted: Vec<String> = self.0.iter().map(|e| format!(".{}", e)).collect();
        write!(f, "{}", dotted.join(", "))
    }
}

/// List candidate files in `directory`, sorted by file name.
///
/// Only files directly inside `directory` are considered. Names are matched
/// first, so entries with other extensions are never inspected. A matching
/// symlink is followed; if its target is missing it stays a candidate and
/// fails when the batch tries to read it. An empty result is not an error.
pub fn enumerate(directory: &Path, extensions: &ExtensionSet) -> Result<Vec<PathBuf>, ScanError> {
    if !directory.is_dir() {
        return Err(ScanError::DirectoryNotFound(directory.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !extensions.matches(&entry.file_name().to_string_lossy()) {
            continue;
        }
        if entry.path_is_symlink() {
            match std::fs::metadata(entry.path()) {
                Ok(meta) if !meta.is_file() => continue,
                Ok(_) => {}
                Err(e) => log::warn!("{}: broken link ({})", entry.path().display(), e),
            }
        } else if !entry.file_type().is_file() {
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}
