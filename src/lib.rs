//! # imgbatch
//!
//! Batch image processing for a folder: resize, crop, rotate/convert,
//! enhance, and background removal. Pick a directory and a transform; every
//! matching image is processed in order and written to a derived path, and
//! a summary says what worked and what didn't.
//!
//! # Architecture: One Pipeline, Five Transforms
//!
//! Every command runs the same pipeline:
//!
//! ```text
//! 1. Scan       photos/            →  [a.png, c.jpg]           (extension filter, sorted)
//! 2. Resolve    photos/a.png       →  photos/resized/a.png     (naming policy)
//! 3. Transform  decoded image      →  image or encoded bytes   (one TransformSpec)
//! 4. Save       output             →  file, written atomically
//! 5. Report     per-file results   →  progress lines + summary
//! ```
//!
//! Only step 3 differs between commands. The transform is chosen once per
//! batch as a [`transform::TransformSpec`] value and never changes during
//! the run.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Lists candidate files in the source directory, filtered by extension |
//! | [`naming`] | Derives output paths (prefix, suffix, subfolder, forced extension) |
//! | [`transform`] | `TransformSpec`, parameter validation, the error taxonomy, and the per-image `Transformer` |
//! | [`process`] | Batch runner: state machine, progress events, cancellation, summary |
//! | [`imaging`] | Pixel work (`image` + `imageproc`), codecs, and the inference engine seam |
//! | [`config`] | Optional `imgbatch.toml` loading, validation, and merging |
//! | [`output`] | CLI output formatting for progress and summaries |
//!
//! # Design Decisions
//!
//! ## Per-File Failures Never Stop a Batch
//!
//! A corrupt file in a folder of hundreds should cost one line in the
//! summary, not the whole run. Only setup errors (missing folder, bad
//! parameters) abort, and they do so before any file is touched. Per-file
//! errors are kept with their message so the summary can say *why* each
//! failure happened.
//!
//! ## Sequential Files, Background Thread
//!
//! Files are processed one at a time on a single background thread, which
//! keeps progress strictly ordered and makes cancellation simple: a flag
//! checked between files. The pixel operations themselves use `rayon`
//! internally where it pays off.
//!
//! ## Inference Behind a Trait
//!
//! Background removal needs a segmentation model. The pipeline only knows
//! the [`imaging::InferenceEngine`] trait; the ONNX Runtime implementation
//! lives behind the `onnx` cargo feature so the default build has no native
//! dependencies. Engines may return a decoded image, encoded bytes, or a raw
//! pixel array; [`imaging::normalize`] turns all three into one saveable
//! form.
//!
//! ## Never Overwrite the Source
//!
//! Every output lands in a subfolder or under a changed file name. A naming
//! policy that would map a file onto itself is rejected at setup.

pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod process;
pub mod scan;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_helpers;
