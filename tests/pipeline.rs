//! End-to-end batch runs against real temp directories.
//!
//! Everything here goes through the public library API only: build a
//! `BatchJob`, run it, then look at the files it left behind.

use image::{DynamicImage, GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};
use imgbatch::imaging::{
    EnhanceFactors, ImageRepresentation, InferenceEngine, InferenceError, InferenceSession,
    RemovalOptions, ResizeParams, RotateConvertParams,
};
use imgbatch::naming::ensure_directory;
use imgbatch::process::{self, BatchEvent, BatchJob, BatchOutcome, CancelToken, FileStatus};
use imgbatch::scan::{self, ExtensionSet};
use imgbatch::transform::TransformSpec;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 90])
    });
    img.save(&path).unwrap();
    path
}

fn write_corrupt(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"not an image at all").unwrap();
    path
}

fn run(job: &BatchJob) -> process::BatchSummary {
    process::run(job, None, None, &CancelToken::new()).unwrap()
}

/// Answers with a raw RGBA pixel array: left half opaque, right half
/// transparent.
struct HalfMaskEngine;

struct HalfMaskSession;

impl InferenceEngine for HalfMaskEngine {
    fn load_session(&self, _model: &str) -> Result<Box<dyn InferenceSession>, InferenceError> {
        Ok(Box::new(HalfMaskSession))
    }
}

impl InferenceSession for HalfMaskSession {
    fn infer(
        &mut self,
        image: &RgbaImage,
        _options: &RemovalOptions,
    ) -> Result<ImageRepresentation, InferenceError> {
        let (w, h) = image.dimensions();
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                let Rgba([r, g, b, _]) = *image.get_pixel(x, y);
                let alpha = if x < w / 2 { 255 } else { 0 };
                data.extend_from_slice(&[r, g, b, alpha]);
            }
        }
        Ok(ImageRepresentation::PixelArray {
            shape: vec![h as usize, w as usize, 4],
            data,
        })
    }
}

// =========================================================================
// Scan
// =========================================================================

#[test]
fn enumerate_filters_by_extension() {
    let tmp = TempDir::new().unwrap();
    write_png(tmp.path(), "a.png", 4, 4);
    std::fs::write(tmp.path().join("b.txt"), "notes").unwrap();
    write_png(tmp.path(), "c.jpg", 4, 4);

    let files = scan::enumerate(tmp.path(), &ExtensionSet::standard()).unwrap();
    let names: Vec<_> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.png", "c.jpg"]);
}

#[test]
fn ensure_directory_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("x/y");
    ensure_directory(&dir).unwrap();
    ensure_directory(&dir).unwrap();
    assert!(dir.is_dir());
}

// =========================================================================
// Transforms
// =========================================================================

#[test]
fn resize_writes_exact_dimensions() {
    let tmp = TempDir::new().unwrap();
    write_png(tmp.path(), "photo.png", 200, 200);
    let job = BatchJob::new(tmp.path(), TransformSpec::Resize(ResizeParams::new(100, 50)));

    let summary = run(&job);
    assert_eq!(summary.succeeded, 1);
    let out = tmp.path().join("resized/photo.png");
    assert_eq!(image::image_dimensions(&out).unwrap(), (100, 50));
}

#[test]
fn convert_rotates_quarter_turn_and_flattens_jpeg() {
    let tmp = TempDir::new().unwrap();
    let rgba = RgbaImage::from_pixel(30, 20, Rgba([10, 20, 30, 0]));
    rgba.save(tmp.path().join("wide.png")).unwrap();

    let mut params = RotateConvertParams::new("jpg");
    params.rotate_degrees = Some(90.0);
    let job = BatchJob::new(tmp.path(), TransformSpec::RotateConvert(params));

    let summary = run(&job);
    assert_eq!(summary.succeeded, 1);
    let out = tmp.path().join("output/wide.jpg");
    let img = image::open(&out).unwrap();
    assert_eq!(img.dimensions(), (20, 30));
    assert!(!img.color().has_alpha());
    // fully transparent input lands on white
    let px = img.to_rgb8().get_pixel(10, 15).0;
    assert!(px.iter().all(|&c| c > 240), "expected white, got {:?}", px);
}

#[test]
fn enhance_identity_leaves_pixels_alone() {
    let tmp = TempDir::new().unwrap();
    let src = write_png(tmp.path(), "p.png", 16, 12);
    let job = BatchJob::new(tmp.path(), TransformSpec::Enhance(EnhanceFactors::default()));

    let summary = run(&job);
    assert_eq!(summary.succeeded, 1);
    let out = tmp.path().join("enhanced_images/enhanced_p.png");
    assert_eq!(
        image::open(&out).unwrap().to_rgb8(),
        image::open(&src).unwrap().to_rgb8()
    );
}

#[test]
fn background_removal_with_pixel_array_engine() {
    let tmp = TempDir::new().unwrap();
    write_png(tmp.path(), "x.png", 10, 6);
    let job = BatchJob::new(
        tmp.path(),
        TransformSpec::BackgroundRemoval(RemovalOptions::default()),
    );

    let summary = process::run(&job, Some(Box::new(HalfMaskEngine)), None, &CancelToken::new())
        .unwrap();
    assert_eq!(summary.succeeded, 1);

    let out = image::open(tmp.path().join("x_nobg.png")).unwrap();
    assert_eq!(out.dimensions(), (10, 6));
    let rgba = out.to_rgba8();
    assert_eq!(rgba.get_pixel(0, 0).0[3], 255);
    assert_eq!(rgba.get_pixel(9, 0).0[3], 0);
}

// =========================================================================
// Batch behaviour
// =========================================================================

#[test]
fn corrupt_file_in_the_middle_is_reported_and_skipped() {
    let tmp = TempDir::new().unwrap();
    write_png(tmp.path(), "1.png", 20, 20);
    write_corrupt(tmp.path(), "2.png");
    write_png(tmp.path(), "3.png", 20, 20);
    let job = BatchJob::new(tmp.path(), TransformSpec::Resize(ResizeParams::new(5, 5)));

    let summary = run(&job);
    let statuses: Vec<_> = summary.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![FileStatus::Success, FileStatus::Failure, FileStatus::Success]
    );
    assert_eq!((summary.succeeded, summary.failed), (2, 1));
    assert!(summary.results[1].error.as_deref().unwrap_or("").contains("2.png"));
    assert!(!tmp.path().join("resized/2.png").exists());
}

#[test]
fn spawned_batch_streams_ordered_progress() {
    let tmp = TempDir::new().unwrap();
    for name in ["a.png", "b.png", "c.png"] {
        write_png(tmp.path(), name, 8, 8);
    }
    let job = BatchJob::new(tmp.path(), TransformSpec::Resize(ResizeParams::new(4, 4)));

    let batch = process::spawn(job, None, CancelToken::new());
    let indices: Vec<usize> = batch
        .events
        .iter()
        .filter_map(|e| match e {
            BatchEvent::FileProcessed { index, .. } => Some(index),
            _ => None,
        })
        .collect();
    let summary = batch.join().unwrap();

    assert_eq!(indices, vec![1, 2, 3]);
    assert_eq!(summary.outcome, BatchOutcome::Completed);
}

#[test]
fn cancel_before_first_file_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    write_png(tmp.path(), "a.png", 8, 8);
    write_png(tmp.path(), "b.png", 8, 8);
    let job = BatchJob::new(tmp.path(), TransformSpec::Resize(ResizeParams::new(4, 4)));
    let cancel = CancelToken::new();
    cancel.cancel();

    let summary = process::run(&job, None, None, &cancel).unwrap();
    assert_eq!(summary.outcome, BatchOutcome::Aborted);
    assert_eq!(summary.processed(), 0);
    assert!(!tmp.path().join("resized/a.png").exists());
}

#[test]
fn missing_source_directory_is_a_setup_error() {
    let tmp = TempDir::new().unwrap();
    let job = BatchJob::new(
        tmp.path().join("nope"),
        TransformSpec::Resize(ResizeParams::new(4, 4)),
    );
    let result = process::run(&job, None, None, &CancelToken::new());
    assert!(matches!(
        result,
        Err(process::BatchError::DirectoryNotFound(_))
    ));
}

#[test]
fn jpeg_sources_convert_to_png() {
    let tmp = TempDir::new().unwrap();
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 8, Rgb([200, 10, 10])));
    img.save(tmp.path().join("shot.jpg")).unwrap();
    let job = BatchJob::new(
        tmp.path(),
        TransformSpec::RotateConvert(RotateConvertParams::new("png")),
    );

    let summary = run(&job);
    assert_eq!(summary.succeeded, 1);
    let out = tmp.path().join("output/shot.png");
    assert_eq!(image::image_dimensions(&out).unwrap(), (12, 8));
}
