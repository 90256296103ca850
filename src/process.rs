//! Batch execution.
//!
//! Runs one [`TransformSpec`] over every candidate file of a source
//! directory:
//!
//! ```text
//! Idle ──validate──▶ Enumerating ──files──▶ Processing ──last file──▶ Completed
//!   ▲                    │                      │
//!   └── setup error ◀────┘                      └── cancel ──▶ Aborted
//!                        └── no files ──▶ Completed (0 candidates)
//! ```
//!
//! ## Failure policy
//!
//! Setup problems (missing directory, bad parameters, output directory that
//! cannot be created) abort the run before any file is touched and come
//! back as a [`BatchError`]. Everything that goes wrong with a single file
//! (decode, transform, inference, save) is recorded in that file's
//! [`FileResult`] and the batch moves on.
//!
//! ## Progress and cancellation
//!
//! Files are processed strictly in order, one at a time. After each file a
//! [`BatchEvent::FileProcessed`] goes out on the optional channel, with
//! indices counting up from 1. A [`CancelToken`] is checked before every
//! file; once set, the run stops there and reports what it finished. Files
//! already written stay in place.
//!
//! [`spawn`] runs the whole thing on a background thread so an interactive
//! front-end stays responsive.

use crate::imaging::{InferenceEngine, Quality, load_image, save_output};
use crate::naming::{NamingError, NamingPolicy, OutputFormat, OutputPathResolver};
use crate::scan::{self, ExtensionSet, ScanError};
use crate::transform::{TransformError, TransformSpec, Transformer};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::thread::JoinHandle;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("batch worker panicked")]
    WorkerPanicked,
}

impl From<ScanError> for BatchError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::DirectoryNotFound(path) => BatchError::DirectoryNotFound(path),
            ScanError::Io(e) => BatchError::Io(e),
        }
    }
}

impl From<TransformError> for BatchError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::DirectoryNotFound(path) => BatchError::DirectoryNotFound(path),
            TransformError::InvalidParameter(msg) => BatchError::InvalidParameter(msg),
            other => BatchError::InvalidParameter(other.to_string()),
        }
    }
}

impl From<NamingError> for BatchError {
    fn from(err: NamingError) -> Self {
        match err {
            NamingError::Io(e) => BatchError::Io(e),
            other => BatchError::InvalidParameter(other.to_string()),
        }
    }
}

/// Everything one batch run needs. Immutable for the run's duration.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub source_dir: PathBuf,
    pub spec: TransformSpec,
    pub naming: NamingPolicy,
    pub extensions: ExtensionSet,
    pub jpeg_quality: Quality,
}

impl BatchJob {
    /// A job using the transform's default naming and extensions.
    pub fn new(source_dir: impl Into<PathBuf>, spec: TransformSpec) -> Self {
        Self {
            source_dir: source_dir.into(),
            naming: spec.default_naming(),
            extensions: spec.default_extensions(),
            jpeg_quality: Quality::default(),
            spec,
        }
    }

    fn resolver(&self) -> OutputPathResolver {
        OutputPathResolver::new(&self.source_dir, self.naming.clone(), self.spec.output_format())
    }

    /// Setup checks that need no file I/O.
    fn validate(&self) -> Result<(), BatchError> {
        self.spec.validate()?;
        if self.naming.is_identity() && self.spec.output_format() == OutputFormat::Preserve {
            return Err(BatchError::InvalidParameter(
                "naming policy needs a prefix, suffix or subfolder: outputs would overwrite the sources"
                    .to_string(),
            ));
        }
        if self.extensions.is_empty() {
            return Err(BatchError::InvalidParameter(
                "no file extensions to scan for".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Success,
    Failure,
}

/// Outcome for one input file. Never modified once recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileResult {
    pub input: PathBuf,
    /// Where the output was (or would have been) written.
    pub output: Option<PathBuf>,
    pub status: FileStatus,
    /// Error label, e.g. `DecodeFailure`. Present iff the file failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Human-readable error. Present iff the file failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileResult {
    fn success(input: &Path, output: PathBuf) -> Self {
        Self {
            input: input.to_path_buf(),
            output: Some(output),
            status: FileStatus::Success,
            error_kind: None,
            error: None,
        }
    }

    fn failure(input: &Path, output: Option<PathBuf>, err: &TransformError) -> Self {
        Self {
            input: input.to_path_buf(),
            output,
            status: FileStatus::Failure,
            error_kind: Some(err.kind().to_string()),
            error: Some(err.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FileStatus::Success
    }

    /// File name of the input, for display.
    pub fn file_name(&self) -> String {
        self.input
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.display().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOutcome {
    Completed,
    Aborted,
}

/// Final report of a batch run.
///
/// After a completed run `succeeded + failed == total_candidates`. An aborted
/// run reports only the files it got to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub transform: String,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub extensions: Vec<String>,
    pub total_candidates: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcome: BatchOutcome,
    pub results: Vec<FileResult>,
}

impl BatchSummary {
    fn new(job: &BatchJob, output_dir: &Path, total: usize) -> Self {
        Self {
            transform: job.spec.name().to_string(),
            source_dir: job.source_dir.clone(),
            output_dir: output_dir.to_path_buf(),
            extensions: job.extensions.iter().map(String::from).collect(),
            total_candidates: total,
            succeeded: 0,
            failed: 0,
            outcome: BatchOutcome::Completed,
            results: Vec::new(),
        }
    }

    fn record(&mut self, result: FileResult) {
        match result.status {
            FileStatus::Success => self.succeeded += 1,
            FileStatus::Failure => self.failed += 1,
        }
        self.results.push(result);
    }

    pub fn processed(&self) -> usize {
        self.results.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

/// Progress events sent while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// Candidates found; processing is about to begin.
    Started { total: usize, output_dir: PathBuf },
    /// One file finished (either way). `index` counts from 1.
    FileProcessed {
        index: usize,
        total: usize,
        result: FileResult,
    },
    /// Cancellation observed before file `processed + 1`.
    Cancelled { processed: usize, total: usize },
    /// The run is over.
    Finished(BatchSummary),
}

/// Cooperative cancellation flag, checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run `job` on the current thread.
///
/// `engine` is only used by background removal; the session is loaded on the
/// first file that needs it.
pub fn run(
    job: &BatchJob,
    engine: Option<Box<dyn InferenceEngine>>,
    events: Option<Sender<BatchEvent>>,
    cancel: &CancelToken,
) -> Result<BatchSummary, BatchError> {
    job.validate()?;
    let files = scan::enumerate(&job.source_dir, &job.extensions)?;
    let resolver = job.resolver();
    let total = files.len();
    let mut summary = BatchSummary::new(job, resolver.output_dir(), total);

    let emit = |event: BatchEvent| {
        if let Some(tx) = &events {
            tx.send(event).ok();
        }
    };

    if files.is_empty() {
        log::info!(
            "No files matching {} in {}",
            job.extensions,
            job.source_dir.display()
        );
        emit(BatchEvent::Finished(summary.clone()));
        return Ok(summary);
    }

    resolver.prepare()?;
    log::info!(
        "{}: {} file(s) from {} into {}",
        job.spec.name(),
        total,
        job.source_dir.display(),
        resolver.output_dir().display()
    );
    emit(BatchEvent::Started {
        total,
        output_dir: resolver.output_dir().to_path_buf(),
    });

    let mut transformer = Transformer::new(engine);
    for (i, input) in files.iter().enumerate() {
        if cancel.is_cancelled() {
            log::info!("Cancelled after {} of {} file(s)", i, total);
            summary.outcome = BatchOutcome::Aborted;
            emit(BatchEvent::Cancelled {
                processed: i,
                total,
            });
            break;
        }

        let result = process_file(job, &resolver, &mut transformer, input);
        emit(BatchEvent::FileProcessed {
            index: i + 1,
            total,
            result: result.clone(),
        });
        summary.record(result);
    }

    log::info!(
        "{}: {} succeeded, {} failed",
        job.spec.name(),
        summary.succeeded,
        summary.failed
    );
    emit(BatchEvent::Finished(summary.clone()));
    Ok(summary)
}

fn process_file(
    job: &BatchJob,
    resolver: &OutputPathResolver,
    transformer: &mut Transformer,
    input: &Path,
) -> FileResult {
    log::debug!("Processing {}", input.display());
    let output = match resolver.resolve(input) {
        Ok(path) => path,
        Err(e) => {
            let err = TransformError::SaveFailure(e.to_string());
            log::warn!("{}: {}", input.display(), err);
            return FileResult::failure(input, None, &err);
        }
    };

    let outcome = load_image(input)
        .and_then(|image| transformer.apply(&job.spec, image))
        .and_then(|result| save_output(result, &output, job.jpeg_quality));

    match outcome {
        Ok(()) => {
            log::debug!("Wrote {}", output.display());
            FileResult::success(input, output)
        }
        Err(err) => {
            log::warn!("{}: {}", input.display(), err);
            FileResult::failure(input, Some(output), &err)
        }
    }
}

/// A batch running on a background thread.
pub struct BatchHandle {
    pub events: Receiver<BatchEvent>,
    handle: JoinHandle<Result<BatchSummary, BatchError>>,
}

impl BatchHandle {
    /// Wait for the run to finish.
    pub fn join(self) -> Result<BatchSummary, BatchError> {
        self.handle.join().map_err(|_| BatchError::WorkerPanicked)?
    }
}

/// Run `job` on a new thread, streaming events back over a channel.
pub fn spawn(
    job: BatchJob,
    engine: Option<Box<dyn InferenceEngine>>,
    cancel: CancelToken,
) -> BatchHandle {
    let (tx, rx) = std::sync::mpsc::channel();
    let handle = std::thread::spawn(move || run(&job, engine, Some(tx), &cancel));
    BatchHandle { events: rx, handle }
}
