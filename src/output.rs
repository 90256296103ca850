//! CLI output formatting for batch runs.
//!
//! # Output Format
//!
//! ## Progress
//!
//! ```text
//! Processing 3 images → photos/resized
//! [1/3] a.png → photos/resized/a.png
//! [2/3] b.png FAILED: cannot decode image: photos/b.png: ...
//! [3/3] c.png → photos/resized/c.png
//! ```
//!
//! ## Summary
//!
//! ```text
//! Done: 2 succeeded, 1 failed (3 total)
//! Failed:
//!     b.png: cannot decode image: photos/b.png: ...
//! Output: photos/resized
//! ```
//!
//! A run that found nothing prints a single "No image files" line instead.
//!
//! # Architecture
//!
//! Output is built by `format_*` functions (returning `Vec<String>`) for
//! testability; `print_event` writes one event to stdout. Format
//! functions are pure.

use crate::process::{BatchEvent, BatchOutcome, BatchSummary, FileResult};

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}

fn result_line(index: usize, total: usize, result: &FileResult) -> String {
    let name = result.file_name();
    match (&result.output, &result.error) {
        (_, Some(err)) => format!("[{}/{}] {} FAILED: {}", index, total, name, err),
        (Some(out), None) => format!("[{}/{}] {} → {}", index, total, name, out.display()),
        (None, None) => format!("[{}/{}] {}", index, total, name),
    }
}

/// Format a single progress event as display lines.
pub fn format_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Started { total, output_dir } => vec![format!(
            "Processing {} → {}",
            plural(*total, "image", "images"),
            output_dir.display()
        )],
        BatchEvent::FileProcessed {
            index,
            total,
            result,
        } => vec![result_line(*index, *total, result)],
        BatchEvent::Cancelled { processed, total } => vec![format!(
            "Cancelled after {} of {}",
            processed,
            plural(*total, "file", "files")
        )],
        BatchEvent::Finished(summary) => format_summary(summary),
    }
}

/// Format the end-of-run summary.
///
/// Every failed file is listed with its error, not just counted.
pub fn format_summary(summary: &BatchSummary) -> Vec<String> {
    if summary.total_candidates == 0 {
        return vec![format!(
            "No image files ({}) found in {}",
            summary
                .extensions
                .iter()
                .map(|e| format!(".{}", e))
                .collect::<Vec<_>>()
                .join(", "),
            summary.source_dir.display()
        )];
    }

    let mut lines = Vec::new();
    match summary.outcome {
        BatchOutcome::Completed => lines.push(format!(
            "Done: {} succeeded, {} failed ({} total)",
            summary.succeeded, summary.failed, summary.total_candidates
        )),
        BatchOutcome::Aborted => lines.push(format!(
            "Cancelled: {} succeeded, {} failed, {} not processed ({} total)",
            summary.succeeded,
            summary.failed,
            summary.total_candidates - summary.processed(),
            summary.total_candidates
        )),
    }

    if summary.failed > 0 {
        lines.push("Failed:".to_string());
        for result in summary.failures() {
            lines.push(format!(
                "    {}: {}",
                result.file_name(),
                result.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }
    if summary.succeeded > 0 {
        lines.push(format!("Output: {}", summary.output_dir.display()));
    }
    lines
}

pub fn print_event(event: &BatchEvent) {
    for line in format_event(event) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::FileStatus;
    use std::path::PathBuf;

    fn ok(name: &str) -> FileResult {
        FileResult {
            input: PathBuf::from(format!("photos/{}", name)),
            output: Some(PathBuf::from(format!("photos/resized/{}", name))),
            status: FileStatus::Success,
            error_kind: None,
            error: None,
        }
    }

    fn failed(name: &str, err: &str) -> FileResult {
        FileResult {
            input: PathBuf::from(format!("photos/{}", name)),
            output: Some(PathBuf::from(format!("photos/resized/{}", name))),
            status: FileStatus::Failure,
            error_kind: Some("DecodeFailure".to_string()),
            error: Some(err.to_string()),
        }
    }

    fn summary(results: Vec<FileResult>, total: usize, outcome: BatchOutcome) -> BatchSummary {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        BatchSummary {
            transform: "resize".to_string(),
            source_dir: PathBuf::from("photos"),
            output_dir: PathBuf::from("photos/resized"),
            extensions: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
            total_candidates: total,
            succeeded,
            failed: results.len() - succeeded,
            outcome,
            results,
        }
    }

    // =========================================================================
    // Events
    // =========================================================================

    #[test]
    fn format_started() {
        let event = BatchEvent::Started {
            total: 3,
            output_dir: PathBuf::from("photos/resized"),
        };
        assert_eq!(format_event(&event), vec!["Processing 3 images → photos/resized"]);
    }

    #[test]
    fn format_started_singular() {
        let event = BatchEvent::Started {
            total: 1,
            output_dir: PathBuf::from("out"),
        };
        assert_eq!(format_event(&event), vec!["Processing 1 image → out"]);
    }

    #[test]
    fn format_file_success() {
        let event = BatchEvent::FileProcessed {
            index: 1,
            total: 3,
            result: ok("a.png"),
        };
        assert_eq!(format_event(&event), vec!["[1/3] a.png → photos/resized/a.png"]);
    }

    #[test]
    fn format_file_failure() {
        let event = BatchEvent::FileProcessed {
            index: 2,
            total: 3,
            result: failed("b.png", "cannot decode image: bad header"),
        };
        assert_eq!(
            format_event(&event),
            vec!["[2/3] b.png FAILED: cannot decode image: bad header"]
        );
    }

    #[test]
    fn format_cancelled() {
        let event = BatchEvent::Cancelled {
            processed: 1,
            total: 3,
        };
        assert_eq!(format_event(&event), vec!["Cancelled after 1 of 3 files"]);
    }

    #[test]
    fn format_finished_is_summary() {
        let s = summary(vec![ok("a.png")], 1, BatchOutcome::Completed);
        assert_eq!(format_event(&BatchEvent::Finished(s.clone())), format_summary(&s));
    }

    // =========================================================================
    // Summary
    // =========================================================================

    #[test]
    fn summary_all_succeeded() {
        let s = summary(vec![ok("a.png"), ok("c.png")], 2, BatchOutcome::Completed);
        assert_eq!(
            format_summary(&s),
            vec![
                "Done: 2 succeeded, 0 failed (2 total)",
                "Output: photos/resized"
            ]
        );
    }

    #[test]
    fn summary_lists_failures() {
        let s = summary(
            vec![ok("a.png"), failed("b.png", "corrupt"), ok("c.png")],
            3,
            BatchOutcome::Completed,
        );
        assert_eq!(
            format_summary(&s),
            vec![
                "Done: 2 succeeded, 1 failed (3 total)",
                "Failed:",
                "    b.png: corrupt",
                "Output: photos/resized",
            ]
        );
    }

    #[test]
    fn summary_all_failed_has_no_output_line() {
        let s = summary(vec![failed("b.png", "corrupt")], 1, BatchOutcome::Completed);
        let lines = format_summary(&s);
        assert!(!lines.iter().any(|l| l.starts_with("Output:")));
    }

    #[test]
    fn summary_cancelled_counts_remaining() {
        let s = summary(vec![ok("a.png")], 3, BatchOutcome::Aborted);
        assert_eq!(
            format_summary(&s)[0],
            "Cancelled: 1 succeeded, 0 failed, 2 not processed (3 total)"
        );
    }

    #[test]
    fn summary_nothing_found() {
        let s = summary(vec![], 0, BatchOutcome::Completed);
        assert_eq!(
            format_summary(&s),
            vec!["No image files (.png, .jpg, .jpeg) found in photos"]
        );
    }
}
