//! Error types for the docshift library.
//!
//! Two distinct failure shapes:
//!
//! * [`DocShiftError`] is **fatal** for the operation that returned it. A
//!   file could not be transcoded, a merge could not complete, the queue is
//!   busy. Returned as `Err(DocShiftError)` from the job entry points.
//!
//! * [`FileFailure`] is **recorded**. A single file failed while the job was
//!   allowed to continue ([`crate::config::FailurePolicy::ContinueOnError`]).
//!   Stored in [`crate::output::JobSummary`] so callers can report every
//!   failure at the end of the run.
//!
//! Validation rejects are neither: they are plain
//! [`crate::validate::ValidationResult`] values and never stop a job.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docshift library.
#[derive(Debug, Error)]
pub enum DocShiftError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The file could not be read from disk.
    #[error("File could not be read: '{path}': {source}")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input type has no to-PDF handler.
    #[error("This file type is not supported yet: '{name}' ({mime})")]
    UnsupportedFormat { name: String, mime: String },

    /// The requested from-PDF output format is not one of text, html, image.
    #[error("Invalid output format '{0}' (expected text, html or image)")]
    InvalidOutputFormat(String),

    /// A merge was requested with fewer than two files.
    #[error("At least {required} PDF files are required to merge, got {got}")]
    InsufficientInput { required: usize, got: usize },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{name}' could not be opened: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// pdfium returned an error while rendering a page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// pdfium returned an error while reading a page's text layer.
    #[error("Text extraction failed for page {page}: {detail}")]
    TextExtractionFailed { page: usize, detail: String },

    /// An input or rendered image could not be decoded or encoded.
    #[error("Image processing failed for '{name}': {detail}")]
    ImageDecodeFailed { name: String, detail: String },

    /// The output PDF could not be assembled.
    #[error("PDF generation failed: {0}")]
    ComposeFailed(String),

    /// The page-image archive could not be written.
    #[error("Archive packaging failed: {0}")]
    ArchiveFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an exported artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF reading needs the pdfium shared library. You can:\n\
  • Place libpdfium next to the executable or in the working directory.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Config / state errors ─────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The pending-file queue is locked by a running job.
    #[error("A conversion job is running; the file list cannot be changed until it finishes")]
    QueueBusy,

    /// A queue position does not exist.
    #[error("Position {index} is out of range (queue holds {len} files)")]
    IndexOutOfRange { index: usize, len: usize },

    // ── Job-level wrappers ────────────────────────────────────────────────
    /// A single file failed and the job was aborted.
    #[error("Conversion of '{name}' failed: {source}")]
    FileFailed {
        name: String,
        #[source]
        source: Box<DocShiftError>,
    },

    /// A merge failed; no output was produced.
    #[error("PDF merge failed: {0}")]
    MergeFailed(#[source] Box<DocShiftError>),

    /// Every file of a job failed.
    #[error("All {total} files failed to convert.\nFirst error: {first_error}")]
    PartialFailure { total: usize, first_error: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocShiftError {
    /// Wrap this error as the failure of the named file.
    pub fn for_file(self, name: impl Into<String>) -> Self {
        DocShiftError::FileFailed {
            name: name.into(),
            source: Box::new(self),
        }
    }
}

/// A recorded, non-fatal failure of one file within a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    /// Position of the file in the job snapshot (0-based).
    pub index: usize,
    /// Source file name.
    pub name: String,
    /// Human-readable error description.
    pub error: String,
}
