//! # docshift
//!
//! Local file conversion: text, HTML and images to PDF; PDF to text, HTML
//! or page images; many PDFs merged into one; and a headless drawing board
//! exportable to PNG or PDF.
//!
//! Everything runs in-process. PDFs are generated with `printpdf`, read and
//! rendered with pdfium (`pdfium-render`), and page images are packed with
//! `zip`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! paths
//!  │
//!  ├─ 1. Intake     metadata → validate (size, type) → read → preview
//!  ├─ 2. Queue      ordered pending files, busy while a job runs
//!  ├─ 3. Batches    groups of 3, sequential, 200 ms apart
//!  ├─ 4. Transcode  files of a batch concurrently (spawn_blocking)
//!  └─ 5. Export     each artifact handed to the sink as soon as it is done
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docshift::{
//!     convert_files, load_files, ConversionConfig, ConversionMode, DirectorySink,
//!     OutputFormat, Transcoder,
//! };
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let paths = vec![PathBuf::from("notes.txt"), PathBuf::from("photo.png")];
//!     let intake = load_files(&paths, ConversionMode::ToPdf, &config).await;
//!     if let Some(notice) = intake.rejection_notice() {
//!         eprintln!("{notice}");
//!     }
//!
//!     let transcoder = Transcoder::new(config);
//!     let sink = Arc::new(DirectorySink::new("out")?);
//!     let summary = convert_files(
//!         &intake.accepted,
//!         ConversionMode::ToPdf,
//!         OutputFormat::default(),
//!         &transcoder,
//!         sink,
//!     )
//!     .await?;
//!     println!("{}", summary.message());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docshift` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ## HTML input
//!
//! Laying out HTML needs a browser engine, which this crate does not ship.
//! Inject one through [`MarkupRasterizer`]; without it HTML files are
//! converted by stripping tags and placing the remaining text, and the
//! artifact is flagged with [`Fallback::MarkupStripped`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod board;
pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod file;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod queue;
pub mod transcode;
pub mod validate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use board::{BoardAction, BoardScript, DrawingBoard};
pub use config::{
    ConversionConfig, ConversionConfigBuilder, ConversionMode, FailurePolicy, ImageBox,
    Orientation, OutputFormat, PageSetup, PaperSize, MAX_FILE_SIZE,
};
pub use convert::{convert_files, convert_queue};
pub use error::{DocShiftError, FileFailure};
pub use export::{output_file_name, ArtifactSink, DirectorySink, MemorySink};
pub use file::{InputKind, PendingFile, Preview};
pub use merge::{merge_files, merge_queue};
pub use output::{ExportedArtifact, Fallback, JobSummary, MergeOutput, MergeSummary, Transcoded};
pub use pipeline::input::{load_files, Intake, Rejection};
pub use pipeline::markup::{MarkupRasterizer, NoMarkupRasterizer};
pub use pipeline::render::{PageVisitor, PdfBackend, PdfiumBackend};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use queue::{FileQueue, JobGuard};
pub use transcode::Transcoder;
pub use validate::{
    accepted_extensions, format_file_size, mime_for_path, validate, validate_default,
    FileFacts, Validatable, ValidationResult,
};
