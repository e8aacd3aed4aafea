//! Progress-callback trait for per-file job events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline finishes each file.
//!
//! The pipeline exposes plain callbacks rather than any UI reactivity: a
//! terminal progress bar, a channel, or a test recorder can all sit behind
//! the same trait. Progress is reported after every individual file, not per
//! batch, so long batches still move the bar.
//!
//! # Example
//!
//! ```rust
//! use docshift::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total: usize, output_name: &str, fraction: f64) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} ({:.0}%)", index + 1, total, output_name, fraction * 100.0);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Called by the conversion and merge pipelines as they process files.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// Files within a batch are transcoded concurrently, so `on_file_start`,
/// `on_file_complete` and `on_file_error` may interleave. Implementations
/// must protect shared mutable state (`Mutex`, atomics).
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first batch starts.
    fn on_job_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when a batch is about to be dispatched.
    ///
    /// * `batch_index`: 0-based batch number
    /// * `batch_count`: number of batches in the job
    /// * `files`: number of files in this batch
    fn on_batch_start(&self, batch_index: usize, batch_count: usize, files: usize) {
        let _ = (batch_index, batch_count, files);
    }

    /// Called just before a file is handed to the transcoder.
    ///
    /// * `index`: 0-based position in the job snapshot
    fn on_file_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called after a file was transcoded and exported.
    ///
    /// * `fraction`: `completed / total` after this file, in `0.0..=1.0`
    fn on_file_complete(&self, index: usize, total: usize, output_name: &str, fraction: f64) {
        let _ = (index, total, output_name, fraction);
    }

    /// Called when an HTML file could not be rasterised and was converted
    /// through the markup-stripping fallback instead.
    fn on_file_degraded(&self, index: usize, name: &str, reason: &str) {
        let _ = (index, name, reason);
    }

    /// Called when a file fails.
    fn on_file_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let _ = (index, total, name, error);
    }

    /// Called once when the job settles, successfully or not.
    ///
    /// * `success_count`: files that were converted and exported
    fn on_job_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Completed/total counter of one job.
///
/// `completed` only ever increases and never exceeds `total`.
#[derive(Debug)]
pub struct JobProgress {
    completed: AtomicUsize,
    total: usize,
}

impl JobProgress {
    pub fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
        }
    }

    /// Record one finished file and return the new fraction.
    pub fn advance(&self) -> f64 {
        let total = self.total;
        let done = self
            .completed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
                Some((c + 1).min(total))
            })
            .map(|prev| (prev + 1).min(total))
            .unwrap_or(total);
        Self::ratio(done, total)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Current `completed / total`; an empty job counts as finished.
    pub fn fraction(&self) -> f64 {
        Self::ratio(self.completed(), self.total)
    }

    fn ratio(done: usize, total: usize) -> f64 {
        if total == 0 {
            1.0
        } else {
            done as f64 / total as f64
        }
    }
}
