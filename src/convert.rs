//! Batch conversion: many files, bounded concurrency, per-file export.
//!
//! A job snapshots its input, splits it into batches of
//! `config.batch_size`, and runs the batches strictly in sequence with
//! `config.batch_delay()` between them. Files inside a batch are transcoded
//! concurrently and every file is exported the moment it is done, so a job
//! that aborts in batch three has already delivered batches one and two.
//! Exports run on the blocking pool, like transcoding itself.

use crate::config::{ConversionMode, FailurePolicy, OutputFormat};
use crate::error::{DocShiftError, FileFailure};
use crate::export::{output_file_name, ArtifactSink};
use crate::file::PendingFile;
use crate::output::{ExportedArtifact, Fallback, JobSummary};
use crate::progress::{ConversionProgressCallback, JobProgress};
use crate::queue::FileQueue;
use crate::transcode::{run_blocking, Transcoder};
use futures::future::join_all;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Split `len` items into contiguous ranges of at most `size`.
pub fn batches(len: usize, size: usize) -> Vec<Range<usize>> {
    let size = size.max(1);
    (0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect()
}

/// Convert every file in `files` and hand each artifact to `sink`.
///
/// # Errors
/// * `FailurePolicy::AbortJob`: the first failing file of the failing
///   batch, as [`DocShiftError::FileFailed`]. The batch itself is allowed to
///   settle; no later batch starts.
/// * `FailurePolicy::ContinueOnError`: [`DocShiftError::PartialFailure`]
///   only when every file failed; otherwise failures are listed in the
///   summary.
pub async fn convert_files(
    files: &[PendingFile],
    mode: ConversionMode,
    format: OutputFormat,
    transcoder: &Transcoder,
    sink: Arc<dyn ArtifactSink>,
) -> Result<JobSummary, DocShiftError> {
    let start = Instant::now();
    let config = transcoder.config();
    let snapshot: Vec<PendingFile> = files.to_vec();
    let total = snapshot.len();
    let cb = config.progress_callback.as_deref();
    let output_format = match mode {
        ConversionMode::ToPdf => None,
        ConversionMode::FromPdf => Some(format),
    };

    let ranges = batches(total, config.batch_size);
    info!(
        "Starting {} job: {} files in {} batches",
        mode,
        total,
        ranges.len()
    );
    if let Some(cb) = cb {
        cb.on_job_start(total);
    }

    let progress = JobProgress::new(total);
    let mut exported: Vec<ExportedArtifact> = Vec::with_capacity(total);
    let mut failures: Vec<FileFailure> = Vec::new();

    for (batch_idx, range) in ranges.iter().enumerate() {
        if batch_idx > 0 {
            tokio::time::sleep(config.batch_delay()).await;
        }
        debug!("Batch {}/{}: files {:?}", batch_idx + 1, ranges.len(), range);
        if let Some(cb) = cb {
            cb.on_batch_start(batch_idx, ranges.len(), range.len());
        }

        let jobs = range.clone().map(|index| {
            convert_one(
                index,
                total,
                &snapshot[index],
                mode,
                format,
                transcoder,
                &sink,
                &progress,
                cb,
            )
        });
        let results = join_all(jobs).await;

        let mut abort: Option<(usize, DocShiftError)> = None;
        for (index, result) in range.clone().zip(results) {
            match result {
                Ok(artifact) => exported.push(artifact),
                Err(e) => {
                    let name = snapshot[index].name().to_string();
                    warn!("'{}' failed: {}", name, e);
                    match config.failure_policy {
                        FailurePolicy::AbortJob => {
                            if abort.is_none() {
                                abort = Some((index, e));
                            }
                        }
                        FailurePolicy::ContinueOnError => failures.push(FileFailure {
                            index,
                            name,
                            error: e.to_string(),
                        }),
                    }
                }
            }
        }

        if let Some((index, e)) = abort {
            if let Some(cb) = cb {
                cb.on_job_complete(total, exported.len());
            }
            info!(
                "Job aborted at '{}' after {} of {} files",
                snapshot[index].name(),
                exported.len(),
                total
            );
            return Err(e.for_file(snapshot[index].name()));
        }
    }

    if let Some(cb) = cb {
        cb.on_job_complete(total, exported.len());
    }

    if total > 0 && failures.len() == total {
        let first_error = failures
            .first()
            .map(|f| format!("{}: {}", f.name, f.error))
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(DocShiftError::PartialFailure { total, first_error });
    }

    let summary = JobSummary {
        mode,
        output_format,
        total_files: total,
        exported,
        failures,
        batches: ranges.len(),
        total_duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Job complete: {} in {}ms",
        summary.message(),
        summary.total_duration_ms
    );
    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
async fn convert_one(
    index: usize,
    total: usize,
    file: &PendingFile,
    mode: ConversionMode,
    format: OutputFormat,
    transcoder: &Transcoder,
    sink: &Arc<dyn ArtifactSink>,
    progress: &JobProgress,
    cb: Option<&dyn ConversionProgressCallback>,
) -> Result<ExportedArtifact, DocShiftError> {
    if let Some(cb) = cb {
        cb.on_file_start(index, total, file.name());
    }

    let outcome = async {
        let out = transcoder.transcode(file, mode, format).await?;
        let name = output_file_name(file.name(), mode, format);
        let size = out.bytes.len();
        let (sink, target, bytes) = (Arc::clone(sink), name.clone(), out.bytes);
        run_blocking("Export", move || sink.export(&target, &bytes)).await?;
        Ok::<_, DocShiftError>((name, size, out.fallback))
    }
    .await;

    let (name, size, fallback) = match outcome {
        Ok(v) => v,
        Err(e) => {
            if let Some(cb) = cb {
                cb.on_file_error(index, total, file.name(), &e.to_string());
            }
            return Err(e);
        }
    };

    if let (Some(cb), Some(Fallback::MarkupStripped { reason })) = (cb, &fallback) {
        cb.on_file_degraded(index, file.name(), reason);
    }
    let fraction = progress.advance();
    debug!("'{}' → '{}' ({} bytes, {:.0}%)", file.name(), name, size, fraction * 100.0);
    if let Some(cb) = cb {
        cb.on_file_complete(index, total, &name, fraction);
    }

    Ok(ExportedArtifact {
        index,
        source: file.name().to_string(),
        name,
        bytes: size,
        fallback,
    })
}

/// Run [`convert_files`] on a snapshot of `queue`.
///
/// The queue is busy for the duration of the job. The converted files leave
/// the queue only when every one of them succeeded; files added meanwhile
/// stay queued.
pub async fn convert_queue(
    queue: &FileQueue,
    mode: ConversionMode,
    format: OutputFormat,
    transcoder: &Transcoder,
    sink: Arc<dyn ArtifactSink>,
) -> Result<JobSummary, DocShiftError> {
    let guard = queue.begin_job()?;
    let summary = convert_files(guard.snapshot(), mode, format, transcoder, sink).await?;
    if summary.is_complete() {
        guard.finish_and_clear();
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_preserve_order_and_bound_size() {
        assert_eq!(batches(7, 3), vec![0..3, 3..6, 6..7]);
        assert_eq!(batches(3, 3), vec![0..3]);
        assert!(batches(0, 3).is_empty());
        assert_eq!(batches(2, 0), vec![0..1, 1..2]);
    }
}
