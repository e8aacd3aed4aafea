//! PDF merge by rasterisation.
//!
//! Every page of every input is rendered and placed as a full-bleed image
//! page, files in queue order and pages in document order. Pages are
//! rendered one at a time and handed straight to the composer. The result is
//! visually faithful but image-only: no text layer, links or form fields
//! survive.

use crate::config::ConversionConfig;
use crate::error::DocShiftError;
use crate::export::ArtifactSink;
use crate::file::PendingFile;
use crate::output::{MergeOutput, MergeSummary};
use crate::pipeline::compose::PdfComposer;
use crate::pipeline::render::PdfBackend;
use crate::progress::JobProgress;
use crate::queue::FileQueue;
use crate::transcode::{run_blocking, Transcoder};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Fewest files a merge accepts.
pub const MIN_MERGE_FILES: usize = 2;

/// Merge `files` into one PDF.
///
/// Pages are rendered at `config.render_scale` and each output page is
/// sized to its raster divided by that scale, so inputs with mixed page
/// sizes keep their proportions.
///
/// # Errors
/// [`DocShiftError::InsufficientInput`] before any work when fewer than two
/// files are given; otherwise any failure is returned as
/// [`DocShiftError::MergeFailed`] and no output exists.
pub async fn merge_files(
    files: &[PendingFile],
    backend: Arc<dyn PdfBackend>,
    config: &ConversionConfig,
) -> Result<MergeOutput, DocShiftError> {
    if files.len() < MIN_MERGE_FILES {
        return Err(DocShiftError::InsufficientInput {
            required: MIN_MERGE_FILES,
            got: files.len(),
        });
    }

    let start = Instant::now();
    let snapshot: Vec<PendingFile> = files.to_vec();
    let total = snapshot.len();
    let scale = config.render_scale;
    let setup = config.page_setup;
    let output_name = config.merged_file_name.clone();
    let cb = config.progress_callback.clone();
    info!("Merging {} PDFs at scale {}", total, scale);

    let merged = run_blocking("Merge", move || {
        if let Some(cb) = &cb {
            cb.on_job_start(total);
        }
        let progress = JobProgress::new(total);
        let mut composer = PdfComposer::new(&output_name);

        for (index, file) in snapshot.iter().enumerate() {
            if let Some(cb) = &cb {
                cb.on_file_start(index, total, file.name());
            }
            let rendered = backend.render_pages(file.name(), file.bytes(), scale, &mut |_, image| {
                composer.add_full_bleed_page(image, scale);
                Ok(())
            });
            let pages = match rendered {
                Ok(pages) => pages,
                Err(e) => {
                    if let Some(cb) = &cb {
                        cb.on_file_error(index, total, file.name(), &e.to_string());
                        cb.on_job_complete(total, index);
                    }
                    return Err(e.for_file(file.name()));
                }
            };
            debug!("'{}': {} pages", file.name(), pages);
            let fraction = progress.advance();
            if let Some(cb) = &cb {
                cb.on_file_complete(index, total, &output_name, fraction);
            }
        }

        let pages = composer.page_count();
        let pdf = composer.finish(setup);
        if let Some(cb) = &cb {
            cb.on_job_complete(total, total);
        }
        Ok((pdf, pages))
    })
    .await
    .map_err(|e| DocShiftError::MergeFailed(Box::new(e)))?;

    let (pdf, pages) = merged;
    let summary = MergeSummary {
        files: total,
        pages,
        output_name: None,
        bytes: pdf.len(),
        total_duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Merge complete: {} files, {} pages, {} bytes in {}ms",
        summary.files, summary.pages, summary.bytes, summary.total_duration_ms
    );
    Ok(MergeOutput { pdf, summary })
}

/// Merge a snapshot of `queue` and export the result under
/// `config.merged_file_name`. The merged files leave the queue on success.
pub async fn merge_queue(
    queue: &FileQueue,
    transcoder: &Transcoder,
    sink: Arc<dyn ArtifactSink>,
) -> Result<MergeOutput, DocShiftError> {
    let guard = queue.begin_job()?;
    let config = transcoder.config();

    let MergeOutput { pdf, mut summary } =
        merge_files(guard.snapshot(), transcoder.backend(), config).await?;
    let name = config.merged_file_name.clone();
    let target = name.clone();
    let pdf = run_blocking("Export", move || {
        sink.export(&target, &pdf)?;
        Ok(pdf)
    })
    .await?;
    summary.output_name = Some(name);
    let output = MergeOutput { pdf, summary };

    guard.finish_and_clear();
    Ok(output)
}
