//! Integration tests for the conversion and merge pipelines.
//!
//! pdfium is replaced by a scripted backend: a fake "PDF" payload is a
//! page list such as `pages:100x80,120x60`, and a payload starting with
//! `bad` fails to open. Generated PDFs are inspected with `lopdf`.

use docshift::{
    convert_files, convert_queue, merge_files, merge_queue, ArtifactSink, ConversionConfig,
    ConversionMode, ConversionProgressCallback, DocShiftError, FailurePolicy, FileQueue,
    MemorySink, OutputFormat, PageVisitor, PdfBackend, PendingFile, Transcoder,
};
use image::{DynamicImage, Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct ScriptedBackend {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay_ms: u64,
    events: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn log(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn with_delay(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::default()
        }
    }

    fn pages(&self, name: &str, pdf: &[u8]) -> Result<Vec<(u32, u32)>, DocShiftError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if self.delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.delay_ms));
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let text = String::from_utf8_lossy(pdf);
        if text.starts_with("bad") {
            return Err(DocShiftError::CorruptPdf {
                name: name.to_string(),
                detail: "no header".into(),
            });
        }
        let spec = text.trim_start_matches("pages:");
        Ok(spec
            .split(',')
            .filter_map(|p| {
                let (w, h) = p.split_once('x')?;
                Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
            })
            .collect())
    }
}

impl PdfBackend for ScriptedBackend {
    fn page_texts(&self, name: &str, pdf: &[u8]) -> Result<Vec<Vec<String>>, DocShiftError> {
        Ok(self
            .pages(name, pdf)?
            .iter()
            .enumerate()
            .map(|(i, _)| vec![name.to_string(), format!("page {}", i + 1)])
            .collect())
    }

    fn render_pages(
        &self,
        name: &str,
        pdf: &[u8],
        scale: f32,
        visit: &mut PageVisitor<'_>,
    ) -> Result<usize, DocShiftError> {
        let pages = self.pages(name, pdf)?;
        for (idx, (w, h)) in pages.iter().enumerate() {
            let (w, h) = ((*w as f32 * scale) as u32, (*h as f32 * scale) as u32);
            let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([240, 240, 240])));
            self.log(format!("render {name}#{idx}"));
            visit(idx, image)?;
            self.log(format!("consumed {name}#{idx}"));
        }
        Ok(pages.len())
    }
}

#[derive(Default)]
struct RecordingCallback {
    batches: Mutex<Vec<usize>>,
    fractions: Mutex<Vec<f64>>,
    errors: AtomicUsize,
    degraded: AtomicUsize,
}

impl ConversionProgressCallback for RecordingCallback {
    fn on_batch_start(&self, _batch_index: usize, _batch_count: usize, files: usize) {
        self.batches.lock().unwrap().push(files);
    }

    fn on_file_complete(&self, _index: usize, _total: usize, _name: &str, fraction: f64) {
        self.fractions.lock().unwrap().push(fraction);
    }

    fn on_file_degraded(&self, _index: usize, _name: &str, _reason: &str) {
        self.degraded.fetch_add(1, Ordering::SeqCst);
    }

    fn on_file_error(&self, _index: usize, _total: usize, _name: &str, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

fn text_file(name: &str) -> PendingFile {
    PendingFile::new(name, "text/plain", format!("contents of {name}").into_bytes())
}

fn pdf_file(name: &str, spec: &str) -> PendingFile {
    PendingFile::new(name, "application/pdf", spec.as_bytes().to_vec())
}

fn transcoder(config: ConversionConfig, backend: Arc<ScriptedBackend>) -> Transcoder {
    Transcoder::new(config).with_backend(backend)
}

fn fast_config() -> ConversionConfig {
    ConversionConfig::builder().batch_delay_ms(0).build().unwrap()
}

fn media_box_widths(pdf: &[u8]) -> Vec<f32> {
    let doc = lopdf::Document::load_mem(pdf).expect("merged output is a valid PDF");
    doc.get_pages()
        .values()
        .map(|id| {
            let page = doc.get_dictionary(*id).unwrap();
            let mb = page.get(b"MediaBox").unwrap().as_array().unwrap();
            let num = |o: &lopdf::Object| o.as_float().or_else(|_| o.as_i64().map(|v| v as f32)).unwrap();
            num(&mb[2]) - num(&mb[0])
        })
        .collect()
}

// ── Batching ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn files_run_in_batches_of_three() {
    let cb = Arc::new(RecordingCallback::default());
    let backend = Arc::new(ScriptedBackend::with_delay(30));
    let config = ConversionConfig::builder()
        .batch_delay_ms(0)
        .progress_callback(cb.clone())
        .build()
        .unwrap();
    let files: Vec<_> = (0..7)
        .map(|i| pdf_file(&format!("doc{i}.pdf"), "pages:10x10"))
        .collect();
    let sink = Arc::new(MemorySink::new());

    let summary = convert_files(
        &files,
        ConversionMode::FromPdf,
        OutputFormat::Text,
        &transcoder(config, backend.clone()),
        sink.clone(),
    )
    .await
    .unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(*cb.batches.lock().unwrap(), vec![3, 3, 1]);
    assert!(backend.max_in_flight.load(Ordering::SeqCst) <= 3);
    assert_eq!(sink.len(), 7);
}

#[tokio::test(start_paused = true)]
async fn batches_are_spaced_by_the_delay() {
    let files: Vec<_> = (0..7).map(|i| text_file(&format!("n{i}.txt"))).collect();
    let sink = Arc::new(MemorySink::new());
    let t = Transcoder::new(ConversionConfig::default());

    let start = tokio::time::Instant::now();
    convert_files(&files, ConversionMode::ToPdf, OutputFormat::default(), &t, sink.clone())
        .await
        .unwrap();
    // Three batches, two gaps of 200 ms.
    assert!(start.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_one() {
    let cb = Arc::new(RecordingCallback::default());
    let config = ConversionConfig::builder()
        .batch_delay_ms(0)
        .progress_callback(cb.clone())
        .build()
        .unwrap();
    let files: Vec<_> = (0..5).map(|i| text_file(&format!("n{i}.txt"))).collect();

    convert_files(
        &files,
        ConversionMode::ToPdf,
        OutputFormat::default(),
        &Transcoder::new(config),
        Arc::new(MemorySink::new()),
    )
    .await
    .unwrap();

    let fractions = cb.fractions.lock().unwrap().clone();
    assert_eq!(fractions.len(), 5);
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]), "{fractions:?}");
    assert_eq!(*fractions.last().unwrap(), 1.0);
}

// ── Output naming and content ───────────────────────────────────────────────

#[tokio::test]
async fn artifacts_are_named_from_their_sources() {
    let sink = Arc::new(MemorySink::new());
    let t = transcoder(fast_config(), Arc::new(ScriptedBackend::default()));
    convert_files(
        &[pdf_file("scan.pdf", "pages:10x10,10x10")],
        ConversionMode::FromPdf,
        OutputFormat::Html,
        &t,
        sink.clone(),
    )
    .await
    .unwrap();

    let html = String::from_utf8(sink.get("scan.html").expect("scan.html exported")).unwrap();
    assert!(html.contains("<h2>Sayfa 1</h2><p>scan.pdf page 1</p>"));
    assert!(html.contains("<h2>Sayfa 2</h2>"));

    let sink = Arc::new(MemorySink::new());
    convert_files(
        &[text_file("notes.txt")],
        ConversionMode::ToPdf,
        OutputFormat::default(),
        &t,
        sink.clone(),
    )
    .await
    .unwrap();
    assert_eq!(sink.names(), vec!["notes.pdf"]);
}

#[tokio::test]
async fn plain_text_reads_back_from_generated_pdf() {
    let source = "Quarterly report\nRevenue grew 12 percent\n\nNext steps follow";
    let file = PendingFile::new("report.txt", "text/plain", source.as_bytes().to_vec());
    let pdf = Transcoder::new(fast_config()).to_pdf(&file).await.unwrap();
    assert!(!pdf.is_degraded());

    let doc = lopdf::Document::load_mem(&pdf.bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
    let extracted = doc.extract_text(&[1]).unwrap();

    let squash = |s: &str| s.split_whitespace().collect::<String>();
    assert_eq!(squash(&extracted), squash(source), "extracted: {extracted:?}");
}

#[tokio::test]
async fn text_extraction_marks_pages() {
    let sink = Arc::new(MemorySink::new());
    let t = transcoder(fast_config(), Arc::new(ScriptedBackend::default()));
    convert_files(
        &[pdf_file("a.pdf", "pages:10x10,10x10")],
        ConversionMode::FromPdf,
        OutputFormat::Text,
        &t,
        sink.clone(),
    )
    .await
    .unwrap();
    let text = String::from_utf8(sink.get("a.txt").unwrap()).unwrap();
    assert_eq!(
        text,
        "--- Sayfa 1 ---\na.pdf page 1\n\n--- Sayfa 2 ---\na.pdf page 2\n\n"
    );
}

#[tokio::test]
async fn page_images_are_zipped_as_they_render() {
    let backend = Arc::new(ScriptedBackend::default());
    let sink = Arc::new(MemorySink::new());
    convert_files(
        &[pdf_file("scan.pdf", "pages:30x40,30x40,30x40")],
        ConversionMode::FromPdf,
        OutputFormat::Image,
        &transcoder(fast_config(), backend.clone()),
        sink.clone(),
    )
    .await
    .unwrap();

    let zip_bytes = sink.get("scan.zip").expect("scan.zip exported");
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
    let names: Vec<_> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(names, vec!["sayfa_1.png", "sayfa_2.png", "sayfa_3.png"]);

    let events = backend.events.lock().unwrap().clone();
    assert_eq!(events.len(), 6);
    assert!(events
        .chunks(2)
        .enumerate()
        .all(|(i, pair)| pair[0] == format!("render scan.pdf#{i}")
            && pair[1] == format!("consumed scan.pdf#{i}")));
}

#[tokio::test]
async fn html_input_is_flagged_when_degraded() {
    let cb = Arc::new(RecordingCallback::default());
    let config = ConversionConfig::builder()
        .progress_callback(cb.clone())
        .build()
        .unwrap();
    let sink = Arc::new(MemorySink::new());
    let summary = convert_files(
        &[PendingFile::new("page.html", "text/html", b"<b>bold</b>".to_vec())],
        ConversionMode::ToPdf,
        OutputFormat::default(),
        &Transcoder::new(config),
        sink.clone(),
    )
    .await
    .unwrap();

    assert_eq!(summary.degraded().count(), 1);
    assert_eq!(cb.degraded.load(Ordering::SeqCst), 1);
    assert_eq!(sink.names(), vec!["page.pdf"]);
}

/// Counts exports made on the thread that drives the job.
struct ThreadSink {
    job_thread: ThreadId,
    exports: AtomicUsize,
    on_job_thread: AtomicUsize,
}

impl ThreadSink {
    fn new() -> Self {
        Self {
            job_thread: std::thread::current().id(),
            exports: AtomicUsize::new(0),
            on_job_thread: AtomicUsize::new(0),
        }
    }
}

impl ArtifactSink for ThreadSink {
    fn export(&self, _name: &str, _bytes: &[u8]) -> Result<(), DocShiftError> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        if std::thread::current().id() == self.job_thread {
            self.on_job_thread.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

// The default test runtime is single-threaded, so the test thread is the
// only async worker.
#[tokio::test]
async fn exports_run_on_the_blocking_pool() {
    let sink = Arc::new(ThreadSink::new());
    let t = transcoder(fast_config(), Arc::new(ScriptedBackend::default()));
    convert_files(
        &[text_file("a.txt"), text_file("b.txt")],
        ConversionMode::ToPdf,
        OutputFormat::default(),
        &t,
        sink.clone(),
    )
    .await
    .unwrap();

    let queue = FileQueue::new();
    queue.extend([pdf_file("a.pdf", "pages:10x10"), pdf_file("b.pdf", "pages:10x10")]);
    merge_queue(&queue, &t, sink.clone()).await.unwrap();

    assert_eq!(sink.exports.load(Ordering::SeqCst), 3);
    assert_eq!(sink.on_job_thread.load(Ordering::SeqCst), 0);
}

// ── Failure handling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn unsupported_type_fails_and_exports_nothing() {
    let sink = Arc::new(MemorySink::new());
    let err = convert_files(
        &[PendingFile::new("archive.zip", "application/zip", b"PK".to_vec())],
        ConversionMode::ToPdf,
        OutputFormat::default(),
        &Transcoder::new(fast_config()),
        sink.clone(),
    )
    .await
    .unwrap_err();

    match err {
        DocShiftError::FileFailed { name, source } => {
            assert_eq!(name, "archive.zip");
            assert!(matches!(*source, DocShiftError::UnsupportedFormat { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(sink.is_empty());
}

#[tokio::test]
async fn abort_keeps_earlier_exports_and_skips_later_batches() {
    let files = vec![
        pdf_file("a.pdf", "pages:10x10"),
        pdf_file("b.pdf", "bad"),
        pdf_file("c.pdf", "pages:10x10"),
        pdf_file("d.pdf", "pages:10x10"),
        pdf_file("e.pdf", "pages:10x10"),
    ];
    let sink = Arc::new(MemorySink::new());
    let t = transcoder(fast_config(), Arc::new(ScriptedBackend::default()));
    let err = convert_files(&files, ConversionMode::FromPdf, OutputFormat::Text, &t, sink.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, DocShiftError::FileFailed { ref name, .. } if name == "b.pdf"));
    let mut names = sink.names();
    names.sort();
    assert_eq!(names, vec!["a.txt", "c.txt"]);
}

#[tokio::test]
async fn continue_on_error_reports_every_failure() {
    let cb = Arc::new(RecordingCallback::default());
    let config = ConversionConfig::builder()
        .batch_delay_ms(0)
        .failure_policy(FailurePolicy::ContinueOnError)
        .progress_callback(cb.clone())
        .build()
        .unwrap();
    let files = vec![
        pdf_file("a.pdf", "pages:10x10"),
        pdf_file("b.pdf", "bad"),
        pdf_file("c.pdf", "pages:10x10"),
        pdf_file("d.pdf", "bad"),
    ];
    let sink = Arc::new(MemorySink::new());
    let summary = convert_files(
        &files,
        ConversionMode::FromPdf,
        OutputFormat::Text,
        &transcoder(config, Arc::new(ScriptedBackend::default())),
        sink.clone(),
    )
    .await
    .unwrap();

    assert_eq!(summary.converted(), 2);
    let failed: Vec<_> = summary.failures.iter().map(|f| f.index).collect();
    assert_eq!(failed, vec![1, 3]);
    assert_eq!(cb.errors.load(Ordering::SeqCst), 2);
    assert_eq!(summary.message(), "2/4 files converted (2 failed)");

    let fractions = cb.fractions.lock().unwrap().clone();
    assert_eq!(fractions.len(), 2);
    assert_eq!(*fractions.last().unwrap(), 0.5);
}

#[tokio::test]
async fn continue_on_error_with_nothing_converted_is_an_error() {
    let config = ConversionConfig::builder()
        .failure_policy(FailurePolicy::ContinueOnError)
        .build()
        .unwrap();
    let err = convert_files(
        &[pdf_file("x.pdf", "bad"), pdf_file("y.pdf", "bad")],
        ConversionMode::FromPdf,
        OutputFormat::Text,
        &transcoder(config, Arc::new(ScriptedBackend::default())),
        Arc::new(MemorySink::new()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DocShiftError::PartialFailure { total: 2, .. }));
}

// ── Queue integration ────────────────────────────────────────────────────────

#[tokio::test]
async fn successful_queue_job_empties_the_queue() {
    let queue = FileQueue::new();
    queue.extend([text_file("a.txt"), text_file("b.txt")]);
    let summary = convert_queue(
        &queue,
        ConversionMode::ToPdf,
        OutputFormat::default(),
        &Transcoder::new(fast_config()),
        Arc::new(MemorySink::new()),
    )
    .await
    .unwrap();
    assert_eq!(summary.converted(), 2);
    assert!(queue.is_empty());
    assert!(!queue.is_busy());
}

/// Queues one more file as soon as the job starts.
struct LateArrival {
    queue: Arc<FileQueue>,
}

impl ConversionProgressCallback for LateArrival {
    fn on_job_start(&self, _total_files: usize) {
        self.queue.push(text_file("late.txt"));
    }
}

#[tokio::test]
async fn files_added_during_a_job_stay_queued() {
    let queue = Arc::new(FileQueue::new());
    queue.extend([text_file("a.txt"), text_file("b.txt")]);
    let config = ConversionConfig::builder()
        .batch_delay_ms(0)
        .progress_callback(Arc::new(LateArrival {
            queue: queue.clone(),
        }))
        .build()
        .unwrap();
    let sink = Arc::new(MemorySink::new());

    let summary = convert_queue(
        &queue,
        ConversionMode::ToPdf,
        OutputFormat::default(),
        &Transcoder::new(config),
        sink.clone(),
    )
    .await
    .unwrap();

    assert_eq!(summary.total_files, 2);
    assert_eq!(sink.len(), 2);
    let left: Vec<_> = queue.snapshot().iter().map(|f| f.name().to_string()).collect();
    assert_eq!(left, vec!["late.txt"]);
    assert!(!queue.is_busy());
}

#[tokio::test]
async fn failed_queue_job_keeps_the_files() {
    let queue = FileQueue::new();
    queue.extend([text_file("a.txt"), PendingFile::new("x.doc", "application/msword", vec![])]);
    let result = convert_queue(
        &queue,
        ConversionMode::ToPdf,
        OutputFormat::default(),
        &Transcoder::new(fast_config()),
        Arc::new(MemorySink::new()),
    )
    .await;
    assert!(result.is_err());
    assert_eq!(queue.len(), 2);
    assert!(!queue.is_busy());
}

// ── Merge ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn merge_keeps_file_and_page_order() {
    let files = vec![
        pdf_file("a.pdf", "pages:100x80,110x80"),
        pdf_file("b.pdf", "pages:120x80"),
    ];
    let out = merge_files(
        &files,
        Arc::new(ScriptedBackend::default()),
        &ConversionConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(out.summary.pages, 3);
    let widths = media_box_widths(&out.pdf);
    assert_eq!(widths.len(), 3);
    for (got, want) in widths.iter().zip([100.0, 110.0, 120.0]) {
        assert!((got - want).abs() < 1.0, "page widths {widths:?}");
    }
}

#[tokio::test]
async fn merge_consumes_each_page_before_the_next_is_rendered() {
    let backend = Arc::new(ScriptedBackend::default());
    let files = vec![
        pdf_file("a.pdf", "pages:10x10,10x10"),
        pdf_file("b.pdf", "pages:10x10"),
    ];
    merge_files(&files, backend.clone(), &ConversionConfig::default())
        .await
        .unwrap();

    let events = backend.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "render a.pdf#0",
            "consumed a.pdf#0",
            "render a.pdf#1",
            "consumed a.pdf#1",
            "render b.pdf#0",
            "consumed b.pdf#0",
        ]
    );
}

#[tokio::test]
async fn merge_failure_produces_no_output() {
    let files = vec![pdf_file("a.pdf", "pages:10x10"), pdf_file("b.pdf", "bad")];
    let err = merge_files(
        &files,
        Arc::new(ScriptedBackend::default()),
        &ConversionConfig::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DocShiftError::MergeFailed(_)));
}

#[tokio::test]
async fn merge_queue_exports_merged_pdf() {
    let queue = FileQueue::new();
    queue.extend([pdf_file("a.pdf", "pages:10x10"), pdf_file("b.pdf", "pages:10x10")]);
    let sink = Arc::new(MemorySink::new());
    let t = transcoder(ConversionConfig::default(), Arc::new(ScriptedBackend::default()));

    let out = merge_queue(&queue, &t, sink.clone()).await.unwrap();
    assert_eq!(out.summary.output_name.as_deref(), Some("merged.pdf"));
    assert_eq!(sink.names(), vec!["merged.pdf"]);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn merge_queue_with_one_file_is_rejected() {
    let queue = FileQueue::new();
    queue.push(pdf_file("a.pdf", "pages:10x10"));
    let t = transcoder(ConversionConfig::default(), Arc::new(ScriptedBackend::default()));
    let err = merge_queue(&queue, &t, Arc::new(MemorySink::new())).await.unwrap_err();
    assert!(matches!(err, DocShiftError::InsufficientInput { got: 1, .. }));
    assert_eq!(queue.len(), 1);
}
