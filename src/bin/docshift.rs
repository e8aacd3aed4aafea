//! CLI binary for docshift.
//!
//! A thin shim over the library crate: flags become a `ConversionConfig`,
//! paths go through intake into a queue, and the queue is converted or
//! merged into the output directory.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use docshift::{
    convert_queue, load_files, merge_queue, ArtifactSink, BoardScript, ConversionConfig,
    ConversionProgressCallback, ConversionMode, DirectorySink, FailurePolicy, FileQueue,
    Orientation, OutputFormat, PageSetup, PaperSize, ProgressCallback, Transcoder,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn truncate(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let head: String = msg.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        msg.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per file. Files of a batch finish
/// in any order, so start times are tracked per index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
    unit: &'static str,
}

impl CliProgressCallback {
    fn new(unit: &'static str) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
            unit,
        })
    }

    fn elapsed(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&index)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_job_start(&self, total_files: usize) {
        let style = ProgressStyle::with_template(&format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {}  ⏱ {{elapsed_precise}}",
            self.unit
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_files as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Converting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_files} {}…", self.unit))
        ));
    }

    fn on_batch_start(&self, batch_index: usize, batch_count: usize, _files: usize) {
        self.bar
            .set_message(format!("batch {}/{}", batch_index + 1, batch_count));
    }

    fn on_file_start(&self, index: usize, _total: usize, _name: &str) {
        self.start_times
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(index, Instant::now());
    }

    fn on_file_complete(&self, index: usize, total: usize, output_name: &str, _fraction: f64) {
        let secs = self.elapsed(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index + 1,
            total,
            output_name,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_degraded(&self, _index: usize, name: &str, reason: &str) {
        self.bar.println(format!(
            "  {} {}: HTML placed as plain text ({})",
            yellow("⚠"),
            name,
            dim(&truncate(reason, 60))
        ));
    }

    fn on_file_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let secs = self.elapsed(index);
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index + 1,
            total,
            name,
            red(&truncate(error, 80)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_job_complete(&self, total_files: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total_files.saturating_sub(success_count);
        if failed == 0 {
            eprintln!(
                "{} {} {} converted successfully",
                green("✔"),
                bold(&success_count.to_string()),
                self.unit
            );
        } else {
            eprintln!(
                "{} {}/{} {} converted  ({} failed)",
                if success_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_files,
                self.unit,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Text, HTML and images to PDF (one PDF per input)
  docshift to-pdf notes.txt page.html photo.jpg -o out/

  # PDF to text with page markers
  docshift from-pdf report.pdf --format text

  # PDF pages to a zip of PNGs, keep going past broken files
  docshift from-pdf *.pdf --format image --keep-going -o pages/

  # Merge PDFs in the given order
  docshift merge a.pdf b.pdf c.pdf -o merged.pdf

  # Render a drawing-board script
  docshift draw sketch.json -o sketch.png

LIMITS:
  Files larger than 10 MB are rejected. to-pdf accepts .txt, .html, .png,
  .jpg/.jpeg (.doc/.docx are accepted but not convertible); from-pdf and
  merge accept .pdf.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to an existing libpdfium
  DOCSHIFT_OUTPUT_DIR     Default output directory
  DOCSHIFT_BATCH_SIZE     Files converted concurrently per batch
  DOCSHIFT_FORMAT         Default from-pdf output format
  RUST_LOG                Overrides the log filter
"#;

/// Convert documents to and from PDF, merge PDFs, render drawings.
#[derive(Parser, Debug)]
#[command(
    name = "docshift",
    version,
    about = "Convert documents to and from PDF, merge PDFs, render drawings",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print the job summary as JSON on stdout.
    #[arg(long, global = true, env = "DOCSHIFT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "DOCSHIFT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCSHIFT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCSHIFT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert text, HTML, PNG and JPEG files to PDF.
    ToPdf(JobArgs),

    /// Extract PDFs to text, HTML, or a zip of page images.
    FromPdf {
        #[command(flatten)]
        job: JobArgs,

        /// Output format: text, html or image.
        #[arg(short, long, env = "DOCSHIFT_FORMAT", default_value = "text", value_parser = parse_format)]
        format: OutputFormat,
    },

    /// Merge two or more PDFs into one, in the given order.
    Merge {
        /// Input PDFs.
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,

        /// Merged output file.
        #[arg(short, long, default_value = "merged.pdf")]
        output: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Replay a JSON drawing-board script and export it as PNG or PDF.
    Draw {
        /// Board script (JSON).
        script: PathBuf,

        /// Output file; `.pdf` exports a PDF, anything else a PNG.
        #[arg(short, long, default_value = "drawing.png")]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct JobArgs {
    /// Input files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory artifacts are written to.
    #[arg(short, long, env = "DOCSHIFT_OUTPUT_DIR", default_value = ".")]
    output: PathBuf,

    /// Keep converting after a file fails; report every failure at the end.
    #[arg(long, env = "DOCSHIFT_KEEP_GOING")]
    keep_going: bool,

    /// Files converted concurrently per batch.
    #[arg(long, env = "DOCSHIFT_BATCH_SIZE", default_value_t = 3,
          value_parser = clap::value_parser!(u16).range(1..=32))]
    batch_size: u16,

    /// Paper size for text and image pages.
    #[arg(long, env = "DOCSHIFT_PAGE_SIZE", value_enum, default_value = "a4")]
    page_size: PaperArg,

    /// Page orientation for text and image pages.
    #[arg(long, env = "DOCSHIFT_ORIENTATION", value_enum, default_value = "portrait")]
    orientation: OrientationArg,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args, Debug)]
struct EngineArgs {
    /// Upscale factor for PDF page rendering.
    #[arg(long, env = "DOCSHIFT_RENDER_SCALE", default_value_t = 2.0)]
    render_scale: f32,

    /// Explicit libpdfium location.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PaperArg {
    A4,
    Letter,
    Legal,
}

impl From<PaperArg> for PaperSize {
    fn from(v: PaperArg) -> Self {
        match v {
            PaperArg::A4 => PaperSize::A4,
            PaperArg::Letter => PaperSize::Letter,
            PaperArg::Legal => PaperSize::Legal,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OrientationArg {
    Portrait,
    Landscape,
}

impl From<OrientationArg> for Orientation {
    fn from(v: OrientationArg) -> Self {
        match v {
            OrientationArg::Portrait => Orientation::Portrait,
            OrientationArg::Landscape => Orientation::Landscape,
        }
    }
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse::<OutputFormat>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the feedback; library INFO logs would
    // interleave with it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::ToPdf(job) => run_job(&cli, job, ConversionMode::ToPdf, OutputFormat::default()).await,
        Command::FromPdf { job, format } => run_job(&cli, job, ConversionMode::FromPdf, *format).await,
        Command::Merge {
            inputs,
            output,
            engine,
        } => run_merge(&cli, inputs, output, engine).await,
        Command::Draw { script, output } => run_draw(&cli, script, output).await,
    }
}

fn progress(cli: &Cli, unit: &'static str) -> Option<ProgressCallback> {
    if !cli.quiet && !cli.no_progress && !cli.json {
        Some(CliProgressCallback::new(unit) as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    }
}

/// Print the intake rejection notice, if any, to stderr.
fn report_rejections(cli: &Cli, notice: Option<String>) {
    if let Some(notice) = notice {
        if !cli.quiet {
            eprintln!("{} {}", yellow("⚠"), notice);
        }
    }
}

async fn run_job(
    cli: &Cli,
    job: &JobArgs,
    mode: ConversionMode,
    format: OutputFormat,
) -> Result<()> {
    let mut builder = ConversionConfig::builder()
        .batch_size(job.batch_size as usize)
        .render_scale(job.engine.render_scale)
        .page_setup(PageSetup {
            paper: job.page_size.into(),
            orientation: job.orientation.into(),
        })
        .failure_policy(if job.keep_going {
            FailurePolicy::ContinueOnError
        } else {
            FailurePolicy::AbortJob
        });
    if let Some(ref lib) = job.engine.pdfium_lib {
        builder = builder.pdfium_library_path(lib);
    }
    if let Some(cb) = progress(cli, "files") {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    let intake = load_files(&job.inputs, mode, &config).await;
    report_rejections(cli, intake.rejection_notice());
    if intake.accepted.is_empty() {
        anyhow::bail!("No convertible files among the {} given", job.inputs.len());
    }

    let queue = FileQueue::new();
    queue.extend(intake.accepted);
    let sink = Arc::new(
        DirectorySink::new(&job.output).context("Failed to prepare output directory")?,
    );
    let transcoder = Transcoder::new(config);

    let summary = convert_queue(&queue, mode, format, &transcoder, sink.clone())
        .await
        .context("Conversion failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        for artifact in summary.degraded() {
            eprintln!(
                "{} {} was converted without its markup",
                yellow("⚠"),
                artifact.name
            );
        }
        for failure in &summary.failures {
            eprintln!("{} {}: {}", red("✗"), failure.name, failure.error);
        }
        eprintln!(
            "{}  {}  {}ms  →  {}",
            if summary.failures.is_empty() { green("✔") } else { cyan("⚠") },
            summary.message(),
            summary.total_duration_ms,
            bold(&sink.dir().display().to_string()),
        );
    }

    if !summary.failures.is_empty() {
        anyhow::bail!("{} of {} files failed", summary.failures.len(), summary.total_files);
    }
    Ok(())
}

/// Split an output file path into its directory and file name.
fn split_output(output: &Path) -> Result<(PathBuf, String)> {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("Output path {:?} has no file name", output))?;
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((dir, name))
}

async fn run_merge(cli: &Cli, inputs: &[PathBuf], output: &Path, engine: &EngineArgs) -> Result<()> {
    let (dir, name) = split_output(output)?;
    let mut builder = ConversionConfig::builder()
        .render_scale(engine.render_scale)
        .merged_file_name(name);
    if let Some(ref lib) = engine.pdfium_lib {
        builder = builder.pdfium_library_path(lib);
    }
    if let Some(cb) = progress(cli, "PDFs") {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    let intake = load_files(inputs, ConversionMode::FromPdf, &config).await;
    report_rejections(cli, intake.rejection_notice());

    let queue = FileQueue::new();
    queue.extend(intake.accepted);
    let sink = DirectorySink::new(&dir).context("Failed to prepare output directory")?;
    let transcoder = Transcoder::new(config);

    let merged = merge_queue(&queue, &transcoder, Arc::new(sink))
        .await
        .context("Merge failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&merged.summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} files, {} pages  {}ms  →  {}",
            green("✔"),
            merged.summary.files,
            merged.summary.pages,
            merged.summary.total_duration_ms,
            bold(&output.display().to_string()),
        );
    }
    Ok(())
}

async fn run_draw(cli: &Cli, script_path: &Path, output: &Path) -> Result<()> {
    let json = tokio::fs::read_to_string(script_path)
        .await
        .with_context(|| format!("Failed to read board script {:?}", script_path))?;
    let mut script = BoardScript::from_json(&json)?;
    if let Some(base) = script_path.parent() {
        script.resolve_paths(base);
    }

    let as_pdf = output
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    let (dir, name) = split_output(output)?;
    let sink = DirectorySink::new(&dir).context("Failed to prepare output directory")?;
    let written = tokio::task::spawn_blocking(move || -> Result<usize> {
        let board = script.render()?;
        let bytes = if as_pdf {
            board.to_pdf()
        } else {
            board.to_png()?
        };
        sink.export(&name, &bytes).context("Failed to write drawing")?;
        Ok(bytes.len())
    })
    .await
    .context("Board rendering task panicked")??;

    if !cli.quiet && !cli.json {
        eprintln!(
            "{}  {} bytes  →  {}",
            green("✔"),
            written,
            bold(&output.display().to_string())
        );
    }
    Ok(())
}
