//! Configuration types for conversion and merge jobs.
//!
//! All job behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. One struct holds every knob so a config
//! can be shared across the batch tasks of a job, logged, and diffed.

use crate::error::DocShiftError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound on an accepted input file: 10 MiB.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Configuration for a conversion or merge job.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use docshift::{ConversionConfig, FailurePolicy};
///
/// let config = ConversionConfig::builder()
///     .batch_size(4)
///     .failure_policy(FailurePolicy::ContinueOnError)
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_size, 4);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Files transcoded concurrently within one batch. Default: 3.
    ///
    /// Each file load plus page render can hold a large raster in memory;
    /// the batch size bounds how many of those exist at once.
    pub batch_size: usize,

    /// Pause between two batches in milliseconds. Default: 200.
    pub batch_delay_ms: u64,

    /// Largest accepted input file in bytes. Default: [`MAX_FILE_SIZE`].
    pub max_file_size: u64,

    /// Upscale factor used when rasterising PDF pages. Default: 2.0.
    pub render_scale: f32,

    /// Width of the off-screen container HTML is laid out in. Default: 900.
    pub html_width_px: u32,

    /// Upscale factor for HTML rasterisation. Default: 2.0.
    pub html_scale: f32,

    /// Paper used for text and image pages.
    pub page_setup: PageSetup,

    /// Top-left origin of plain-text output, in mm from the page's top-left
    /// corner. Default: (10, 10).
    pub text_origin_mm: (f32, f32),

    /// Font size for plain-text output in points. Default: 16.
    pub font_size_pt: f32,

    /// Target box for embedded PNG/JPEG inputs.
    pub image_box: ImageBox,

    /// What happens when one file of a job fails. Default: abort the job.
    pub failure_policy: FailurePolicy,

    /// Label used for page markers in text/HTML output and archive entry
    /// names. Default: "Sayfa".
    pub page_label: String,

    /// File name of the merged output. Default: "merged.pdf".
    pub merged_file_name: String,

    /// Explicit pdfium library location. When `None`, `PDFIUM_LIB_PATH`,
    /// the working directory and the system library path are tried in turn.
    pub pdfium_library_path: Option<PathBuf>,

    /// Optional per-file progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            batch_delay_ms: 200,
            max_file_size: MAX_FILE_SIZE,
            render_scale: 2.0,
            html_width_px: 900,
            html_scale: 2.0,
            page_setup: PageSetup::default(),
            text_origin_mm: (10.0, 10.0),
            font_size_pt: 16.0,
            image_box: ImageBox::default(),
            failure_policy: FailurePolicy::default(),
            page_label: "Sayfa".to_string(),
            merged_file_name: "merged.pdf".to_string(),
            pdfium_library_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("batch_size", &self.batch_size)
            .field("batch_delay_ms", &self.batch_delay_ms)
            .field("max_file_size", &self.max_file_size)
            .field("render_scale", &self.render_scale)
            .field("html_width_px", &self.html_width_px)
            .field("html_scale", &self.html_scale)
            .field("page_setup", &self.page_setup)
            .field("failure_policy", &self.failure_policy)
            .field("page_label", &self.page_label)
            .field("merged_file_name", &self.merged_file_name)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The pause inserted between batches.
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n.max(1);
        self
    }

    pub fn batch_delay_ms(mut self, ms: u64) -> Self {
        self.config.batch_delay_ms = ms;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.25, 8.0);
        self
    }

    pub fn html_width_px(mut self, px: u32) -> Self {
        self.config.html_width_px = px.max(100);
        self
    }

    pub fn html_scale(mut self, scale: f32) -> Self {
        self.config.html_scale = scale.clamp(0.25, 8.0);
        self
    }

    pub fn page_setup(mut self, setup: PageSetup) -> Self {
        self.config.page_setup = setup;
        self
    }

    pub fn text_origin_mm(mut self, x: f32, y: f32) -> Self {
        self.config.text_origin_mm = (x, y);
        self
    }

    pub fn font_size_pt(mut self, size: f32) -> Self {
        self.config.font_size_pt = size.clamp(4.0, 96.0);
        self
    }

    pub fn image_box(mut self, image_box: ImageBox) -> Self {
        self.config.image_box = image_box;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn page_label(mut self, label: impl Into<String>) -> Self {
        self.config.page_label = label.into();
        self
    }

    pub fn merged_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.merged_file_name = name.into();
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, DocShiftError> {
        let c = &self.config;
        if c.batch_size == 0 {
            return Err(DocShiftError::InvalidConfig(
                "Batch size must be ≥ 1".into(),
            ));
        }
        if c.max_file_size == 0 {
            return Err(DocShiftError::InvalidConfig(
                "Maximum file size must be > 0".into(),
            ));
        }
        if c.merged_file_name.trim().is_empty() {
            return Err(DocShiftError::InvalidConfig(
                "Merged file name must not be empty".into(),
            ));
        }
        let b = &c.image_box;
        if b.width_mm <= 0.0 || b.height_mm <= 0.0 {
            return Err(DocShiftError::InvalidConfig(format!(
                "Image box must have a positive size, got {}×{} mm",
                b.width_mm, b.height_mm
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Direction of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConversionMode {
    /// Text, HTML and images become PDF.
    ToPdf,
    /// PDF becomes text, HTML or a page-image archive.
    FromPdf,
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionMode::ToPdf => f.write_str("toPdf"),
            ConversionMode::FromPdf => f.write_str("fromPdf"),
        }
    }
}

/// Output produced by a from-PDF conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text with one marker line per page. (default)
    #[default]
    Text,
    /// A minimal HTML document with one heading and paragraph per page.
    Html,
    /// A zip archive with one PNG per page.
    Image,
}

impl OutputFormat {
    /// File extension (with leading dot) of an artifact in this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Text => ".txt",
            OutputFormat::Html => ".html",
            OutputFormat::Image => ".zip",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = DocShiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "html" => Ok(OutputFormat::Html),
            "image" | "png" => Ok(OutputFormat::Image),
            _ => Err(DocShiftError::InvalidOutputFormat(s.to_string())),
        }
    }
}

/// What a batch job does when a single file fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Stop after the batch containing the first failure; report that error.
    /// Files already exported stay exported. (default)
    #[default]
    AbortJob,
    /// Record the failure, keep converting, report every failure at the end.
    ContinueOnError,
}

/// Paper sizes offered for text and image pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    #[default]
    A4,
    Letter,
    Legal,
}

impl PaperSize {
    /// Portrait width and height in millimetres.
    pub fn dimensions_mm(self) -> (f32, f32) {
        match self {
            PaperSize::A4 => (210.0, 297.0),
            PaperSize::Letter => (215.9, 279.4),
            PaperSize::Legal => (215.9, 355.6),
        }
    }
}

impl FromStr for PaperSize {
    type Err = DocShiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(PaperSize::A4),
            "letter" => Ok(PaperSize::Letter),
            "legal" => Ok(PaperSize::Legal),
            other => Err(DocShiftError::InvalidConfig(format!(
                "Unknown paper size '{other}' (expected a4, letter or legal)"
            ))),
        }
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Paper size plus orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageSetup {
    pub paper: PaperSize,
    pub orientation: Orientation,
}

impl PageSetup {
    /// Page width and height in millimetres after applying the orientation.
    pub fn dimensions_mm(&self) -> (f32, f32) {
        let (w, h) = self.paper.dimensions_mm();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }
}

/// Fixed placement of an embedded image, in mm from the page's top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageBox {
    pub x_mm: f32,
    pub y_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

impl Default for ImageBox {
    fn default() -> Self {
        Self {
            x_mm: 10.0,
            y_mm: 10.0,
            width_mm: 180.0,
            height_mm: 160.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behaviour() {
        let c = ConversionConfig::default();
        assert_eq!(c.batch_size, 3);
        assert_eq!(c.batch_delay(), Duration::from_millis(200));
        assert_eq!(c.max_file_size, 10 * 1024 * 1024);
        assert_eq!(c.render_scale, 2.0);
        assert_eq!(c.failure_policy, FailurePolicy::AbortJob);
    }

    #[test]
    fn builder_clamps_batch_size() {
        let c = ConversionConfig::builder().batch_size(0).build().unwrap();
        assert_eq!(c.batch_size, 1);
    }

    #[test]
    fn builder_rejects_degenerate_image_box() {
        let err = ConversionConfig::builder()
            .image_box(ImageBox {
                width_mm: 0.0,
                ..ImageBox::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, DocShiftError::InvalidConfig(_)));
    }

    #[test]
    fn output_format_parses_known_names() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("HTML".parse::<OutputFormat>().unwrap(), OutputFormat::Html);
        assert_eq!("image".parse::<OutputFormat>().unwrap(), OutputFormat::Image);
    }

    #[test]
    fn output_format_rejects_unknown_names() {
        let err = "docx".parse::<OutputFormat>().unwrap_err();
        assert!(matches!(err, DocShiftError::InvalidOutputFormat(ref s) if s == "docx"));
    }

    #[test]
    fn landscape_swaps_dimensions() {
        let setup = PageSetup {
            paper: PaperSize::A4,
            orientation: Orientation::Landscape,
        };
        assert_eq!(setup.dimensions_mm(), (297.0, 210.0));
    }

    #[test]
    fn debug_hides_callback() {
        let c = ConversionConfig::default();
        let s = format!("{c:?}");
        assert!(s.contains("batch_size"));
        assert!(s.contains("progress_callback: None"));
    }
}
