//! Per-file format conversion.
//!
//! [`Transcoder`] owns the three services a conversion can need: the PDF
//! backend (parsing and page rendering), the markup rasteriser, and the
//! config that fixes page geometry and labels. Every call that touches a
//! service or builds a document runs inside `spawn_blocking`.

use crate::config::{ConversionConfig, ConversionMode, OutputFormat};
use crate::error::DocShiftError;
use crate::file::{InputKind, PendingFile};
use crate::output::{Fallback, Transcoded};
use crate::pipeline::archive::PageArchive;
use crate::pipeline::compose::PdfComposer;
use crate::pipeline::encode::{decode_image, encode_png};
use crate::pipeline::markup::{
    escape_html, normalise_line_endings, strip_markup, MarkupRasterizer, NoMarkupRasterizer,
};
use crate::pipeline::render::{PdfBackend, PdfiumBackend};
use std::sync::Arc;
use tracing::{debug, warn};

/// Run blocking work off the async workers and flatten the join error.
pub(crate) async fn run_blocking<T, F>(what: &str, f: F) -> Result<T, DocShiftError>
where
    F: FnOnce() -> Result<T, DocShiftError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DocShiftError::Internal(format!("{what} task panicked: {e}")))?
}

/// Converts single files to and from PDF.
#[derive(Clone)]
pub struct Transcoder {
    backend: Arc<dyn PdfBackend>,
    rasterizer: Arc<dyn MarkupRasterizer>,
    config: Arc<ConversionConfig>,
}

impl Transcoder {
    /// A transcoder on pdfium with no markup rasteriser.
    pub fn new(config: ConversionConfig) -> Self {
        let backend = PdfiumBackend::new(config.pdfium_library_path.clone());
        Self {
            backend: Arc::new(backend),
            rasterizer: Arc::new(NoMarkupRasterizer),
            config: Arc::new(config),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn PdfBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn MarkupRasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn backend(&self) -> Arc<dyn PdfBackend> {
        Arc::clone(&self.backend)
    }

    /// Convert `file` for `mode`. `format` is only consulted for from-PDF.
    pub async fn transcode(
        &self,
        file: &PendingFile,
        mode: ConversionMode,
        format: OutputFormat,
    ) -> Result<Transcoded, DocShiftError> {
        match mode {
            ConversionMode::ToPdf => self.to_pdf(file).await,
            ConversionMode::FromPdf => self.from_pdf(file, format).await.map(Transcoded::exact),
        }
    }

    /// Convert a text, HTML, PNG or JPEG file to a one-page PDF.
    pub async fn to_pdf(&self, file: &PendingFile) -> Result<Transcoded, DocShiftError> {
        let kind = file.kind();
        debug!("to-PDF '{}' as {:?}", file.name(), kind);
        match kind {
            InputKind::PlainText => {
                let text = normalise_line_endings(&String::from_utf8_lossy(file.bytes()));
                self.text_pdf(file.name(), text).await.map(Transcoded::exact)
            }
            InputKind::Html => self.html_pdf(file).await,
            InputKind::Png | InputKind::Jpeg => self.image_pdf(file).await.map(Transcoded::exact),
            InputKind::WordDocument | InputKind::Pdf | InputKind::Other(_) => {
                Err(DocShiftError::UnsupportedFormat {
                    name: file.name().to_string(),
                    mime: file.mime_type().to_string(),
                })
            }
        }
    }

    /// Extract a PDF's content as text, HTML, or a zip of page images.
    pub async fn from_pdf(
        &self,
        file: &PendingFile,
        format: OutputFormat,
    ) -> Result<Vec<u8>, DocShiftError> {
        let backend = Arc::clone(&self.backend);
        let bytes = file.shared_bytes();
        let name = file.name().to_string();
        let label = self.config.page_label.clone();
        debug!("from-PDF '{}' as {:?}", name, format);

        match format {
            OutputFormat::Text => {
                let pages =
                    run_blocking("Text extraction", move || backend.page_texts(&name, &bytes))
                        .await?;
                Ok(pages_to_text(&label, &pages).into_bytes())
            }
            OutputFormat::Html => {
                let title = name.clone();
                let pages =
                    run_blocking("Text extraction", move || backend.page_texts(&name, &bytes))
                        .await?;
                Ok(pages_to_html(&title, &label, &pages).into_bytes())
            }
            OutputFormat::Image => {
                let scale = self.config.render_scale;
                let prefix = label.to_lowercase();
                run_blocking("Page rendering", move || {
                    let mut archive = PageArchive::new();
                    backend.render_pages(&name, &bytes, scale, &mut |idx, image| {
                        let png = encode_png(&image, idx + 1)?;
                        archive.add(&format!("{}_{}.png", prefix, idx + 1), &png)
                    })?;
                    archive.finish()
                })
                .await
            }
        }
    }

    async fn text_pdf(&self, name: &str, text: String) -> Result<Vec<u8>, DocShiftError> {
        let config = Arc::clone(&self.config);
        let title = name.to_string();
        run_blocking("PDF generation", move || {
            let mut composer = PdfComposer::new(&title);
            composer.add_text_page(
                config.page_setup,
                &text,
                config.text_origin_mm,
                config.font_size_pt,
            );
            Ok(composer.finish(config.page_setup))
        })
        .await
    }

    async fn html_pdf(&self, file: &PendingFile) -> Result<Transcoded, DocShiftError> {
        let html = String::from_utf8_lossy(file.bytes()).into_owned();
        let rasterizer = Arc::clone(&self.rasterizer);
        let config = Arc::clone(&self.config);
        let title = file.name().to_string();
        let markup = html.clone();

        let rendered = run_blocking("HTML rasterisation", move || {
            let raster = match rasterizer.rasterize(&markup, config.html_width_px, config.html_scale) {
                Ok(raster) => raster,
                Err(reason) => return Ok(Err(reason)),
            };
            let mut composer = PdfComposer::new(&title);
            composer.add_full_bleed_page(raster, config.html_scale);
            Ok(Ok(composer.finish(config.page_setup)))
        })
        .await?;

        match rendered {
            Ok(pdf) => Ok(Transcoded::exact(pdf)),
            Err(reason) => {
                warn!(
                    "HTML rasterisation failed for '{}' ({}); placing stripped text instead",
                    file.name(),
                    reason
                );
                let text = normalise_line_endings(&strip_markup(&html));
                let pdf = self.text_pdf(file.name(), text).await?;
                Ok(Transcoded::degraded(pdf, Fallback::MarkupStripped { reason }))
            }
        }
    }

    async fn image_pdf(&self, file: &PendingFile) -> Result<Vec<u8>, DocShiftError> {
        let bytes = file.shared_bytes();
        let name = file.name().to_string();
        let config = Arc::clone(&self.config);
        run_blocking("PDF generation", move || {
            let image = decode_image(&bytes, &name)?;
            let mut composer = PdfComposer::new(&name);
            composer.add_image_page(config.page_setup, image, config.image_box);
            Ok(composer.finish(config.page_setup))
        })
        .await
    }
}

/// Plain-text rendering: one `--- {label} N ---` block per page.
pub fn pages_to_text(label: &str, pages: &[Vec<String>]) -> String {
    let mut out = String::new();
    for (idx, items) in pages.iter().enumerate() {
        out.push_str(&format!("--- {} {} ---\n{}\n\n", label, idx + 1, items.join(" ")));
    }
    out
}

/// Minimal HTML rendering: one heading and paragraph per page.
pub fn pages_to_html(title: &str, label: &str, pages: &[Vec<String>]) -> String {
    let mut out = format!(
        "<html><head><meta charset=\"UTF-8\"><title>{}</title></head><body>",
        escape_html(title)
    );
    for (idx, items) in pages.iter().enumerate() {
        out.push_str(&format!(
            "<h2>{} {}</h2><p>{}</p>",
            escape_html(label),
            idx + 1,
            escape_html(&items.join(" "))
        ));
    }
    out.push_str("</body></html>");
    out
}
