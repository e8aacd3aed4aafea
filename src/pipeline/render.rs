//! PDF parsing: per-page text items and page rasters via pdfium.
//!
//! Everything behind [`PdfBackend`] is blocking. The `pdfium-render` crate
//! wraps the pdfium C++ library, which keeps thread-local state and must not
//! run on a Tokio worker; callers move backend calls into
//! `tokio::task::spawn_blocking`.

use crate::error::DocShiftError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Page-level access to a PDF document.
pub trait PdfBackend: Send + Sync {
    /// The text items of every page in document order.
    fn page_texts(&self, name: &str, pdf: &[u8]) -> Result<Vec<Vec<String>>, DocShiftError>;

    /// Rasterise every page at `scale` × its natural size and hand each one
    /// to `visit` (0-based index, raster) in order, one page at a time.
    ///
    /// Returns the page count. An error from `visit` stops rendering and is
    /// returned as is.
    fn render_pages(
        &self,
        name: &str,
        pdf: &[u8],
        scale: f32,
        visit: &mut PageVisitor<'_>,
    ) -> Result<usize, DocShiftError>;
}

/// Per-page raster consumer for [`PdfBackend::render_pages`].
pub type PageVisitor<'a> = dyn FnMut(usize, DynamicImage) -> Result<(), DocShiftError> + 'a;

/// [`PdfBackend`] over a dynamically bound pdfium library.
///
/// A fresh binding is made per call so the backend can be shared freely
/// between blocking tasks.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    library_path: Option<PathBuf>,
}

impl PdfiumBackend {
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    /// Bind to pdfium: explicit path, then `PDFIUM_LIB_PATH`, then the
    /// working directory, then the system library path.
    fn bind(&self) -> Result<Pdfium, DocShiftError> {
        let explicit = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match explicit {
            Some(path) => Pdfium::bind_to_library(&path).map_err(|e| {
                DocShiftError::PdfiumBindingFailed(format!("{}: {e}", path.display()))
            })?,
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| DocShiftError::PdfiumBindingFailed(e.to_string()))?,
        };
        Ok(Pdfium::new(bindings))
    }
}

fn open<'a>(
    pdfium: &'a Pdfium,
    name: &str,
    pdf: &'a [u8],
) -> Result<PdfDocument<'a>, DocShiftError> {
    pdfium
        .load_pdf_from_byte_slice(pdf, None)
        .map_err(|e| DocShiftError::CorruptPdf {
            name: name.to_string(),
            detail: format!("{e:?}"),
        })
}

impl PdfBackend for PdfiumBackend {
    fn page_texts(&self, name: &str, pdf: &[u8]) -> Result<Vec<Vec<String>>, DocShiftError> {
        let pdfium = self.bind()?;
        let document = open(&pdfium, name, pdf)?;
        let pages = document.pages();
        info!("'{}' loaded: {} pages", name, pages.len());

        let mut out = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| DocShiftError::TextExtractionFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                })?;
            let items: Vec<String> = text.segments().iter().map(|s| s.text()).collect();
            debug!("Page {}: {} text items", idx + 1, items.len());
            out.push(items);
        }
        Ok(out)
    }

    fn render_pages(
        &self,
        name: &str,
        pdf: &[u8],
        scale: f32,
        visit: &mut PageVisitor<'_>,
    ) -> Result<usize, DocShiftError> {
        let pdfium = self.bind()?;
        let document = open(&pdfium, name, pdf)?;
        let pages = document.pages();
        info!("'{}' loaded: {} pages", name, pages.len());

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let mut count = 0;
        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                DocShiftError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                }
            })?;
            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            visit(idx, image)?;
            count += 1;
        }
        Ok(count)
    }
}
