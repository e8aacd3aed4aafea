//! Pipeline stages and the services they wrap.
//!
//! Each submodule owns one concern so the transcoder can be tested with
//! fakes at the seams (`PdfBackend`, `MarkupRasterizer`).
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──▶ markup ─┐
//! input ─────┼──▶ encode ─┼──▶ compose ──▶ PDF
//! (intake)   │            │
//!            └──▶ render ─┴──▶ encode ──▶ archive ──▶ zip
//!               (pdfium)       (PNG)
//! ```
//!
//! 1. [`input`]: read named files, validate, derive previews
//! 2. [`render`]: PDF page text and rasters; blocking, run in
//!    `spawn_blocking`
//! 3. [`markup`]: HTML rasterisation seam and the tag-stripping fallback
//! 4. [`encode`]: PNG encode / PNG-JPEG decode
//! 5. [`compose`]: PDF generation with `printpdf`
//! 6. [`archive`]: page-image zip packaging

pub mod archive;
pub mod compose;
pub mod encode;
pub mod input;
pub mod markup;
pub mod render;
