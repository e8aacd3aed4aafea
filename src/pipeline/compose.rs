//! PDF generation with `printpdf` 0.8.
//!
//! printpdf 0.8 is data-oriented: a page is a `PdfPage` holding a list of
//! `Op`s, images are registered on the document as XObjects, and the whole
//! document is serialised once by `PdfDocument::save()`. [`PdfComposer`]
//! collects pages in order and serialises on [`PdfComposer::finish`].
//!
//! Positions handed to the composer use a top-left origin in millimetres;
//! they are flipped into PDF's bottom-left point space here.

use crate::config::{ImageBox, PageSetup};
use image::DynamicImage;
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, RawImage,
    RawImageData, RawImageFormat, TextItem, XObjectTransform,
};
use tracing::debug;

/// Line advance as a multiple of the font size.
const LINE_HEIGHT_FACTOR: f32 = 1.15;

/// Raster pixels map to points at this density before scaling.
const IMAGE_DPI: f32 = 72.0;

fn pt_to_mm(pt: f32) -> Mm {
    Mm(pt * 25.4 / 72.0)
}

/// Builds a PDF page by page.
pub struct PdfComposer {
    doc: PdfDocument,
    pages: Vec<PdfPage>,
}

impl PdfComposer {
    pub fn new(title: &str) -> Self {
        Self {
            doc: PdfDocument::new(title),
            pages: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Add a page carrying `text` as a single block at `origin_mm`.
    ///
    /// Each `\n` starts a new line; there is no wrapping and no pagination,
    /// so long text runs off the page.
    pub fn add_text_page(
        &mut self,
        setup: PageSetup,
        text: &str,
        origin_mm: (f32, f32),
        font_size_pt: f32,
    ) {
        let (w_mm, h_mm) = setup.dimensions_mm();
        let page_h_pt = Mm(h_mm).into_pt().0;
        let x_pt = Mm(origin_mm.0).into_pt().0;
        let top_pt = page_h_pt - Mm(origin_mm.1).into_pt().0;
        let line_height = font_size_pt * LINE_HEIGHT_FACTOR;

        let mut ops: Vec<Op> = Vec::new();
        for (i, line) in text.split('\n').enumerate() {
            if line.is_empty() {
                continue;
            }
            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextCursor {
                pos: Point {
                    x: Pt(x_pt),
                    y: Pt(top_pt - i as f32 * line_height),
                },
            });
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(font_size_pt),
                font: BuiltinFont::Helvetica,
            });
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(line.to_string())],
                font: BuiltinFont::Helvetica,
            });
            ops.push(Op::EndTextSection);
        }

        debug!(lines = text.split('\n').count(), "Text page laid out");
        self.pages.push(PdfPage::new(Mm(w_mm), Mm(h_mm), ops));
    }

    /// Add a page of the given paper with `image` stretched into `target`.
    pub fn add_image_page(&mut self, setup: PageSetup, image: DynamicImage, target: ImageBox) {
        let (w_mm, h_mm) = setup.dimensions_mm();
        let page_h_pt = Mm(h_mm).into_pt().0;
        let box_w_pt = Mm(target.width_mm).into_pt().0;
        let box_h_pt = Mm(target.height_mm).into_pt().0;
        let x_pt = Mm(target.x_mm).into_pt().0;
        let y_pt = page_h_pt - Mm(target.y_mm).into_pt().0 - box_h_pt;

        let op = self.place_image(image, x_pt, y_pt, box_w_pt, box_h_pt);
        self.pages.push(PdfPage::new(Mm(w_mm), Mm(h_mm), vec![op]));
    }

    /// Add a page exactly the size of `image`, filled by it edge to edge.
    ///
    /// `px_per_pt` is the upscale the raster was produced at: a page
    /// rendered at scale 2 becomes a page of half its pixel size in points.
    pub fn add_full_bleed_page(&mut self, image: DynamicImage, px_per_pt: f32) {
        let px_per_pt = if px_per_pt > 0.0 { px_per_pt } else { 1.0 };
        let w_pt = image.width() as f32 / px_per_pt;
        let h_pt = image.height() as f32 / px_per_pt;

        let op = self.place_image(image, 0.0, 0.0, w_pt, h_pt);
        self.pages
            .push(PdfPage::new(pt_to_mm(w_pt), pt_to_mm(h_pt), vec![op]));
    }

    /// Consumes `image`; the document keeps only its RGB copy.
    fn place_image(&mut self, image: DynamicImage, x_pt: f32, y_pt: f32, w_pt: f32, h_pt: f32) -> Op {
        let img_w = image.width().max(1);
        let img_h = image.height().max(1);
        let rgb = image.into_rgb8();
        let raw = RawImage {
            pixels: RawImageData::U8(rgb.into_raw()),
            width: img_w as usize,
            height: img_h as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };
        let id = self.doc.add_image(&raw);

        // At IMAGE_DPI one pixel is one point; scale from there to the box.
        let scale_x = w_pt / img_w as f32;
        let scale_y = h_pt / img_h as f32;
        debug!(img_w, img_h, w_pt, h_pt, "Image placed");

        Op::UseXobject {
            id,
            transform: XObjectTransform {
                translate_x: Some(Pt(x_pt)),
                translate_y: Some(Pt(y_pt)),
                scale_x: Some(scale_x),
                scale_y: Some(scale_y),
                dpi: Some(IMAGE_DPI),
                rotate: None,
            },
        }
    }

    /// Serialise the document. An empty composer yields one blank page.
    pub fn finish(mut self, blank_setup: PageSetup) -> Vec<u8> {
        if self.pages.is_empty() {
            let (w_mm, h_mm) = blank_setup.dimensions_mm();
            self.pages.push(PdfPage::new(Mm(w_mm), Mm(h_mm), Vec::new()));
        }
        let pages = std::mem::take(&mut self.pages);
        self.doc.with_pages(pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = self.doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!(count = warnings.len(), "printpdf reported warnings");
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn media_boxes(pdf: &[u8]) -> Vec<(f32, f32)> {
        let doc = lopdf::Document::load_mem(pdf).expect("valid PDF");
        doc.get_pages()
            .values()
            .map(|id| {
                let page = doc.get_dictionary(*id).expect("page dict");
                let mb = page.get(b"MediaBox").and_then(|o| o.as_array()).expect("MediaBox");
                let num = |o: &lopdf::Object| o.as_float().or_else(|_| o.as_i64().map(|v| v as f32)).unwrap();
                (num(&mb[2]) - num(&mb[0]), num(&mb[3]) - num(&mb[1]))
            })
            .collect()
    }

    #[test]
    fn text_page_is_a_single_a4_page() {
        let mut c = PdfComposer::new("t");
        c.add_text_page(PageSetup::default(), "hello\nworld", (10.0, 10.0), 16.0);
        let pdf = c.finish(PageSetup::default());
        assert!(pdf.starts_with(b"%PDF"));
        let boxes = media_boxes(&pdf);
        assert_eq!(boxes.len(), 1);
        assert!((boxes[0].0 - 595.3).abs() < 1.0, "width {}", boxes[0].0);
        assert!((boxes[0].1 - 841.9).abs() < 1.0, "height {}", boxes[0].1);
    }

    #[test]
    fn full_bleed_pages_follow_raster_size() {
        let mut c = PdfComposer::new("m");
        let big = DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 200, Rgb([0, 0, 0])));
        let small = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 300, Rgb([9, 9, 9])));
        c.add_full_bleed_page(big, 2.0);
        c.add_full_bleed_page(small, 2.0);
        assert_eq!(c.page_count(), 2);
        let boxes = media_boxes(&c.finish(PageSetup::default()));
        assert_eq!(boxes.len(), 2);
        assert!((boxes[0].0 - 200.0).abs() < 1.0 && (boxes[0].1 - 100.0).abs() < 1.0);
        assert!((boxes[1].0 - 50.0).abs() < 1.0 && (boxes[1].1 - 150.0).abs() < 1.0);
    }

    #[test]
    fn empty_composer_yields_blank_page() {
        let pdf = PdfComposer::new("e").finish(PageSetup::default());
        assert_eq!(media_boxes(&pdf).len(), 1);
    }
}
