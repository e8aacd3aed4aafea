//! Markup handling: HTML rasterisation seam, tag stripping, escaping.
//!
//! Laying out HTML is a browser's job. The pipeline only needs "markup in,
//! raster out", so it talks to a [`MarkupRasterizer`] and ships a default
//! that declines every request. With no renderer injected, HTML input takes
//! the markup-stripping fallback in [`crate::transcode`].

use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;

/// Renders an HTML fragment, laid out off-screen, to a raster image.
pub trait MarkupRasterizer: Send + Sync {
    /// Lay `html` out in a container `width_px` wide and rasterise it at
    /// `scale`. The returned image is `width_px * scale` pixels wide.
    fn rasterize(&self, html: &str, width_px: u32, scale: f32) -> Result<DynamicImage, String>;
}

/// The default rasteriser: no layout engine, every request fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMarkupRasterizer;

impl MarkupRasterizer for NoMarkupRasterizer {
    fn rasterize(&self, _html: &str, _width_px: u32, _scale: f32) -> Result<DynamicImage, String> {
        Err("no markup rasteriser is configured".to_string())
    }
}

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Remove every `<…>` tag, keeping the text between them untouched.
pub fn strip_markup(html: &str) -> String {
    RE_TAG.replace_all(html, "").into_owned()
}

/// CRLF and lone CR become LF.
pub fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

/// Escape the characters that would otherwise be read as markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
