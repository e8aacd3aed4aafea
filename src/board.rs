//! Headless drawing board.
//!
//! A white RGBA canvas that replays drawing actions (freehand pen and
//! eraser strokes, straight lines, rectangles, circles, text, placed
//! images) and keeps a bounded snapshot history for undo/redo. Boards are driven by
//! JSON scripts of [`BoardAction`]s and exported as PNG or single-page PDF.

use crate::config::PageSetup;
use crate::error::DocShiftError;
use crate::pipeline::compose::PdfComposer;
use crate::pipeline::encode::encode_png;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use rusttype::{point, Font, Scale};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_WIDTH: u32 = 1241;
pub const DEFAULT_HEIGHT: u32 = 600;

/// Largest canvas side a script may ask for.
pub const MAX_SIDE: u32 = 8192;

/// Coordinates further than this from the origin are rejected.
const COORD_LIMIT: f32 = 1_000_000.0;

/// Snapshots kept for undo, the current state included.
pub const HISTORY_LIMIT: usize = 50;

/// Largest share of the board a placed image may cover along either axis.
const IMAGE_FILL: f32 = 0.3;

/// Canvas pixels per PDF point on export (CSS px are 3/4 pt).
const PX_PER_PT: f32 = 96.0 / 72.0;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Text size in px per unit of stroke width.
const TEXT_SIZE_PER_WIDTH: f32 = 8.0;

/// Font files tried for the text tool when neither the script nor
/// `DOCSHIFT_FONT` names one.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

fn default_color() -> [u8; 3] {
    [0, 0, 0]
}

fn default_width() -> f32 {
    3.0
}

/// One step of a board script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum BoardAction {
    /// Freehand stroke through `points`.
    Pen {
        points: Vec<(f32, f32)>,
        #[serde(default = "default_color")]
        color: [u8; 3],
        #[serde(default = "default_width")]
        width: f32,
    },
    /// Freehand stroke painting the background colour.
    Eraser {
        points: Vec<(f32, f32)>,
        #[serde(default = "default_width")]
        width: f32,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        #[serde(default = "default_color")]
        color: [u8; 3],
        #[serde(default = "default_width")]
        width: f32,
    },
    /// Outline of the rectangle spanned by two corners.
    Rectangle {
        from: (f32, f32),
        to: (f32, f32),
        #[serde(default = "default_color")]
        color: [u8; 3],
        #[serde(default = "default_width")]
        width: f32,
    },
    /// Circle around `center` passing through `edge`.
    Circle {
        center: (f32, f32),
        edge: (f32, f32),
        #[serde(default = "default_color")]
        color: [u8; 3],
        #[serde(default = "default_width")]
        width: f32,
    },
    /// Single line of text with its baseline starting at `at`.
    Text {
        at: (f32, f32),
        content: String,
        #[serde(default = "default_color")]
        color: [u8; 3],
        /// Font size in px; eight times `width` when absent.
        #[serde(default)]
        size: Option<f32>,
        #[serde(default = "default_width")]
        width: f32,
    },
    /// PNG or JPEG file, scaled down to fit and centred.
    Image { path: PathBuf },
    Clear,
    Undo,
    Redo,
}

/// A board script: optional canvas size plus the actions to replay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardScript {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// TrueType font for text actions.
    #[serde(default)]
    pub font: Option<PathBuf>,
    pub actions: Vec<BoardAction>,
}

impl BoardScript {
    pub fn from_json(json: &str) -> Result<Self, DocShiftError> {
        serde_json::from_str(json)
            .map_err(|e| DocShiftError::InvalidConfig(format!("Invalid board script: {e}")))
    }

    /// Make relative image and font paths relative to `base` instead of
    /// the working directory.
    pub fn resolve_paths(&mut self, base: &Path) {
        if let Some(font) = &mut self.font {
            if font.is_relative() {
                *font = base.join(&*font);
            }
        }
        for action in &mut self.actions {
            if let BoardAction::Image { path } = action {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }

    /// A fresh board of the script's size with every action applied.
    pub fn render(&self) -> Result<DrawingBoard, DocShiftError> {
        let width = self.width.unwrap_or(DEFAULT_WIDTH);
        let height = self.height.unwrap_or(DEFAULT_HEIGHT);
        if width == 0 || height == 0 || width > MAX_SIDE || height > MAX_SIDE {
            return Err(DocShiftError::InvalidConfig(format!(
                "Board size {width}x{height} is outside 1..={MAX_SIDE} px"
            )));
        }
        let mut board = DrawingBoard::new(width, height);
        if let Some(path) = &self.font {
            board.set_font(load_font(path)?);
        }
        for action in &self.actions {
            board.apply(action)?;
        }
        Ok(board)
    }
}

/// Load a TrueType/OpenType font file for the text tool.
pub fn load_font(path: &Path) -> Result<Font<'static>, DocShiftError> {
    let data = std::fs::read(path).map_err(|source| DocShiftError::FileUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Font::try_from_vec(data).ok_or_else(|| {
        DocShiftError::InvalidConfig(format!("{} is not a usable font", path.display()))
    })
}

/// First loadable font from `DOCSHIFT_FONT` or the usual system locations.
fn find_font() -> Option<Font<'static>> {
    let configured = std::env::var_os("DOCSHIFT_FONT").map(PathBuf::from);
    configured
        .into_iter()
        .chain(FONT_CANDIDATES.iter().map(PathBuf::from))
        .find_map(|path| match load_font(&path) {
            Ok(font) => {
                debug!("Text font: {}", path.display());
                Some(font)
            }
            Err(_) => None,
        })
}

enum FontSlot {
    Unresolved,
    Ready(Font<'static>),
    Missing,
}

/// Raster canvas with undo/redo history.
pub struct DrawingBoard {
    canvas: RgbaImage,
    history: Vec<RgbaImage>,
    step: usize,
    font: FontSlot,
}

impl std::fmt::Debug for DrawingBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawingBoard")
            .field("width", &self.canvas.width())
            .field("height", &self.canvas.height())
            .field("history", &self.history.len())
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

impl Default for DrawingBoard {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl DrawingBoard {
    /// A blank board; each side is clamped to `1..=MAX_SIDE`.
    pub fn new(width: u32, height: u32) -> Self {
        let canvas = RgbaImage::from_pixel(
            width.clamp(1, MAX_SIDE),
            height.clamp(1, MAX_SIDE),
            BACKGROUND,
        );
        Self {
            history: vec![canvas.clone()],
            canvas,
            step: 0,
            font: FontSlot::Unresolved,
        }
    }

    /// Use `font` for text actions instead of looking one up.
    pub fn set_font(&mut self, font: Font<'static>) {
        self.font = FontSlot::Ready(font);
    }

    fn font(&mut self) -> Result<Font<'static>, DocShiftError> {
        if let FontSlot::Unresolved = self.font {
            self.font = match find_font() {
                Some(font) => FontSlot::Ready(font),
                None => {
                    warn!("No font found for the text tool");
                    FontSlot::Missing
                }
            };
        }
        match &self.font {
            FontSlot::Ready(font) => Ok(font.clone()),
            _ => Err(DocShiftError::InvalidConfig(
                "No font available for text; set DOCSHIFT_FONT or the script's \"font\"".into(),
            )),
        }
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    fn diagonal(&self) -> f32 {
        (self.width() as f32).hypot(self.height() as f32)
    }

    pub fn can_undo(&self) -> bool {
        self.step > 0
    }

    pub fn can_redo(&self) -> bool {
        self.step + 1 < self.history.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Apply one action. Drawing actions commit a history snapshot;
    /// `Undo`/`Redo` with nothing to step to are no-ops.
    ///
    /// # Errors
    /// [`DocShiftError::InvalidConfig`] for non-finite or far out-of-range
    /// coordinates and widths; the board is left untouched.
    pub fn apply(&mut self, action: &BoardAction) -> Result<(), DocShiftError> {
        check_geometry(action)?;
        match action {
            BoardAction::Pen {
                points,
                color,
                width,
            } => self.stroke(points, rgba(*color), *width),
            BoardAction::Eraser { points, width } => self.stroke(points, BACKGROUND, *width),
            BoardAction::Line {
                from,
                to,
                color,
                width,
            } => self.stroke(&[*from, *to], rgba(*color), *width),
            BoardAction::Rectangle {
                from,
                to,
                color,
                width,
            } => {
                let corners = [*from, (to.0, from.1), *to, (from.0, to.1), *from];
                self.stroke(&corners, rgba(*color), *width)
            }
            BoardAction::Circle {
                center,
                edge,
                color,
                width,
            } => {
                let radius = ((edge.0 - center.0).powi(2) + (edge.1 - center.1).powi(2)).sqrt();
                let max_points = 4 * (self.width() + self.height()) as usize;
                let outline = circle_outline(*center, radius, max_points);
                self.stroke(&outline, rgba(*color), *width)
            }
            BoardAction::Text {
                at,
                content,
                color,
                size,
                width,
            } => {
                let size = size.unwrap_or(width * TEXT_SIZE_PER_WIDTH);
                self.text(*at, content, rgba(*color), size)?
            }
            BoardAction::Image { path } => {
                let image = image::open(path).map_err(|e| DocShiftError::ImageDecodeFailed {
                    name: path.display().to_string(),
                    detail: e.to_string(),
                })?;
                self.place_image(&image)
            }
            BoardAction::Clear => self.clear(),
            BoardAction::Undo => {
                self.undo();
            }
            BoardAction::Redo => {
                self.redo();
            }
        }
        Ok(())
    }

    /// Draw a polyline through `points` with round caps and joins.
    ///
    /// Widths are capped at the canvas diagonal and segments are clipped to
    /// the canvas, so far-away geometry costs nothing.
    pub fn stroke(&mut self, points: &[(f32, f32)], color: Rgba<u8>, width: f32) {
        let width = width.min(self.diagonal());
        match points {
            [] => return,
            [only] => stamp(&mut self.canvas, *only, width, color),
            _ => {
                for pair in points.windows(2) {
                    segment(&mut self.canvas, pair[0], pair[1], width, color);
                }
            }
        }
        self.commit();
    }

    /// Draw `content` on one line, baseline starting at `at`, with glyph
    /// coverage blended over the canvas. Sizes are capped at the canvas
    /// diagonal.
    pub fn text(
        &mut self,
        at: (f32, f32),
        content: &str,
        color: Rgba<u8>,
        size: f32,
    ) -> Result<(), DocShiftError> {
        let font = self.font()?;
        let scale = Scale::uniform(size.min(self.diagonal()));
        let (w, h) = (self.width() as i32, self.height() as i32);
        for glyph in font.layout(content, scale, point(at.0, at.1)) {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            if bb.max.x < 0 || bb.max.y < 0 || bb.min.x >= w || bb.min.y >= h {
                continue;
            }
            let canvas = &mut self.canvas;
            glyph.draw(|gx, gy, coverage| {
                let (x, y) = (bb.min.x + gx as i32, bb.min.y + gy as i32);
                if x >= 0 && y >= 0 && x < w && y < h {
                    blend(canvas.get_pixel_mut(x as u32, y as u32), color, coverage);
                }
            });
        }
        self.commit();
        Ok(())
    }

    /// Scale `image` to at most 30 % of the board on either axis (never
    /// up) and draw it centred.
    pub fn place_image(&mut self, image: &DynamicImage) {
        let (iw, ih) = (image.width().max(1) as f32, image.height().max(1) as f32);
        let scale = (self.width() as f32 / iw * IMAGE_FILL)
            .min(self.height() as f32 / ih * IMAGE_FILL)
            .min(1.0);
        let w = ((iw * scale).round() as u32).max(1);
        let h = ((ih * scale).round() as u32).max(1);
        let resized = imageops::resize(&image.to_rgba8(), w, h, FilterType::Triangle);
        let x = (self.width() as i64 - w as i64) / 2;
        let y = (self.height() as i64 - h as i64) / 2;
        imageops::overlay(&mut self.canvas, &resized, x, y);
        debug!("Placed {}x{} image at ({}, {})", w, h, x, y);
        self.commit();
    }

    /// Fill the board with the background colour.
    pub fn clear(&mut self) {
        self.canvas = RgbaImage::from_pixel(self.width(), self.height(), BACKGROUND);
        self.commit();
    }

    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.step -= 1;
        self.canvas = self.history[self.step].clone();
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.step += 1;
        self.canvas = self.history[self.step].clone();
        true
    }

    /// Record the current canvas, dropping any redo tail and the oldest
    /// snapshot beyond [`HISTORY_LIMIT`].
    fn commit(&mut self) {
        self.history.truncate(self.step + 1);
        self.history.push(self.canvas.clone());
        if self.history.len() > HISTORY_LIMIT {
            self.history.remove(0);
        }
        self.step = self.history.len() - 1;
    }

    pub fn to_png(&self) -> Result<Vec<u8>, DocShiftError> {
        encode_png(&DynamicImage::ImageRgba8(self.canvas.clone()), 1)
    }

    /// One PDF page the size of the canvas, filled by it.
    pub fn to_pdf(&self) -> Vec<u8> {
        let mut composer = PdfComposer::new("drawing");
        composer.add_full_bleed_page(DynamicImage::ImageRgba8(self.canvas.clone()), PX_PER_PT);
        composer.finish(PageSetup::default())
    }
}

fn rgba([r, g, b]: [u8; 3]) -> Rgba<u8> {
    Rgba([r, g, b, 255])
}

fn blend(px: &mut Rgba<u8>, color: Rgba<u8>, coverage: f32) {
    let a = coverage.clamp(0.0, 1.0);
    for c in 0..3 {
        px.0[c] = (px.0[c] as f32 * (1.0 - a) + color.0[c] as f32 * a).round() as u8;
    }
}

fn stamp(canvas: &mut RgbaImage, (x, y): (f32, f32), width: f32, color: Rgba<u8>) {
    if width <= 1.0 {
        if x >= 0.0 && y >= 0.0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
            canvas.put_pixel(x as u32, y as u32, color);
        }
        return;
    }
    let radius = (width / 2.0).round() as i32;
    draw_filled_circle_mut(canvas, (x.round() as i32, y.round() as i32), radius, color);
}

fn segment(canvas: &mut RgbaImage, a: (f32, f32), b: (f32, f32), width: f32, color: Rgba<u8>) {
    let margin = width.max(1.0);
    let bounds = (
        -margin,
        -margin,
        canvas.width() as f32 + margin,
        canvas.height() as f32 + margin,
    );
    let Some((a, b)) = clip_segment(a, b, bounds) else {
        return;
    };
    if width <= 1.0 {
        draw_line_segment_mut(canvas, a, b, color);
        return;
    }
    let len = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
    let spacing = (width / 4.0).max(1.0);
    let steps = (len / spacing).ceil().max(1.0) as usize;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        stamp(canvas, (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t), width, color);
    }
}

/// Liang-Barsky clip of `a`-`b` to `(x0, y0, x1, y1)`; `None` when the
/// segment misses the rectangle.
fn clip_segment(
    a: (f32, f32),
    b: (f32, f32),
    (x0, y0, x1, y1): (f32, f32, f32, f32),
) -> Option<((f32, f32), (f32, f32))> {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for (p, q) in [(-dx, a.0 - x0), (dx, x1 - a.0), (-dy, a.1 - y0), (dy, y1 - a.1)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    Some(((a.0 + t0 * dx, a.1 + t0 * dy), (a.0 + t1 * dx, a.1 + t1 * dy)))
}

fn check_geometry(action: &BoardAction) -> Result<(), DocShiftError> {
    match action {
        BoardAction::Pen { points, width, .. } | BoardAction::Eraser { points, width } => {
            check_stroke(points, *width)
        }
        BoardAction::Line { from, to, width, .. }
        | BoardAction::Rectangle { from, to, width, .. } => check_stroke(&[*from, *to], *width),
        BoardAction::Circle {
            center, edge, width, ..
        } => check_stroke(&[*center, *edge], *width),
        BoardAction::Text { at, size, width, .. } => {
            if let Some(size) = size {
                if !size.is_finite() || *size < 0.0 {
                    return Err(DocShiftError::InvalidConfig(format!(
                        "Invalid text size {size}"
                    )));
                }
            }
            check_stroke(&[*at], *width)
        }
        BoardAction::Image { .. } | BoardAction::Clear | BoardAction::Undo | BoardAction::Redo => {
            Ok(())
        }
    }
}

fn check_stroke(points: &[(f32, f32)], width: f32) -> Result<(), DocShiftError> {
    if !width.is_finite() || width < 0.0 {
        return Err(DocShiftError::InvalidConfig(format!(
            "Invalid stroke width {width}"
        )));
    }
    let in_range = |v: f32| v.is_finite() && v.abs() <= COORD_LIMIT;
    match points.iter().find(|(x, y)| !(in_range(*x) && in_range(*y))) {
        Some((x, y)) => Err(DocShiftError::InvalidConfig(format!(
            "Point ({x}, {y}) is not a finite coordinate within ±{COORD_LIMIT}"
        ))),
        None => Ok(()),
    }
}

/// Points around a circle, one per ~2 px of circumference, at most
/// `max_points`.
fn circle_outline(center: (f32, f32), radius: f32, max_points: usize) -> Vec<(f32, f32)> {
    let n = ((std::f32::consts::TAU * radius / 2.0).ceil() as usize)
        .min(max_points)
        .max(16);
    (0..=n)
        .map(|i| {
            let a = std::f32::consts::TAU * i as f32 / n as f32;
            (center.0 + radius * a.cos(), center.1 + radius * a.sin())
        })
        .collect()
}
