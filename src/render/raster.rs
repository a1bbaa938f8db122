//! Software rasterizer: [`Scene`] → [`RgbaImage`].
//!
//! The image covers the scene bounds plus a small margin.  Deck y points up,
//! image rows go down, so every point is flipped on the way in.  Text labels
//! are skipped; there is no font to draw them with.

use std::path::Path;

use image::{ImageFormat, RgbaImage};

use crate::core::geometry::{Coordinate, Rect};
use crate::core::tree::ResourceTree;

use super::palette::{Rgba, WHITE};
use super::scene::{Scene, Shape, Stroke};

pub const DEFAULT_PIXELS_PER_MM: f64 = 1.0;
const MARGIN_MM: f64 = 5.0;
/// Longest image side; larger scenes are scaled down to fit.
const MAX_SIDE_PX: f64 = 4096.0;

#[derive(Debug, Clone, Copy)]
pub struct Rasterizer {
    pub pixels_per_mm: f64,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self {
            pixels_per_mm: DEFAULT_PIXELS_PER_MM,
        }
    }
}

impl Rasterizer {
    pub fn new(pixels_per_mm: f64) -> Self {
        if pixels_per_mm.is_finite() && pixels_per_mm > 0.0 {
            Self { pixels_per_mm }
        } else {
            tracing::warn!("invalid pixels_per_mm {pixels_per_mm}, using {DEFAULT_PIXELS_PER_MM}");
            Self::default()
        }
    }

    pub fn render(&self, scene: &Scene, tree: &ResourceTree) -> RgbaImage {
        let Some(bounds) = scene.bounds() else {
            return RgbaImage::from_pixel(1, 1, pixel(WHITE));
        };
        let view = Rect::new(
            bounds.x - MARGIN_MM,
            bounds.y - MARGIN_MM,
            bounds.width + 2.0 * MARGIN_MM,
            bounds.height + 2.0 * MARGIN_MM,
        );
        let scale = self.pixels_per_mm.min(MAX_SIDE_PX / view.width.max(view.height));
        let width = (view.width * scale).round().max(1.0) as u32;
        let height = (view.height * scale).round().max(1.0) as u32;

        let mut canvas = Canvas {
            img: RgbaImage::from_pixel(width, height, pixel(WHITE)),
            view,
            scale,
        };
        for item in scene.ordered(tree) {
            for shape in &item.shapes {
                canvas.draw(shape);
            }
        }
        canvas.img
    }

    /// Render and write a PNG snapshot.
    pub fn save_png(&self, scene: &Scene, tree: &ResourceTree, path: &Path) -> Result<(), image::ImageError> {
        let img = self.render(scene, tree);
        img.save_with_format(path, ImageFormat::Png)?;
        tracing::info!("wrote {}x{} snapshot to {}", img.width(), img.height(), path.display());
        Ok(())
    }
}

fn pixel(c: Rgba) -> image::Rgba<u8> {
    image::Rgba([c.r, c.g, c.b, c.a])
}

// ───────────────────────────────────────── canvas ────────────

struct Canvas {
    img: RgbaImage,
    view: Rect,
    scale: f64,
}

impl Canvas {
    /// Deck millimetres → fractional pixel position.
    fn to_px(&self, p: Coordinate) -> (f64, f64) {
        ((p.x - self.view.x) * self.scale, (self.view.top() - p.y) * self.scale)
    }

    fn stroke_px(&self, stroke: &Stroke) -> f64 {
        (stroke.width * self.scale).max(1.0)
    }

    fn draw(&mut self, shape: &Shape) {
        match shape {
            Shape::Rect { rect, fill, stroke } => {
                let (x0, y0) = self.to_px(Coordinate::xy(rect.x, rect.top()));
                let (x1, y1) = self.to_px(Coordinate::xy(rect.right(), rect.y));
                if let Some(fill) = fill {
                    self.fill_box(x0, y0, x1, y1, *fill);
                }
                if let Some(stroke) = stroke {
                    let w = self.stroke_px(stroke);
                    let half = w / 2.0;
                    self.fill_box(x0 - half, y0 - half, x1 + half, y0 + half, stroke.color);
                    self.fill_box(x0 - half, y1 - half, x1 + half, y1 + half, stroke.color);
                    self.fill_box(x0 - half, y0 - half, x0 + half, y1 + half, stroke.color);
                    self.fill_box(x1 - half, y0 - half, x1 + half, y1 + half, stroke.color);
                }
            }
            Shape::Circle {
                center,
                radius,
                fill,
                stroke,
            } => {
                let (cx, cy) = self.to_px(*center);
                let r = radius * self.scale;
                if let Some(fill) = fill {
                    self.disc(cx, cy, r, None, *fill);
                }
                if let Some(stroke) = stroke {
                    let w = self.stroke_px(stroke);
                    self.disc(cx, cy, r + w / 2.0, Some(r - w / 2.0), stroke.color);
                }
            }
            Shape::Line { from, to, stroke } => {
                let (x0, y0) = self.to_px(*from);
                let (x1, y1) = self.to_px(*to);
                let w = self.stroke_px(stroke);
                self.line(x0, y0, x1, y1, w, stroke.color);
            }
            Shape::Label { .. } => {}
        }
    }

    fn blend(&mut self, px: i64, py: i64, c: Rgba) {
        if px < 0 || py < 0 || px >= i64::from(self.img.width()) || py >= i64::from(self.img.height()) {
            return;
        }
        let dst = self.img.get_pixel_mut(px as u32, py as u32);
        let a = f64::from(c.a) / 255.0;
        let mix = |src: u8, dst: u8| (f64::from(src) * a + f64::from(dst) * (1.0 - a)).round() as u8;
        dst.0 = [mix(c.r, dst[0]), mix(c.g, dst[1]), mix(c.b, dst[2]), 255];
    }

    /// Fill pixels whose centres fall inside the box.
    fn fill_box(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, c: Rgba) {
        let (x0, x1) = (x0.min(x1), x0.max(x1));
        let (y0, y1) = (y0.min(y1), y0.max(y1));
        let cols = (x0.round() as i64)..(x1.round() as i64).max(x0.round() as i64 + 1);
        let rows = (y0.round() as i64)..(y1.round() as i64).max(y0.round() as i64 + 1);
        for py in rows {
            for px in cols.clone() {
                self.blend(px, py, c);
            }
        }
    }

    /// Disc of radius `outer`, or a ring when `inner` is given.
    fn disc(&mut self, cx: f64, cy: f64, outer: f64, inner: Option<f64>, c: Rgba) {
        let inner = inner.unwrap_or(-1.0).max(-1.0);
        let x_range = ((cx - outer).floor() as i64)..=((cx + outer).ceil() as i64);
        let y_range = ((cy - outer).floor() as i64)..=((cy + outer).ceil() as i64);
        for py in y_range {
            for px in x_range.clone() {
                let dx = px as f64 + 0.5 - cx;
                let dy = py as f64 + 0.5 - cy;
                let d = (dx * dx + dy * dy).sqrt();
                if d <= outer && d >= inner {
                    self.blend(px, py, c);
                }
            }
        }
    }

    fn line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, width: f64, c: Rgba) {
        let steps = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0) as i64;
        let half = width / 2.0;
        let mut last = None;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let x = x0 + (x1 - x0) * t;
            let y = y0 + (y1 - y0) * t;
            let key = (x.round() as i64, y.round() as i64);
            if last == Some(key) {
                continue;
            }
            last = Some(key);
            self.fill_box(x - half, y - half, x + half, y + half, c);
        }
    }
}
