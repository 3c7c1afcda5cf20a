//! Rendering surface and compositing primitives

use crate::error::{Error, Result};
use crate::geometry::PixelRect;
use crate::highlight::HighlightRegion;
use image::{Pixel, Rgb, RgbImage, Rgba, RgbaImage};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Opaque RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// RGBA pixel with alpha taken from an opacity in `[0, 1]`
    pub fn with_opacity(self, opacity: f64) -> Rgba<u8> {
        let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgba([self.r, self.g, self.b, alpha])
    }
}

/// Half-open pixel span `[start, end)` whose pixel centers fall inside `[lo, hi)`,
/// clamped to `[0, limit)`.
fn pixel_span(lo: f64, hi: f64, limit: u32) -> (u32, u32) {
    let start = (lo - 0.5).ceil().max(0.0);
    let end = (hi - 0.5).ceil().min(limit as f64);
    if end <= start {
        return (0, 0);
    }
    (start as u32, end as u32)
}

fn contains_center(rect: &PixelRect, x: u32, y: u32) -> bool {
    let cx = x as f64 + 0.5;
    let cy = y as f64 + 0.5;
    cx >= rect.left && cx < rect.right() && cy >= rect.top && cy < rect.bottom()
}

/// Pixel buffer a page is rasterized and annotated onto
#[derive(Debug, Clone)]
pub struct Surface {
    image: RgbaImage,
}

impl Surface {
    /// Blank white surface
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, Color::WHITE.with_opacity(1.0)),
        }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Replace the whole buffer, e.g. with a freshly rasterized page
    pub fn replace(&mut self, image: RgbaImage) {
        self.image = image;
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Alpha-blend `color` over every pixel whose center lies in `rect`.
    pub fn fill_rect(&mut self, rect: &PixelRect, color: Rgba<u8>) {
        let (x0, x1) = pixel_span(rect.left, rect.right(), self.width());
        let (y0, y1) = pixel_span(rect.top, rect.bottom(), self.height());
        for y in y0..y1 {
            for x in x0..x1 {
                self.image.get_pixel_mut(x, y).blend(&color);
            }
        }
    }

    /// Stroke the outline of `rect` with a line of `line_width` pixels centered
    /// on its edges. Each covered pixel is blended once, corners included.
    pub fn stroke_rect(&mut self, rect: &PixelRect, color: Rgba<u8>, line_width: f64) {
        if line_width <= 0.0 {
            return;
        }
        let half = line_width / 2.0;
        let outer = PixelRect {
            left: rect.left - half,
            top: rect.top - half,
            width: rect.width + line_width,
            height: rect.height + line_width,
        };
        let inner = PixelRect {
            left: rect.left + half,
            top: rect.top + half,
            width: (rect.width - line_width).max(0.0),
            height: (rect.height - line_width).max(0.0),
        };

        let (x0, x1) = pixel_span(outer.left, outer.right(), self.width());
        let (y0, y1) = pixel_span(outer.top, outer.bottom(), self.height());
        for y in y0..y1 {
            for x in x0..x1 {
                if !contains_center(&inner, x, y) {
                    self.image.get_pixel_mut(x, y).blend(&color);
                }
            }
        }
    }

    /// Draw `text` with its baseline starting at `(x, baseline)`.
    pub fn draw_text(
        &mut self,
        font: &fontdue::Font,
        text: &str,
        x: f64,
        baseline: f64,
        size_px: f32,
        color: Rgba<u8>,
    ) {
        let mut pen_x = x;
        for ch in text.chars() {
            let (metrics, coverage) = font.rasterize(ch, size_px);
            let glyph_left = pen_x.round() as i64 + metrics.xmin as i64;
            let glyph_top =
                baseline.round() as i64 - metrics.ymin as i64 - metrics.height as i64;

            for row in 0..metrics.height {
                for col in 0..metrics.width {
                    let value = coverage[row * metrics.width + col];
                    if value == 0 {
                        continue;
                    }
                    let px = glyph_left + col as i64;
                    let py = glyph_top + row as i64;
                    if px < 0 || py < 0 || px >= self.width() as i64 || py >= self.height() as i64
                    {
                        continue;
                    }
                    let alpha = (color[3] as u32 * value as u32 / 255) as u8;
                    let ink = Rgba([color[0], color[1], color[2], alpha]);
                    self.image.get_pixel_mut(px as u32, py as u32).blend(&ink);
                }
            }
            pen_x += metrics.advance_width as f64;
        }
    }

    /// Paint overlay regions onto this surface in order.
    pub fn paint_highlights(&mut self, regions: &[HighlightRegion]) {
        for region in regions {
            self.fill_rect(&region.rect, region.style.pixel());
        }
    }

    /// Copy of the surface with the overlay regions baked in
    pub fn flattened(&self, regions: &[HighlightRegion]) -> RgbaImage {
        let mut flat = self.clone();
        flat.paint_highlights(regions);
        flat.into_image()
    }
}

/// Composite an RGBA image over a white background, dropping alpha.
pub fn to_opaque_rgb(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let mut base = Color::WHITE.with_opacity(1.0);
        base.blend(image.get_pixel(x, y));
        Rgb([base[0], base[1], base[2]])
    })
}

/// Encode an RGBA image as PNG
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    image
        .write_to(
            &mut std::io::Cursor::new(&mut png_bytes),
            image::ImageFormat::Png,
        )
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to encode image as PNG: {}", e),
        })?;
    Ok(png_bytes)
}
