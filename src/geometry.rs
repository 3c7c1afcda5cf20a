//! Coordinate transforms between PDF user space and rendering-surface pixels
//!
//! PDF user space has its origin at the bottom-left of the page with y growing
//! upward. The rendering surface (and the overlay layer stacked on it) has its
//! origin at the top-left with y growing downward. Every conversion goes through
//! a [`Viewport`], which carries the single scale factor used for one page render.

use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Intrinsic page size in PDF points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Portrait when the page is at least as tall as it is wide
    pub fn orientation(&self) -> Orientation {
        if self.width > self.height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// Page orientation of an output document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// Normalize a page size to this orientation, swapping width and height
    /// when the page disagrees with it.
    pub fn apply(&self, size: PageSize) -> PageSize {
        match (self, size.orientation()) {
            (Orientation::Portrait, Orientation::Landscape)
            | (Orientation::Landscape, Orientation::Portrait) => {
                PageSize::new(size.height, size.width)
            }
            _ => size,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }
}

/// Rectangle in PDF user space.
///
/// `(x0, y0)` is the bottom-left corner and `(x1, y1)` the top-right corner.
/// Configuration lists spell rectangles as `[x0, y0, x1, y1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct PdfRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl From<[f64; 4]> for PdfRect {
    fn from([x0, y0, x1, y1]: [f64; 4]) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

impl From<PdfRect> for [f64; 4] {
    fn from(rect: PdfRect) -> Self {
        [rect.x0, rect.y0, rect.x1, rect.y1]
    }
}

impl PdfRect {
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Reject non-finite coordinates and zero or negative extents.
    pub fn validate(&self) -> Result<()> {
        if ![self.x0, self.y0, self.x1, self.y1]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(Error::GeometryConfig {
                reason: format!("rectangle {:?} has non-finite coordinates", self),
            });
        }
        if self.x1 <= self.x0 || self.y1 <= self.y0 {
            return Err(Error::GeometryConfig {
                reason: format!(
                    "rectangle [{}, {}, {}, {}] has zero or negative extent",
                    self.x0, self.y0, self.x1, self.y1
                ),
            });
        }
        Ok(())
    }
}

/// Rectangle on the rendering surface, top-left origin, pixel units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Reject a scale factor that is zero, negative or not finite.
pub fn validate_scale(scale: f64) -> Result<()> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(Error::GeometryConfig {
            reason: format!("scale must be a positive finite number, got {}", scale),
        });
    }
    Ok(())
}

/// Scaled, pixel-space view of one PDF page.
///
/// All PDF-to-pixel conversions for a page go through the same viewport so the
/// raster size, static rectangles and text highlights share one scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    width: f64,
    height: f64,
    scale: f64,
}

impl Viewport {
    /// Build the viewport for a page of the given intrinsic size.
    pub fn new(page: PageSize, scale: f64) -> Result<Self> {
        validate_scale(scale)?;
        if !(page.width.is_finite() && page.height.is_finite())
            || page.width <= 0.0
            || page.height <= 0.0
        {
            return Err(Error::GeometryConfig {
                reason: format!(
                    "page size must be positive, got {}x{}",
                    page.width, page.height
                ),
            });
        }

        Ok(Self {
            width: page.width * scale,
            height: page.height * scale,
            scale,
        })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Size of the raster backing this viewport, rounded up to whole pixels
    pub fn pixel_size(&self) -> (u32, u32) {
        (self.width.ceil() as u32, self.height.ceil() as u32)
    }

    /// Intrinsic page size this viewport was derived from
    pub fn page_size(&self) -> PageSize {
        PageSize::new(self.width / self.scale, self.height / self.scale)
    }

    /// Map a PDF-space point to pixel space, flipping the vertical axis.
    pub fn to_pixel_point(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale, self.height - y * self.scale)
    }

    /// Map a pixel-space point back to PDF space.
    pub fn to_pdf_point(&self, px: f64, py: f64) -> (f64, f64) {
        (px / self.scale, (self.height - py) / self.scale)
    }

    /// Map a PDF-space rectangle to pixel space.
    ///
    /// The top edge comes from `y1`, the larger PDF y, since the flip inverts
    /// vertical ordering.
    pub fn to_pixel_rect(&self, rect: &PdfRect) -> PixelRect {
        let (left, top) = self.to_pixel_point(rect.x0, rect.y1);
        PixelRect {
            left,
            top,
            width: rect.width() * self.scale,
            height: rect.height() * self.scale,
        }
    }

    /// Inverse of [`Viewport::to_pixel_rect`].
    pub fn to_pdf_rect(&self, rect: &PixelRect) -> PdfRect {
        let (x0, y1) = self.to_pdf_point(rect.left, rect.top);
        PdfRect {
            x0,
            y0: y1 - rect.height / self.scale,
            x1: x0 + rect.width / self.scale,
            y1,
        }
    }

    /// Box covering a text fragment whose baseline anchor is `(x, y)`.
    ///
    /// The anchor sits on the baseline, so the box extends upward from it by the
    /// scaled fragment height.
    pub fn text_box(&self, x: f64, y: f64, width: f64, height: f64) -> PixelRect {
        let (left, baseline) = self.to_pixel_point(x, y);
        let scaled_height = height * self.scale;
        PixelRect {
            left,
            top: baseline - scaled_height,
            width: width * self.scale,
            height: scaled_height,
        }
    }
}
