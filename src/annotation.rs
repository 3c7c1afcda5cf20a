//! Static rectangle annotations baked into every page

use crate::geometry::{PdfRect, Viewport};
use crate::raster::{Color, Surface};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fonts tried, in order, when no label font is configured
const FALLBACK_FONTS: &[&str] = &[
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Hiragino Sans GB.ttc",
    "/System/Library/Fonts/Helvetica.ttc",
    "C:\\Windows\\Fonts\\msgothic.ttc",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Fill and border of the static rectangles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationStyle {
    pub fill: Color,
    pub fill_opacity: f64,
    pub stroke: Color,
    /// Border width in surface pixels
    pub stroke_width: f64,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            fill: Color::RED,
            fill_opacity: 0.2,
            stroke: Color::RED,
            stroke_width: 2.0,
        }
    }
}

/// Marker text drawn above the first rectangle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    pub text: String,
    /// Font size in surface pixels
    pub font_size: f64,
    pub color: Color,
    /// Distance in surface pixels from the rectangle's top edge up to the baseline
    pub offset: f64,
    /// TrueType/OpenType font file; system fonts are tried when unset
    pub font_path: Option<PathBuf>,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            text: "This is a red rectangle 検証だ!!!".to_string(),
            font_size: 54.0,
            color: Color::RED,
            offset: 10.0,
            font_path: None,
        }
    }
}

/// Page-invariant rectangles plus their label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Rectangles in PDF space, `[x0, y0, x1, y1]`, drawn in order on every page
    pub rectangles: Vec<PdfRect>,
    pub style: AnnotationStyle,
    pub label: LabelConfig,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            rectangles: vec![
                PdfRect::new(78.3569, 557.9994082, 137.3699356, 631.74292),
                PdfRect::new(68.459, 539.6823124, 188.54441456, 551.8092124),
                PdfRect::new(68.1953, 508.45457960000005, 148.68414791, 537.6796796000001),
                PdfRect::new(68.9043, 496.3515196, 90.15819150000002, 509.1166196),
                PdfRect::new(199.6616, 485.2929383, 285.52610000000004, 532.1236383),
                PdfRect::new(197.1006, 484.46853560000005, 290.10348999999997, 496.4159356),
                PdfRect::new(301.8086, 517.6179271000001, 389.1425923, 600.5457588),
                PdfRect::new(189.15865, 494.63550931, 197.40675000000002, 543.092272),
                PdfRect::new(199.6616, 485.2929383, 285.52610000000004, 532.1236383),
                PdfRect::new(197.1006, 484.46853560000005, 290.10348999999997, 496.4159356),
            ],
            style: AnnotationStyle::default(),
            label: LabelConfig::default(),
        }
    }
}

fn load_font(path: &Path) -> Option<Arc<fontdue::Font>> {
    let data = std::fs::read(path).ok()?;
    match fontdue::Font::from_bytes(data, fontdue::FontSettings::default()) {
        Ok(font) => {
            tracing::debug!(path = %path.display(), "label font loaded");
            Some(Arc::new(font))
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = e, "unusable label font");
            None
        }
    }
}

/// Draws the configured rectangles and label onto a rendering surface
#[derive(Clone)]
pub struct StaticAnnotationOverlay {
    config: AnnotationConfig,
    font: Option<Arc<fontdue::Font>>,
}

impl StaticAnnotationOverlay {
    /// Prepare the overlay, loading the label font once.
    pub fn new(config: AnnotationConfig) -> Self {
        let font = match &config.label.font_path {
            Some(path) => load_font(path),
            None => FALLBACK_FONTS
                .iter()
                .map(Path::new)
                .filter(|path| path.exists())
                .find_map(load_font),
        };
        if font.is_none() && !config.label.text.is_empty() {
            tracing::warn!("no label font available, annotation label will be skipped");
        }
        Self { config, font }
    }

    /// Overlay that draws the label with an already loaded font
    pub fn with_font(config: AnnotationConfig, font: Option<Arc<fontdue::Font>>) -> Self {
        Self { config, font }
    }

    pub fn config(&self) -> &AnnotationConfig {
        &self.config
    }

    pub fn has_label_font(&self) -> bool {
        self.font.is_some()
    }

    /// Pixel position of the label baseline start, if there is a first rectangle
    pub fn label_anchor(&self, viewport: &Viewport) -> Option<(f64, f64)> {
        let first = self.config.rectangles.first()?;
        let (x, top) = viewport.to_pixel_point(first.x0, first.y1);
        Some((x, top - self.config.label.offset))
    }

    /// Draw every rectangle, then the label anchored on the first one.
    pub fn draw(&self, surface: &mut Surface, viewport: &Viewport) {
        let style = &self.config.style;
        let fill = style.fill.with_opacity(style.fill_opacity);
        let stroke = style.stroke.with_opacity(1.0);

        for rect in &self.config.rectangles {
            let px = viewport.to_pixel_rect(rect);
            surface.fill_rect(&px, fill);
            surface.stroke_rect(&px, stroke, style.stroke_width);
        }

        let label = &self.config.label;
        if label.text.is_empty() {
            return;
        }
        if let (Some((x, baseline)), Some(font)) = (self.label_anchor(viewport), &self.font) {
            surface.draw_text(
                font,
                &label.text,
                x,
                baseline,
                label.font_size as f32,
                label.color.with_opacity(1.0),
            );
        }
    }
}
