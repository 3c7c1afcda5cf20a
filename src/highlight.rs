//! Keyword matching and the highlight overlay layer
//!
//! Highlights live in an [`OverlayLayer`], an ordered collection of
//! [`HighlightRegion`] values kept apart from the rendering surface. The layer is
//! painted over the surface on demand (see [`crate::raster::Surface::paint_highlights`]),
//! which lets the same regions serve an interactive overlay and the flattened export.

use crate::error::{Error, Result};
use crate::geometry::{PixelRect, Viewport};
use crate::raster::Color;
use crate::text::PositionedTextItem;
use image::Rgba;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Fill style of a highlight region. Highlights have no border and never
/// intercept pointer input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct HighlightStyle {
    pub color: Color,
    pub opacity: f64,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            color: Color::YELLOW,
            opacity: 0.3,
        }
    }
}

impl HighlightStyle {
    pub fn pixel(&self) -> Rgba<u8> {
        self.color.with_opacity(self.opacity)
    }
}

/// Highlight box in rendering-surface pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, JsonSchema)]
pub struct HighlightRegion {
    #[serde(flatten)]
    pub rect: PixelRect,
    pub style: HighlightStyle,
}

/// Ordered, case-sensitive set of keyword substrings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    /// Build a keyword set. Empty keywords are rejected since they would match
    /// every text item.
    pub fn new<I, S>(keywords: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keywords: Vec<String> = keywords.into_iter().map(Into::into).collect();
        if let Some(index) = keywords.iter().position(|k| k.is_empty()) {
            return Err(Error::InvalidConfig {
                reason: format!("keyword #{} is empty", index + 1),
            });
        }
        Ok(Self { keywords })
    }

    /// True when `text` contains any keyword
    pub fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|keyword| text.contains(keyword.as_str()))
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

/// Highlight regions for every item whose text contains a keyword.
///
/// Each matching item yields exactly one region, however many keywords it
/// contains; adjacent matches are not merged.
pub fn match_keywords(
    items: &[PositionedTextItem],
    viewport: &Viewport,
    keywords: &KeywordSet,
    style: HighlightStyle,
) -> Vec<HighlightRegion> {
    items
        .iter()
        .filter(|item| keywords.matches(&item.text))
        .map(|item| {
            let (x, y) = item.anchor();
            HighlightRegion {
                rect: viewport.text_box(x, y, item.width, item.height),
                style,
            }
        })
        .collect()
}

/// Highlight regions stacked over the current page
#[derive(Debug, Clone, Default)]
pub struct OverlayLayer {
    regions: Vec<HighlightRegion>,
}

impl OverlayLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every region from the previous render
    pub fn clear(&mut self) {
        self.regions.clear();
    }

    /// Replace the layer's content with `regions`
    pub fn rebuild(&mut self, regions: Vec<HighlightRegion>) {
        self.regions = regions;
    }

    pub fn regions(&self) -> &[HighlightRegion] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
