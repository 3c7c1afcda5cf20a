//! Server and highlighting configuration

use crate::annotation::AnnotationConfig;
use crate::error::{Error, Result};
use crate::geometry::validate_scale;
use crate::highlight::{HighlightStyle, KeywordSet};
use serde::{Deserialize, Serialize};

/// Default file name of the exported document
pub const DEFAULT_OUTPUT_FILE: &str = "highlighted_document.pdf";

/// What gets highlighted and how pages are rasterized.
///
/// Fixed at configuration time and passed explicitly to the matcher and the
/// annotation overlay. The default reproduces the stock keyword list and
/// rectangle set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// Uniform PDF-point to pixel scale used for every page render
    pub scale: f64,
    /// Case-sensitive keyword substrings
    pub keywords: Vec<String>,
    pub highlight_style: HighlightStyle,
    pub annotations: AnnotationConfig,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            scale: 3.0,
            keywords: ["回線", "とは", "役目", "梅雨", "梅"]
                .into_iter()
                .map(String::from)
                .collect(),
            highlight_style: HighlightStyle::default(),
            annotations: AnnotationConfig::default(),
        }
    }
}

fn check_opacity(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::InvalidConfig {
            reason: format!("{} must be within [0, 1], got {}", name, value),
        });
    }
    Ok(())
}

impl HighlightConfig {
    /// Parse a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject degenerate geometry and unusable styles before anything renders.
    pub fn validate(&self) -> Result<()> {
        validate_scale(self.scale)?;

        for (index, rect) in self.annotations.rectangles.iter().enumerate() {
            rect.validate().map_err(|e| match e {
                Error::GeometryConfig { reason } => Error::GeometryConfig {
                    reason: format!("rectangle #{}: {}", index + 1, reason),
                },
                other => other,
            })?;
        }

        let style = &self.annotations.style;
        if !style.stroke_width.is_finite() || style.stroke_width < 0.0 {
            return Err(Error::GeometryConfig {
                reason: format!("stroke width must be non-negative, got {}", style.stroke_width),
            });
        }
        let label = &self.annotations.label;
        if !label.font_size.is_finite() || label.font_size <= 0.0 {
            return Err(Error::GeometryConfig {
                reason: format!("label font size must be positive, got {}", label.font_size),
            });
        }

        check_opacity("highlight opacity", self.highlight_style.opacity)?;
        check_opacity("annotation fill opacity", style.fill_opacity)?;
        self.keyword_set()?;
        Ok(())
    }

    pub fn keyword_set(&self) -> Result<KeywordSet> {
        KeywordSet::new(self.keywords.iter().cloned())
    }
}

/// Security, resource and highlighting configuration for the server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directories PDF inputs and outputs must live in (empty: unrestricted)
    pub resource_dirs: Vec<String>,
    /// Maximum total bytes in cache (default: 512MB)
    pub cache_max_bytes: usize,
    /// Maximum number of cache entries (default: 100)
    pub cache_max_entries: usize,
    /// Maximum pixel area of one rendered page (default: 100_000_000)
    pub max_image_pixels: u64,
    /// File written by `download_highlighted_pdf` when no path is given
    pub output_file: String,
    pub highlight: HighlightConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource_dirs: Vec::new(),
            cache_max_bytes: 512 * 1024 * 1024, // 512MB
            cache_max_entries: 100,
            max_image_pixels: 100_000_000,
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            highlight: HighlightConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_image_pixels == 0 {
            return Err(Error::InvalidConfig {
                reason: "max_image_pixels must be positive".to_string(),
            });
        }
        self.highlight.validate()
    }
}
