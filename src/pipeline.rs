//! Per-page render pipeline
//!
//! A [`RenderSession`] is bound to one loaded document and exclusively owns the
//! rendering surface and the highlight overlay. Each [`RenderSession::render_page`]
//! call walks the page through
//! `Rasterizing → ClearingOverlay → ExtractingText → Highlighting → Annotating → Composited`.
//! The document transcript is extracted during the first render and memoized for
//! the lifetime of the session.

use crate::annotation::StaticAnnotationOverlay;
use crate::config::HighlightConfig;
use crate::error::{Error, Result};
use crate::geometry::Viewport;
use crate::highlight::{match_keywords, HighlightRegion, HighlightStyle, KeywordSet, OverlayLayer};
use crate::pdf::{check_page, PdfDocumentSource};
use crate::raster::Surface;
use crate::text::{extract_transcript, page_text_items};
use image::RgbaImage;
use std::cell::OnceCell;

/// Where a page render currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Idle,
    Rasterizing,
    ClearingOverlay,
    ExtractingText,
    Highlighting,
    Annotating,
    Composited,
}

/// View of a fully composited page
#[derive(Debug, Clone, Copy)]
pub struct CompositedPage<'s> {
    pub page: u32,
    pub viewport: Viewport,
    pub surface: &'s Surface,
    pub highlights: &'s [HighlightRegion],
}

impl CompositedPage<'_> {
    /// Surface with the highlight overlay baked in
    pub fn flatten(&self) -> RgbaImage {
        self.surface.flattened(self.highlights)
    }
}

/// Render state for one loaded document
pub struct RenderSession<'d, D: PdfDocumentSource + ?Sized> {
    document: &'d D,
    scale: f64,
    keywords: KeywordSet,
    highlight_style: HighlightStyle,
    annotations: StaticAnnotationOverlay,
    max_image_pixels: Option<u64>,
    surface: Surface,
    overlay: OverlayLayer,
    transcript: OnceCell<String>,
    viewport: Option<Viewport>,
    current_page: Option<u32>,
    stage: RenderStage,
}

impl<'d, D: PdfDocumentSource + ?Sized> RenderSession<'d, D> {
    /// Validate `config` and open a session over `document`.
    pub fn new(document: &'d D, config: &HighlightConfig) -> Result<Self> {
        config.validate()?;
        let annotations = StaticAnnotationOverlay::new(config.annotations.clone());
        Self::with_annotations(document, config, annotations)
    }

    /// Open a session with a prepared annotation overlay.
    pub fn with_annotations(
        document: &'d D,
        config: &HighlightConfig,
        annotations: StaticAnnotationOverlay,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            document,
            scale: config.scale,
            keywords: config.keyword_set()?,
            highlight_style: config.highlight_style,
            annotations,
            max_image_pixels: None,
            surface: Surface::new(0, 0),
            overlay: OverlayLayer::new(),
            transcript: OnceCell::new(),
            viewport: None,
            current_page: None,
            stage: RenderStage::Idle,
        })
    }

    /// Refuse to rasterize pages whose viewport exceeds `max` pixels
    pub fn with_max_image_pixels(mut self, max: u64) -> Self {
        self.max_image_pixels = Some(max);
        self
    }

    pub fn document(&self) -> &'d D {
        self.document
    }

    pub fn stage(&self) -> RenderStage {
        self.stage
    }

    pub fn overlay(&self) -> &OverlayLayer {
        &self.overlay
    }

    /// The last successfully composited page, if the latest render completed
    pub fn composited(&self) -> Option<CompositedPage<'_>> {
        if self.stage != RenderStage::Composited {
            return None;
        }
        Some(CompositedPage {
            page: self.current_page?,
            viewport: self.viewport?,
            surface: &self.surface,
            highlights: self.overlay.regions(),
        })
    }

    /// Seed the memoized transcript, e.g. from a cache. Returns false when a
    /// transcript is already set; the first value always wins.
    pub fn seed_transcript(&mut self, transcript: String) -> bool {
        self.transcript.set(transcript).is_ok()
    }

    /// Document transcript, extracted on first use.
    pub fn transcript(&self) -> Result<&str> {
        if let Some(text) = self.transcript.get() {
            return Ok(text);
        }
        let text = extract_transcript(self.document)?;
        Ok(self.transcript.get_or_init(|| text))
    }

    fn enter(&mut self, page: u32, stage: RenderStage) {
        tracing::debug!(page, ?stage, "render stage");
        self.stage = stage;
    }

    /// Rasterize, highlight and annotate one page (1-indexed).
    ///
    /// Errors from the PDF engine propagate unchanged; after a failure the
    /// session exposes no composited page.
    pub fn render_page(&mut self, page: u32) -> Result<()> {
        self.current_page = None;
        self.viewport = None;

        self.enter(page, RenderStage::Rasterizing);
        check_page(page, self.document.page_count())?;
        let viewport = Viewport::new(self.document.page_size(page)?, self.scale)?;
        if let Some(max) = self.max_image_pixels {
            let (width, height) = viewport.pixel_size();
            let area = width as u64 * height as u64;
            if area > max {
                return Err(Error::ImageDimensionExceeded {
                    detail: format!(
                        "page {} renders to {}x{} = {} pixels, maximum is {}",
                        page, width, height, area, max
                    ),
                });
            }
        }
        let raster = self.document.rasterize(page, &viewport)?;
        self.surface.replace(raster);

        self.enter(page, RenderStage::ClearingOverlay);
        self.overlay.clear();

        self.enter(page, RenderStage::ExtractingText);
        self.transcript()?;

        self.enter(page, RenderStage::Highlighting);
        let items = page_text_items(self.document, page)?;
        let regions = match_keywords(&items, &viewport, &self.keywords, self.highlight_style);
        tracing::debug!(page, items = items.len(), highlights = regions.len(), "keywords matched");
        self.overlay.rebuild(regions);

        self.enter(page, RenderStage::Annotating);
        self.annotations.draw(&mut self.surface, &viewport);

        self.viewport = Some(viewport);
        self.current_page = Some(page);
        self.enter(page, RenderStage::Composited);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationConfig;
    use crate::geometry::PdfRect;
    use crate::pdf::memory::MemoryDocument;
    use pretty_assertions::assert_eq;

    fn config(rectangles: Vec<PdfRect>) -> HighlightConfig {
        HighlightConfig {
            annotations: AnnotationConfig {
                rectangles,
                ..AnnotationConfig::default()
            },
            ..HighlightConfig::default()
        }
    }

    fn session<'d>(doc: &'d MemoryDocument, config: &HighlightConfig) -> RenderSession<'d, MemoryDocument> {
        let annotations = StaticAnnotationOverlay::with_font(config.annotations.clone(), None);
        RenderSession::with_annotations(doc, config, annotations).unwrap()
    }

    fn two_pages() -> MemoryDocument {
        MemoryDocument::builder()
            .page(|p| p.text("回線とは", 68.9, 496.3).text("other", 10.0, 10.0))
            .page(|p| p.text("梅雨", 100.0, 300.0).text("梅", 200.0, 300.0))
            .build()
    }

    #[test]
    fn test_render_reaches_composited() {
        let doc = two_pages();
        let config = config(Vec::new());
        let mut session = session(&doc, &config);
        assert_eq!(session.stage(), RenderStage::Idle);
        assert!(session.composited().is_none());

        session.render_page(1).unwrap();
        assert_eq!(session.stage(), RenderStage::Composited);
        let page = session.composited().unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.highlights.len(), 1);
        assert_eq!(page.surface.width(), (595.0_f64 * 3.0).ceil() as u32);
    }

    #[test]
    fn test_rerender_does_not_accumulate_highlights() {
        let doc = two_pages();
        let config = config(Vec::new());
        let mut session = session(&doc, &config);

        session.render_page(2).unwrap();
        let first: Vec<HighlightRegion> = session.overlay().regions().to_vec();
        session.render_page(2).unwrap();
        assert_eq!(session.overlay().regions(), first.as_slice());
        assert_eq!(first.len(), 2);

        session.render_page(1).unwrap();
        assert_eq!(session.overlay().len(), 1);
    }

    #[test]
    fn test_transcript_extracted_once_per_session() {
        let doc = two_pages();
        let config = config(Vec::new());
        let mut session = session(&doc, &config);

        session.render_page(1).unwrap();
        session.render_page(2).unwrap();
        session.render_page(1).unwrap();
        // Two pages for the transcript, then one lookup per render
        assert_eq!(doc.text_calls(), 2 + 3);
        assert_eq!(session.transcript().unwrap(), "回線とは other\n梅雨 梅\n");
    }

    #[test]
    fn test_seeded_transcript_skips_extraction() {
        let doc = two_pages();
        let config = config(Vec::new());
        let mut session = session(&doc, &config);
        assert!(session.seed_transcript("cached\n".to_string()));
        assert!(!session.seed_transcript("other\n".to_string()));

        session.render_page(1).unwrap();
        assert_eq!(doc.text_calls(), 1);
        assert_eq!(session.transcript().unwrap(), "cached\n");
    }

    #[test]
    fn test_rasterize_failure_is_fatal() {
        let doc = MemoryDocument::builder()
            .page(|p| p.text("梅", 10.0, 10.0))
            .page(|p| p.fail_render())
            .build();
        let config = config(Vec::new());
        let mut session = session(&doc, &config);

        session.render_page(1).unwrap();
        let result = session.render_page(2);
        assert!(matches!(result, Err(Error::Render { page: 2, .. })));
        assert_eq!(session.stage(), RenderStage::Rasterizing);
        assert!(session.composited().is_none());
    }

    #[test]
    fn test_text_failure_propagates() {
        let doc = MemoryDocument::builder().page(|p| p.fail_text()).build();
        let config = config(Vec::new());
        let mut session = session(&doc, &config);
        let result = session.render_page(1);
        assert!(matches!(result, Err(Error::TextExtraction { page: 1, .. })));
        assert_eq!(session.stage(), RenderStage::ExtractingText);
        assert!(session.composited().is_none());
    }

    #[test]
    fn test_invalid_config_fails_before_rendering() {
        let doc = two_pages();
        let config = config(vec![PdfRect::new(10.0, 10.0, 5.0, 20.0)]);
        let annotations = StaticAnnotationOverlay::with_font(config.annotations.clone(), None);
        let result = RenderSession::with_annotations(&doc, &config, annotations);
        assert!(matches!(result, Err(Error::GeometryConfig { .. })));
        assert_eq!(doc.render_calls(), 0);
    }

    #[test]
    fn test_page_out_of_bounds() {
        let doc = two_pages();
        let config = config(Vec::new());
        let mut session = session(&doc, &config);
        assert!(matches!(
            session.render_page(3),
            Err(Error::PageOutOfBounds { page: 3, total: 2 })
        ));
    }

    #[test]
    fn test_pixel_limit_checked_before_rasterizing() {
        let doc = two_pages();
        let config = config(Vec::new());
        let mut session = session(&doc, &config).with_max_image_pixels(1000);
        assert!(matches!(
            session.render_page(1),
            Err(Error::ImageDimensionExceeded { .. })
        ));
        assert_eq!(doc.render_calls(), 0);
    }

    #[test]
    fn test_annotations_are_baked_into_surface() {
        let doc = MemoryDocument::builder().page(|p| p.size(100.0, 100.0)).build();
        let config = HighlightConfig {
            scale: 1.0,
            ..config(vec![PdfRect::new(10.0, 10.0, 50.0, 50.0)])
        };
        let mut session = session(&doc, &config);
        session.render_page(1).unwrap();
        let page = session.composited().unwrap();
        assert_eq!(page.surface.image().get_pixel(10, 70)[1], 0);
        assert!(page.highlights.is_empty());
    }
}
