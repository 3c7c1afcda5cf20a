//! In-memory PDF collaborators
//!
//! [`MemoryDocument`] serves pages described up front (size, fill color, text
//! items, injected failures) and [`MemoryAssembler`] records what the export
//! pipeline writes. Used by tests and benchmarks to drive the pipelines without
//! a PDF engine.

use super::{check_page, DocumentAssembler, ImagePlacement, PdfDocumentSource};
use crate::error::{Error, Result};
use crate::geometry::{Orientation, PageSize, Viewport};
use crate::text::{PositionedTextItem, TextContentItem};
use image::{DynamicImage, Rgba, RgbaImage};
use std::cell::Cell;

const DEFAULT_PAGE: PageSize = PageSize {
    width: 595.0,
    height: 842.0,
};

/// Description of one page of a [`MemoryDocument`]
#[derive(Debug, Clone)]
pub struct MemoryPage {
    size: PageSize,
    fill: Rgba<u8>,
    items: Vec<TextContentItem>,
    fail_render: bool,
    fail_text: bool,
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self {
            size: DEFAULT_PAGE,
            fill: Rgba([255, 255, 255, 255]),
            items: Vec::new(),
            fail_render: false,
            fail_text: false,
        }
    }
}

impl MemoryPage {
    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.size = PageSize::new(width, height);
        self
    }

    /// Background color the page rasterizes to
    pub fn fill(mut self, color: Rgba<u8>) -> Self {
        self.fill = color;
        self
    }

    /// Text fragment at `(x, y)`, 10 points tall, 5 points per character wide
    pub fn text(self, text: &str, x: f64, y: f64) -> Self {
        let width = 5.0 * text.chars().count() as f64;
        self.item(PositionedTextItem::at(text, x, y, width, 10.0))
    }

    pub fn item(mut self, item: PositionedTextItem) -> Self {
        self.items.push(TextContentItem::Text(item));
        self
    }

    /// Opaque content item without text
    pub fn marked(mut self) -> Self {
        self.items.push(TextContentItem::Marked);
        self
    }

    pub fn fail_render(mut self) -> Self {
        self.fail_render = true;
        self
    }

    pub fn fail_text(mut self) -> Self {
        self.fail_text = true;
        self
    }
}

/// Builder for [`MemoryDocument`]
#[derive(Debug, Default)]
pub struct MemoryDocumentBuilder {
    pages: Vec<MemoryPage>,
}

impl MemoryDocumentBuilder {
    pub fn page(mut self, describe: impl FnOnce(MemoryPage) -> MemoryPage) -> Self {
        self.pages.push(describe(MemoryPage::default()));
        self
    }

    pub fn build(self) -> MemoryDocument {
        MemoryDocument {
            pages: self.pages,
            render_calls: Cell::new(0),
            text_calls: Cell::new(0),
        }
    }
}

/// Document whose pages live in memory
#[derive(Debug)]
pub struct MemoryDocument {
    pages: Vec<MemoryPage>,
    render_calls: Cell<usize>,
    text_calls: Cell<usize>,
}

impl MemoryDocument {
    pub fn builder() -> MemoryDocumentBuilder {
        MemoryDocumentBuilder::default()
    }

    /// Number of `rasterize` calls served so far
    pub fn render_calls(&self) -> usize {
        self.render_calls.get()
    }

    /// Number of `text_content` calls served so far
    pub fn text_calls(&self) -> usize {
        self.text_calls.get()
    }

    fn page(&self, page: u32) -> Result<&MemoryPage> {
        check_page(page, self.page_count())?;
        Ok(&self.pages[(page - 1) as usize])
    }
}

impl PdfDocumentSource for MemoryDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page: u32) -> Result<PageSize> {
        Ok(self.page(page)?.size)
    }

    fn rasterize(&self, page: u32, viewport: &Viewport) -> Result<RgbaImage> {
        let described = self.page(page)?;
        self.render_calls.set(self.render_calls.get() + 1);
        if described.fail_render {
            return Err(Error::Render {
                page,
                reason: "injected rasterization failure".to_string(),
            });
        }
        let (width, height) = viewport.pixel_size();
        Ok(RgbaImage::from_pixel(width, height, described.fill))
    }

    fn text_content(&self, page: u32) -> Result<Vec<TextContentItem>> {
        let described = self.page(page)?;
        self.text_calls.set(self.text_calls.get() + 1);
        if described.fail_text {
            return Err(Error::TextExtraction {
                page,
                reason: "injected text extraction failure".to_string(),
            });
        }
        Ok(described.items.clone())
    }
}

/// One page written to a [`MemoryAssembler`]
#[derive(Debug, Clone)]
pub struct AssembledPage {
    pub size: PageSize,
    pub images: Vec<(RgbaImage, ImagePlacement)>,
}

/// Assembler that keeps pages in memory
#[derive(Debug)]
pub struct MemoryAssembler {
    orientation: Orientation,
    pages: Vec<AssembledPage>,
    fail_finish: bool,
}

impl MemoryAssembler {
    pub fn new(orientation: Orientation, first_page: PageSize) -> Self {
        Self {
            orientation,
            pages: vec![AssembledPage {
                size: first_page,
                images: Vec::new(),
            }],
            fail_finish: false,
        }
    }

    /// Make `finish` fail, as a full disk would
    pub fn failing_on_finish(mut self) -> Self {
        self.fail_finish = true;
        self
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn pages(&self) -> &[AssembledPage] {
        &self.pages
    }
}

impl DocumentAssembler for MemoryAssembler {
    fn add_page(&mut self, size: PageSize) -> Result<()> {
        self.pages.push(AssembledPage {
            size,
            images: Vec::new(),
        });
        Ok(())
    }

    fn add_image(&mut self, image: &DynamicImage, placement: ImagePlacement) -> Result<()> {
        let page = self.pages.last_mut().ok_or_else(|| Error::ExportIo {
            reason: "no page to draw on".to_string(),
        })?;
        page.images.push((image.to_rgba8(), placement));
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        if self.fail_finish {
            return Err(Error::ExportIo {
                reason: "injected write failure".to_string(),
            });
        }
        let summary: Vec<[f64; 2]> = self
            .pages
            .iter()
            .map(|p| [p.size.width, p.size.height])
            .collect();
        Ok(serde_json::to_vec(&summary)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_document_rasterizes_at_viewport_size() {
        let doc = MemoryDocument::builder()
            .page(|p| p.size(100.0, 50.0).fill(Rgba([1, 2, 3, 255])))
            .build();
        let vp = Viewport::new(doc.page_size(1).unwrap(), 2.0).unwrap();
        let raster = doc.rasterize(1, &vp).unwrap();
        assert_eq!(raster.dimensions(), (200, 100));
        assert_eq!(raster.get_pixel(5, 5), &Rgba([1, 2, 3, 255]));
        assert_eq!(doc.render_calls(), 1);
    }

    #[test]
    fn test_memory_document_out_of_bounds() {
        let doc = MemoryDocument::builder().page(|p| p).build();
        assert!(matches!(
            doc.page_size(2),
            Err(Error::PageOutOfBounds { page: 2, total: 1 })
        ));
    }

    #[test]
    fn test_memory_assembler_records_pages() {
        let mut asm = MemoryAssembler::new(Orientation::Portrait, DEFAULT_PAGE);
        let image = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
        asm.add_image(&image, ImagePlacement::full_page(DEFAULT_PAGE))
            .unwrap();
        asm.add_page(DEFAULT_PAGE).unwrap();
        assert_eq!(asm.pages().len(), 2);
        assert_eq!(asm.pages()[0].images.len(), 1);
        assert!(asm.pages()[1].images.is_empty());
        assert!(!asm.finish().unwrap().is_empty());
    }
}
