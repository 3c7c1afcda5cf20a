//! PDF collaborators
//!
//! The render and export pipelines talk to the PDF engine through two traits:
//! [`PdfDocumentSource`] for reading (page sizes, rasterization, text content)
//! and [`DocumentAssembler`] for writing the rasterized output. PDFium backs
//! both in production; [`memory`] provides in-memory implementations.

pub mod memory;
mod pdfium;

pub use pdfium::{create_pdfium, PdfiumAssembler, PdfiumDocument};

use crate::error::{Error, Result};
use crate::geometry::{PageSize, Viewport};
use crate::text::TextContentItem;
use image::{DynamicImage, RgbaImage};

/// Read access to a loaded PDF document. Pages are 1-indexed.
pub trait PdfDocumentSource {
    /// Number of pages in the document
    fn page_count(&self) -> u32;

    /// Intrinsic page size in PDF points
    fn page_size(&self, page: u32) -> Result<PageSize>;

    /// Rasterize a page at the viewport's scale
    fn rasterize(&self, page: u32, viewport: &Viewport) -> Result<RgbaImage>;

    /// Text content items of a page, in content-stream order
    fn text_content(&self, page: u32) -> Result<Vec<TextContentItem>>;
}

/// Where an image lands on an output page: points, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ImagePlacement {
    /// Placement covering an entire page
    pub fn full_page(size: PageSize) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: size.width,
            height: size.height,
        }
    }
}

/// Builds an output PDF out of raster images.
///
/// An assembler is created with the document orientation and the size of its
/// first page, which already exists when construction returns.
pub trait DocumentAssembler {
    /// Append a new, empty page
    fn add_page(&mut self, size: PageSize) -> Result<()>;

    /// Draw an image onto the last page
    fn add_image(&mut self, image: &DynamicImage, placement: ImagePlacement) -> Result<()>;

    /// Serialize the assembled document
    fn finish(&mut self) -> Result<Vec<u8>>;
}

/// Check the `%PDF` magic before handing bytes to the engine
pub fn ensure_pdf_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

/// Check that a 1-indexed page number exists in a document of `total` pages.
pub fn check_page(page: u32, total: u32) -> Result<()> {
    if page < 1 || page > total {
        return Err(Error::PageOutOfBounds { page, total });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_page_bounds() {
        assert!(check_page(1, 2).is_ok());
        assert!(check_page(2, 2).is_ok());
        assert!(matches!(
            check_page(0, 2),
            Err(Error::PageOutOfBounds { page: 0, total: 2 })
        ));
        assert!(matches!(
            check_page(3, 2),
            Err(Error::PageOutOfBounds { page: 3, total: 2 })
        ));
    }

    #[test]
    fn test_pdf_header_detection() {
        assert!(matches!(
            ensure_pdf_header(b"not a pdf"),
            Err(Error::InvalidPdf { .. })
        ));
        assert!(matches!(
            ensure_pdf_header(b"%P"),
            Err(Error::InvalidPdf { .. })
        ));
        assert!(ensure_pdf_header(b"%PDF-1.7\n").is_ok());
    }

    #[test]
    fn test_full_page_placement() {
        let placement = ImagePlacement::full_page(PageSize::new(595.0, 842.0));
        assert_eq!(placement.x, 0.0);
        assert_eq!(placement.y, 0.0);
        assert_eq!(placement.width, 595.0);
        assert_eq!(placement.height, 842.0);
    }
}
