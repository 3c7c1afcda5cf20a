//! PDFium-backed document source and assembler

use super::{check_page, ensure_pdf_header, DocumentAssembler, ImagePlacement, PdfDocumentSource};
use crate::error::{Error, Result};
use crate::geometry::{Orientation, PageSize, Viewport};
use crate::text::{PositionedTextItem, TextContentItem};
use image::{DynamicImage, RgbaImage};
use pdfium_render::prelude::*;

/// Bind to the PDFium library (creates a new instance each time - PDFium is not thread-safe)
pub fn create_pdfium() -> Result<Pdfium> {
    // Try to bind to a bundled library first, then the system one
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Map PDFium load errors to our error type
fn map_load_error(err: PdfiumError) -> Error {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            Error::PasswordRequired
        }
        _ => Error::InvalidPdf {
            reason: format!("{}", err),
        },
    }
}

fn to_points(value: f64) -> PdfPoints {
    PdfPoints::new(value as f32)
}

/// Loaded PDF document read through PDFium
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
    page_count: u32,
}

impl<'a> PdfiumDocument<'a> {
    /// Open a PDF from bytes
    pub fn load(pdfium: &'a Pdfium, data: &'a [u8], password: Option<&'a str>) -> Result<Self> {
        ensure_pdf_header(data)?;

        let document = pdfium
            .load_pdf_from_byte_slice(data, password)
            .map_err(map_load_error)?;
        let page_count = document.pages().len() as u32;

        Ok(Self {
            document,
            page_count,
        })
    }

    fn page(&self, page: u32) -> Result<PdfPage<'a>> {
        check_page(page, self.page_count)?;
        self.document
            .pages()
            .get((page - 1) as u16)
            .map_err(|e| Error::Pdfium {
                reason: format!("Failed to get page {}: {}", page, e),
            })
    }
}

impl PdfDocumentSource for PdfiumDocument<'_> {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn page_size(&self, page: u32) -> Result<PageSize> {
        let pdf_page = self.page(page)?;
        Ok(PageSize::new(
            pdf_page.width().value as f64,
            pdf_page.height().value as f64,
        ))
    }

    fn rasterize(&self, page: u32, viewport: &Viewport) -> Result<RgbaImage> {
        let pdf_page = self.page(page)?;

        let config = PdfRenderConfig::new()
            .scale_page_by_factor(viewport.scale() as f32)
            .render_form_data(true)
            .render_annotations(true);

        let bitmap = pdf_page
            .render_with_config(&config)
            .map_err(|e| Error::Render {
                page,
                reason: e.to_string(),
            })?;

        Ok(bitmap.as_image().to_rgba8())
    }

    fn text_content(&self, page: u32) -> Result<Vec<TextContentItem>> {
        let pdf_page = self.page(page)?;
        let text = pdf_page.text().map_err(|e| Error::TextExtraction {
            page,
            reason: e.to_string(),
        })?;

        // Segments are runs of text sharing one baseline and font; blank runs carry no
        // usable position and are reported as opaque items.
        let items = text
            .segments()
            .iter()
            .map(|segment| {
                let content = segment.text();
                if content.trim().is_empty() {
                    return TextContentItem::Marked;
                }
                let bounds = segment.bounds();
                TextContentItem::Text(PositionedTextItem::at(
                    content,
                    bounds.left().value as f64,
                    bounds.bottom().value as f64,
                    bounds.width().value as f64,
                    bounds.height().value as f64,
                ))
            })
            .collect();

        Ok(items)
    }
}

/// Output document assembled through PDFium
pub struct PdfiumAssembler<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumAssembler<'a> {
    /// Create a document whose first page has `first_page` size, normalized to `orientation`
    pub fn new(pdfium: &'a Pdfium, orientation: Orientation, first_page: PageSize) -> Result<Self> {
        let document = pdfium.create_new_pdf().map_err(|e| Error::ExportIo {
            reason: format!("Failed to create output document: {}", e),
        })?;
        let mut assembler = Self { document };
        assembler.add_page(orientation.apply(first_page))?;
        Ok(assembler)
    }
}

impl DocumentAssembler for PdfiumAssembler<'_> {
    fn add_page(&mut self, size: PageSize) -> Result<()> {
        self.document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::Custom(
                to_points(size.width),
                to_points(size.height),
            ))
            .map_err(|e| Error::ExportIo {
                reason: format!("Failed to add page: {}", e),
            })?;
        Ok(())
    }

    fn add_image(&mut self, image: &DynamicImage, placement: ImagePlacement) -> Result<()> {
        let pages = self.document.pages();
        let last = pages.len().checked_sub(1).ok_or_else(|| Error::ExportIo {
            reason: "Output document has no pages".to_string(),
        })?;
        let mut page = pages.get(last).map_err(|e| Error::ExportIo {
            reason: format!("Failed to get output page: {}", e),
        })?;

        // Placement is top-left based; PDF objects are positioned from the bottom-left
        let page_height = page.height().value as f64;
        let bottom = page_height - placement.y - placement.height;

        page.objects_mut()
            .create_image_object(
                to_points(placement.x),
                to_points(bottom),
                image,
                Some(to_points(placement.width)),
                Some(to_points(placement.height)),
            )
            .map_err(|e| Error::ExportIo {
                reason: format!("Failed to embed page image: {}", e),
            })?;
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        self.document.save_to_bytes().map_err(|e| Error::ExportIo {
            reason: format!("Failed to serialize output document: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_rejects_non_pdf_bytes() {
        let Ok(pdfium) = create_pdfium() else {
            return;
        };
        let result = PdfiumDocument::load(&pdfium, b"not a pdf", None);
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));
    }

    #[test]
    fn test_assembled_pdf_reloads_with_same_page_count() {
        // Skip when the PDFium shared library is not installed
        let Ok(pdfium) = create_pdfium() else {
            return;
        };

        let size = PageSize::new(200.0, 100.0);
        let mut assembler = PdfiumAssembler::new(&pdfium, size.orientation(), size).unwrap();
        let image = DynamicImage::ImageRgb8(image::RgbImage::new(20, 10));
        assembler
            .add_image(&image, ImagePlacement::full_page(size))
            .unwrap();
        assembler.add_page(size).unwrap();
        assembler
            .add_image(&image, ImagePlacement::full_page(size))
            .unwrap();
        let bytes = assembler.finish().unwrap();

        let document = PdfiumDocument::load(&pdfium, &bytes, None).unwrap();
        assert_eq!(document.page_count(), 2);
        let page_size = document.page_size(2).unwrap();
        assert!((page_size.width - 200.0).abs() < 0.5);
        assert!((page_size.height - 100.0).abs() < 0.5);
    }
}
