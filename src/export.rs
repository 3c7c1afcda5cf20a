//! Export of the highlighted document
//!
//! Every page goes through the same render pipeline as interactive viewing,
//! gets its overlay flattened, and is embedded as one full-page image. Text in
//! the output is not selectable.

use crate::error::{Error, Result};
use crate::geometry::{Orientation, PageSize};
use crate::pdf::{DocumentAssembler, ImagePlacement, PdfDocumentSource};
use crate::pipeline::RenderSession;
use crate::raster::to_opaque_rgb;
use image::DynamicImage;

/// Serialized output document
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub bytes: Vec<u8>,
    pub page_count: u32,
    pub orientation: Orientation,
}

/// Orientation and first page size of the output document, both taken from
/// page 1.
pub fn export_layout<D: PdfDocumentSource + ?Sized>(document: &D) -> Result<(Orientation, PageSize)> {
    if document.page_count() == 0 {
        return Err(Error::ExportIo {
            reason: "document has no pages".to_string(),
        });
    }
    let first = document.page_size(1)?;
    Ok((first.orientation(), first))
}

/// Render every page in order and write it into `assembler`, which must
/// already hold an empty first page.
pub fn export_into<D, A>(
    session: &mut RenderSession<'_, D>,
    assembler: &mut A,
    orientation: Orientation,
) -> Result<ExportedDocument>
where
    D: PdfDocumentSource + ?Sized,
    A: DocumentAssembler + ?Sized,
{
    let page_count = session.document().page_count();

    for page in 1..=page_count {
        session.render_page(page)?;
        let composited = session.composited().ok_or_else(|| Error::Render {
            page,
            reason: "page did not reach the composited stage".to_string(),
        })?;
        let size = orientation.apply(composited.viewport.page_size());
        let flat = DynamicImage::ImageRgb8(to_opaque_rgb(&composited.flatten()));

        if page > 1 {
            assembler.add_page(size)?;
        }
        assembler.add_image(&flat, ImagePlacement::full_page(size))?;
        tracing::debug!(page, width = flat.width(), height = flat.height(), "page exported");
    }

    let bytes = assembler.finish()?;
    tracing::info!(
        pages = page_count,
        bytes = bytes.len(),
        orientation = orientation.as_str(),
        "highlighted document assembled"
    );
    Ok(ExportedDocument {
        bytes,
        page_count,
        orientation,
    })
}

/// Export with an assembler built from the document's layout.
pub fn export_document<D, A, F>(session: &mut RenderSession<'_, D>, create: F) -> Result<ExportedDocument>
where
    D: PdfDocumentSource + ?Sized,
    A: DocumentAssembler,
    F: FnOnce(Orientation, PageSize) -> Result<A>,
{
    let (orientation, first) = export_layout(session.document())?;
    let mut assembler = create(orientation, first)?;
    export_into(session, &mut assembler, orientation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationConfig, StaticAnnotationOverlay};
    use crate::config::HighlightConfig;
    use crate::pdf::memory::{MemoryAssembler, MemoryDocument};
    use image::Rgb;
    use pretty_assertions::assert_eq;

    fn config() -> HighlightConfig {
        HighlightConfig {
            scale: 1.0,
            annotations: AnnotationConfig {
                rectangles: Vec::new(),
                ..AnnotationConfig::default()
            },
            ..HighlightConfig::default()
        }
    }

    fn session<'d>(doc: &'d MemoryDocument, config: &HighlightConfig) -> RenderSession<'d, MemoryDocument> {
        let annotations = StaticAnnotationOverlay::with_font(config.annotations.clone(), None);
        RenderSession::with_annotations(doc, config, annotations).unwrap()
    }

    #[test]
    fn test_pages_exported_in_order_with_highlights_baked_in() {
        let doc = MemoryDocument::builder()
            .page(|p| p.size(100.0, 200.0).text("梅", 10.0, 150.0))
            .page(|p| p.size(100.0, 200.0).text("plain", 10.0, 150.0))
            .build();
        let config = config();
        let mut session = session(&doc, &config);
        let (orientation, first) = export_layout(&doc).unwrap();
        let mut assembler = MemoryAssembler::new(orientation, first);

        let exported = export_into(&mut session, &mut assembler, orientation).unwrap();
        assert_eq!(exported.page_count, 2);
        assert_eq!(exported.orientation, Orientation::Portrait);

        let pages = assembler.pages();
        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|p| p.images.len() == 1));

        let (first_image, placement) = &pages[0].images[0];
        assert_eq!(*placement, ImagePlacement::full_page(PageSize::new(100.0, 200.0)));
        // "梅" occupies x 10..15, pixel rows 40..50 at scale 1
        let highlighted = first_image.get_pixel(12, 45);
        assert_eq!(highlighted[0], 255);
        assert!(highlighted[2] < 255);
        assert_eq!(first_image.get_pixel(50, 100)[2], 255);

        let (second_image, _) = &pages[1].images[0];
        assert!(second_image.pixels().all(|p| p[2] == 255));
    }

    #[test]
    fn test_orientation_follows_first_page() {
        let doc = MemoryDocument::builder()
            .page(|p| p.size(300.0, 200.0))
            .page(|p| p.size(200.0, 300.0))
            .build();
        let config = config();
        let mut session = session(&doc, &config);
        let mut created = None;
        let exported = export_document(&mut session, |orientation, first| {
            created = Some((orientation, first));
            Ok(MemoryAssembler::new(orientation, first))
        })
        .unwrap();

        assert_eq!(exported.orientation, Orientation::Landscape);
        assert_eq!(created, Some((Orientation::Landscape, PageSize::new(300.0, 200.0))));
        let sizes: Vec<[f64; 2]> = serde_json::from_slice(&exported.bytes).unwrap();
        assert_eq!(sizes, vec![[300.0, 200.0], [300.0, 200.0]]);
    }

    #[test]
    fn test_write_failure_surfaces_as_export_error() {
        let doc = MemoryDocument::builder().page(|p| p).build();
        let config = config();
        let mut session = session(&doc, &config);
        let result = export_document(&mut session, |orientation, first| {
            Ok(MemoryAssembler::new(orientation, first).failing_on_finish())
        });
        assert!(matches!(result, Err(Error::ExportIo { .. })));
    }

    #[test]
    fn test_render_failure_aborts_export() {
        let doc = MemoryDocument::builder()
            .page(|p| p)
            .page(|p| p.fail_render())
            .build();
        let config = config();
        let mut session = session(&doc, &config);
        let (orientation, first) = export_layout(&doc).unwrap();
        let mut assembler = MemoryAssembler::new(orientation, first);
        let result = export_into(&mut session, &mut assembler, orientation);
        assert!(matches!(result, Err(Error::Render { page: 2, .. })));
        assert_eq!(assembler.pages().len(), 1);
    }

    #[test]
    fn test_opaque_output() {
        let doc = MemoryDocument::builder().page(|p| p.size(10.0, 10.0)).build();
        let config = config();
        let mut session = session(&doc, &config);
        let (orientation, first) = export_layout(&doc).unwrap();
        let mut assembler = MemoryAssembler::new(orientation, first);
        export_into(&mut session, &mut assembler, orientation).unwrap();
        let (image, _) = &assembler.pages()[0].images[0];
        let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert!(image.pixels().all(|p| p[3] == 255));
    }
}
