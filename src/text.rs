//! Text content of pages and the document transcript

use crate::error::Result;
use crate::pdf::PdfDocumentSource;

/// One fragment of extracted text, positioned in PDF user space.
///
/// `transform` is the fragment's text matrix; its translation components
/// (`transform[4]`, `transform[5]`) are the baseline anchor of the fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedTextItem {
    pub text: String,
    pub transform: [f64; 6],
    pub width: f64,
    pub height: f64,
}

impl PositionedTextItem {
    /// Item with an identity text matrix translated to `(x, y)`
    pub fn at(text: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            text: text.into(),
            transform: [1.0, 0.0, 0.0, 1.0, x, y],
            width,
            height,
        }
    }

    /// Baseline anchor in PDF user space
    pub fn anchor(&self) -> (f64, f64) {
        (self.transform[4], self.transform[5])
    }
}

/// Item as reported by the text-extraction collaborator.
///
/// Pages can carry entries without text or position (marked-content
/// boundaries, empty runs); those are kept opaque and skipped by consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum TextContentItem {
    Text(PositionedTextItem),
    Marked,
}

impl TextContentItem {
    pub fn as_text(&self) -> Option<&PositionedTextItem> {
        match self {
            TextContentItem::Text(item) => Some(item),
            TextContentItem::Marked => None,
        }
    }
}

/// Positioned text items of one page, opaque entries dropped.
pub fn page_text_items<D>(document: &D, page: u32) -> Result<Vec<PositionedTextItem>>
where
    D: PdfDocumentSource + ?Sized,
{
    Ok(document
        .text_content(page)?
        .into_iter()
        .filter_map(|item| match item {
            TextContentItem::Text(text) => Some(text),
            TextContentItem::Marked => None,
        })
        .collect())
}

/// Space-joined text of one page's items.
pub fn join_page_text(items: &[TextContentItem]) -> String {
    items
        .iter()
        .filter_map(TextContentItem::as_text)
        .map(|item| item.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the document transcript: pages `1..=N` in order, items space-joined
/// within a page and every page terminated by a newline.
///
/// Each page is visited exactly once. Collaborator errors propagate.
pub fn extract_transcript<D>(document: &D) -> Result<String>
where
    D: PdfDocumentSource + ?Sized,
{
    let mut transcript = String::new();
    for page in 1..=document.page_count() {
        let items = document.text_content(page)?;
        transcript.push_str(&join_page_text(&items));
        transcript.push('\n');
    }
    tracing::debug!(
        pages = document.page_count(),
        chars = transcript.chars().count(),
        "transcript extracted"
    );
    Ok(transcript)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::memory::MemoryDocument;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_join_skips_marked_items() {
        let items = vec![
            TextContentItem::Text(PositionedTextItem::at("回線", 0.0, 0.0, 10.0, 10.0)),
            TextContentItem::Marked,
            TextContentItem::Text(PositionedTextItem::at("とは", 12.0, 0.0, 10.0, 10.0)),
        ];
        assert_eq!(join_page_text(&items), "回線 とは");
    }

    #[test]
    fn test_transcript_orders_pages_with_trailing_newlines() {
        let doc = MemoryDocument::builder()
            .page(|p| p.text("first", 10.0, 700.0).marked().text("line", 50.0, 700.0))
            .page(|p| p)
            .page(|p| p.text("third", 10.0, 100.0))
            .build();

        let transcript = extract_transcript(&doc).unwrap();
        assert_eq!(transcript, "first line\n\nthird\n");
        assert_eq!(doc.text_calls(), 3);
    }

    #[test]
    fn test_transcript_propagates_extraction_errors() {
        let doc = MemoryDocument::builder()
            .page(|p| p.text("ok", 0.0, 0.0))
            .page(|p| p.fail_text())
            .build();

        let result = extract_transcript(&doc);
        assert!(matches!(
            result,
            Err(crate::error::Error::TextExtraction { page: 2, .. })
        ));
    }

    #[test]
    fn test_page_text_items_drop_opaque_entries() {
        let doc = MemoryDocument::builder()
            .page(|p| p.marked().text("a", 1.0, 2.0).marked())
            .build();
        let items = page_text_items(&doc, 1).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].anchor(), (1.0, 2.0));
    }
}
