use lopdf::Document;
use tracing::{info, warn};

use crate::error::{AnalysisError, Result};

/// Text of a single page, or the reason it could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageText {
    Text(String),
    Unreadable(String),
}

/// Source of per-page text for an uploaded PDF.
///
/// Fails only when the document as a whole cannot be opened; individual bad
/// pages are reported as [`PageText::Unreadable`].
pub trait PageTextSource: Send + Sync {
    fn pages(&self, pdf: &[u8]) -> Result<Vec<PageText>>;
}

/// [`PageTextSource`] backed by `lopdf`.
pub struct LopdfPageText;

impl PageTextSource for LopdfPageText {
    fn pages(&self, pdf: &[u8]) -> Result<Vec<PageText>> {
        let document =
            Document::load_mem(pdf).map_err(|e| AnalysisError::Extraction(e.to_string()))?;

        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        info!("Extracting text from {} pages", page_numbers.len());

        Ok(page_numbers
            .into_iter()
            .map(|number| match document.extract_text(&[number]) {
                Ok(text) => PageText::Text(text),
                Err(e) => PageText::Unreadable(format!("page {}: {}", number, e)),
            })
            .collect())
    }
}

/// Concatenated text of the readable pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedText {
    pub text: String,
    pub total_pages: usize,
    pub skipped_pages: usize,
}

pub fn join_pages(pages: Vec<PageText>) -> JoinedText {
    let total_pages = pages.len();
    let mut skipped_pages = 0;
    let mut text = String::new();

    for page in pages {
        match page {
            PageText::Text(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            PageText::Unreadable(reason) => {
                warn!("Skipping unreadable page: {}", reason);
                skipped_pages += 1;
            }
        }
    }

    JoinedText {
        text,
        total_pages,
        skipped_pages,
    }
}

/// Cheap content sniff: real PDFs carry a `%PDF-` marker near the start.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(5).any(|window| window == b"%PDF-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    fn single_page_pdf(text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_lopdf_extracts_page_text() {
        let pdf = single_page_pdf("Abstract");
        assert!(looks_like_pdf(&pdf));

        let pages = LopdfPageText.pages(&pdf).unwrap();
        assert_eq!(pages.len(), 1);
        match &pages[0] {
            PageText::Text(text) => assert!(text.contains("Abstract")),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_bytes_fail_to_open() {
        let err = LopdfPageText.pages(b"%PDF-1.4 truncated").unwrap_err();
        assert!(matches!(err, AnalysisError::Extraction(_)));
    }

    #[test]
    fn test_join_skips_unreadable_pages() {
        let joined = join_pages(vec![
            PageText::Text("first".to_string()),
            PageText::Unreadable("page 2: bad stream".to_string()),
            PageText::Text("third".to_string()),
        ]);

        assert_eq!(joined.text, "first\nthird\n");
        assert_eq!(joined.total_pages, 3);
        assert_eq!(joined.skipped_pages, 1);
    }

    #[test]
    fn test_looks_like_pdf() {
        assert!(looks_like_pdf(b"%PDF-1.7\n..."));
        assert!(looks_like_pdf(b"\x00\x01junk%PDF-1.4"));
        assert!(!looks_like_pdf(b"PK\x03\x04 zip file"));
        assert!(!looks_like_pdf(b""));
    }
}
