use crate::error::IngestError;
use crate::models::Document;
use lopdf::Document as PdfDocument;
use regex::Regex;
use tracing::{debug, warn};

pub trait TextExtractor: Send + Sync {
    /// Returns the document's text; image-only pages contribute nothing.
    fn extract_text(&self, document: &Document) -> Result<String, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl TextExtractor for LopdfExtractor {
    fn extract_text(&self, document: &Document) -> Result<String, IngestError> {
        let pdf = PdfDocument::load_mem(&document.bytes).map_err(|error| {
            IngestError::PdfParse(format!("{}: {error}", document.file_name))
        })?;

        let mut text = String::new();
        for (page_no, _page_id) in pdf.get_pages() {
            match pdf.extract_text(&[page_no]) {
                Ok(page_text) => text.push_str(&page_text),
                Err(error) => warn!(
                    file = %document.file_name,
                    page = page_no,
                    %error,
                    "page has no extractable text"
                ),
            }
        }

        debug!(file = %document.file_name, chars = text.len(), "extracted pdf text");
        Ok(text)
    }
}

/// Normalizes line endings and blank-line runs so paragraph boundaries survive chunking.
pub fn clean_extracted_text(text: &str) -> Result<String, IngestError> {
    let trailing_space = Regex::new(r"[ \t]+\n")?;
    let blank_runs = Regex::new(r"\n{3,}")?;

    let unified = text.replace("\r\n", "\n").replace('\r', "\n").replace('\u{a0}', " ");
    let trimmed = trailing_space.replace_all(&unified, "\n");
    Ok(blank_runs.replace_all(&trimmed, "\n\n").into_owned())
}

/// Concatenates the text of every document in upload order.
pub fn extract_raw_text(
    extractor: &dyn TextExtractor,
    documents: &[Document],
) -> Result<String, IngestError> {
    let mut raw_text = String::new();
    for document in documents {
        raw_text.push_str(&extractor.extract_text(document)?);
    }
    clean_extracted_text(&raw_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Utf8Extractor;

    impl TextExtractor for Utf8Extractor {
        fn extract_text(&self, document: &Document) -> Result<String, IngestError> {
            Ok(String::from_utf8_lossy(&document.bytes).into_owned())
        }
    }

    #[test]
    fn cleaning_collapses_blank_runs_and_trailing_space() {
        let cleaned = clean_extracted_text("Intro  \r\n\r\n\r\n\r\nBody\u{a0}text\t\nEnd").unwrap();
        assert_eq!(cleaned, "Intro\n\nBody text\nEnd");
    }

    #[test]
    fn raw_text_keeps_upload_order() {
        let documents = vec![
            Document::new("b.pdf", b"second ".to_vec()),
            Document::new("a.pdf", b"first".to_vec()),
        ];
        let raw = extract_raw_text(&Utf8Extractor, &documents).unwrap();
        assert_eq!(raw, "second first");
    }

    fn single_page_pdf(text: &str) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Object, Stream};

        let mut doc = PdfDocument::with_version("1.5");
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
                Operation::new("Td", vec![72.into(), 720.into()]),
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
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn lopdf_extracts_page_text_from_memory() {
        let document = Document::new("hello.pdf", single_page_pdf("Hello Rustaceans"));
        let text = LopdfExtractor.extract_text(&document).unwrap();
        assert!(text.contains("Hello Rustaceans"));
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let document = Document::new("broken.pdf", b"%PDF-1.4\n%broken".to_vec());
        let result = LopdfExtractor.extract_text(&document);
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
    }
}
