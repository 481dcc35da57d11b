use lopdf::Document as PdfDocument;

use crate::error::DocQaError;

use super::chunking::FORM_FEED;
use super::extract::{normalize_text, validate_filename, TextExtractor, PDF_MAGIC};

/// Extracts the text layer of a PDF, one page at a time.
///
/// Every page is terminated by a form feed, so chunks carry the page they start on. Pages whose
/// text cannot be decoded are kept as empty pages; a document with no text at all then fails
/// ingestion as empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, DocQaError> {
        validate_filename(filename)?;
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(DocQaError::upload(format!("{filename} is not a PDF")));
        }

        let pdf = PdfDocument::load_mem(bytes).map_err(|e| {
            DocQaError::upload(format!("{filename} could not be parsed as a PDF: {e}"))
        })?;
        let pages = pdf.get_pages();
        if pages.is_empty() {
            return Err(DocQaError::upload(format!("{filename} has no pages")));
        }

        let mut text = String::new();
        for &number in pages.keys() {
            match pdf.extract_text(&[number]) {
                Ok(page) => text.push_str(normalize_text(&page).trim_end()),
                Err(e) => {
                    tracing::warn!(filename, page = number, error = %e, "page text not extracted")
                }
            }
            text.push(FORM_FEED);
        }

        tracing::debug!(
            filename,
            pages = pages.len(),
            chars = text.chars().count(),
            "extracted PDF text"
        );
        Ok(text)
    }
}
