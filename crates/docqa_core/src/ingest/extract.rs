use std::fs;
use std::path::Path;

use crate::error::DocQaError;

use super::pdf::PdfExtractor;

pub(crate) const PDF_MAGIC: &[u8] = b"%PDF-";
const UTF8_BOM: char = '\u{feff}';

/// Turns uploaded bytes into plain text. Implementations are external collaborators: the core
/// only relies on this boundary and maps every failure to [`DocQaError::Upload`].
pub trait TextExtractor: Send + Sync {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, DocQaError>;
}

/// Accepts UTF-8 text documents (`.txt`, `.md`, logs, exported transcripts, ...).
///
/// Binary payloads are rejected instead of being decoded lossily; PDFs go through
/// [`PdfExtractor`](super::pdf::PdfExtractor).
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, DocQaError> {
        validate_filename(filename)?;

        if bytes.starts_with(PDF_MAGIC) {
            return Err(DocQaError::upload(format!(
                "{filename} is a PDF; plain-text extraction cannot read it"
            )));
        }
        if bytes.contains(&0) {
            return Err(DocQaError::upload(format!(
                "{filename} looks like a binary file (NUL bytes found)"
            )));
        }
        let text = std::str::from_utf8(bytes).map_err(|e| {
            DocQaError::upload(format!(
                "{filename} is not valid UTF-8 text (invalid byte at offset {})",
                e.valid_up_to()
            ))
        })?;

        Ok(normalize_text(text))
    }
}

/// Picks the extractor from the payload: PDFs (by magic bytes or a `.pdf` name) are read page by
/// page, everything else as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentExtractor;

impl TextExtractor for DocumentExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, DocQaError> {
        if bytes.starts_with(PDF_MAGIC) || has_pdf_extension(filename) {
            PdfExtractor.extract(filename, bytes)
        } else {
            PlainTextExtractor.extract(filename, bytes)
        }
    }
}

fn has_pdf_extension(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Filenames identify documents; they must be a bare, non-empty name.
pub fn validate_filename(filename: &str) -> Result<(), DocQaError> {
    if filename.trim().is_empty() {
        return Err(DocQaError::upload("filename is required"));
    }
    if filename.contains('/') || filename.contains('\\') {
        return Err(DocQaError::upload(format!(
            "filename must not contain path separators: {filename}"
        )));
    }
    if filename.chars().any(char::is_control) {
        return Err(DocQaError::upload("filename must not contain control characters"));
    }
    Ok(())
}

/// Line endings to `\n`, leading byte-order mark removed.
pub fn normalize_text(s: &str) -> String {
    let s = s.strip_prefix(UTF8_BOM).unwrap_or(s);
    s.replace("\r\n", "\n").replace('\r', "\n")
}

/// Read a document from disk as `(filename, bytes)` ready for upload.
pub fn load_document_file(path: &Path) -> Result<(String, Vec<u8>), DocQaError> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            DocQaError::upload(format!("path has no usable filename: {}", path.display()))
        })?
        .to_string();
    if path.is_dir() {
        return Err(DocQaError::upload(format!(
            "expected a file, got a directory: {}",
            path.display()
        )));
    }
    let bytes = fs::read(path).map_err(|e| {
        DocQaError::upload(format!("failed to read {}: {e}", path.display()))
    })?;
    Ok((filename, bytes))
}
