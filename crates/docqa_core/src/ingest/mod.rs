pub mod chunking;
pub mod extract;
pub mod pdf;

use std::sync::Arc;

use crate::domain::{ChunkingParams, Document};
use crate::error::DocQaError;

pub use chunking::{ingest, reassemble};
pub use extract::{
    load_document_file, normalize_text, DocumentExtractor, PlainTextExtractor, TextExtractor,
};
pub use pdf::PdfExtractor;

/// Chunk already-extracted text into a [`Document`] named `filename`.
pub fn build_document(
    filename: &str,
    text: &str,
    params: &ChunkingParams,
    created_at: String,
) -> Result<Document, DocQaError> {
    extract::validate_filename(filename)?;
    let chunks = ingest(text, params)?;
    tracing::info!(filename, chunks = chunks.len(), "document ingested");
    Ok(Document {
        filename: filename.to_string(),
        text_len: text.chars().count(),
        text_sha256: chunking::sha256_hex(text.as_bytes()),
        chunks: chunks.into_iter().map(Arc::new).collect(),
        chunking: *params,
        created_at,
    })
}
