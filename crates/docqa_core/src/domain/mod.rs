use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One slice of a document's text: the unit of embedding, retrieval and citation.
///
/// Notes:
/// - Offsets count Unicode scalar values, not bytes: `[char_start, char_end)`.
/// - Consecutive chunks of one document share exactly the configured overlap.
/// - `page` is only set when the extracted text carried form-feed page breaks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub sequence: u32,
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
    pub page: Option<u32>,
    pub text_sha256: String,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }
}

/// Parameters used to cut a document into chunks, kept with the document for diagnostics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkingParams {
    pub max_chunk_len: usize,
    pub overlap: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            max_chunk_len: 1000,
            overlap: 200,
        }
    }
}

/// The single active document. Identity is the filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub filename: String,
    pub text_len: usize,
    pub text_sha256: String,
    pub chunks: Vec<Arc<Chunk>>,
    pub chunking: ChunkingParams,
    pub created_at: String, // RFC3339
}

impl Document {
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            filename: self.filename.clone(),
            text_len: self.text_len,
            chunk_count: self.chunks.len(),
            created_at: self.created_at.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentSummary {
    pub filename: String,
    pub text_len: usize,
    pub chunk_count: usize,
    pub created_at: String,
}

/// A question as received from the caller. Never stored by the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Query {
    pub question: String,
    pub asked_at: String, // RFC3339
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub filename: String,
    pub sequence: u32,
    pub char_range: [usize; 2],
    pub page: Option<u32>,
    pub text_sha256: String,
    pub score: f32,
    pub snippet: String,
}

impl Citation {
    pub fn for_chunk(filename: &str, chunk: &Chunk, score: f32) -> Self {
        Self {
            filename: filename.to_string(),
            sequence: chunk.sequence,
            char_range: [chunk.char_start, chunk.char_end],
            page: chunk.page,
            text_sha256: chunk.text_sha256.clone(),
            score,
            snippet: snippet_first_chars(&chunk.text, 280),
        }
    }
}

/// Advisory comparison of an answer against the context it was generated from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroundingReport {
    pub declined: bool,
    pub answer_terms: usize,
    pub unsupported_terms: Vec<String>,
}

impl GroundingReport {
    /// Share of answer terms that appear somewhere in the retrieved chunks.
    pub fn support_ratio(&self) -> f32 {
        if self.answer_terms == 0 {
            return 1.0;
        }
        let supported = self.answer_terms - self.unsupported_terms.len().min(self.answer_terms);
        supported as f32 / self.answer_terms as f32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    pub source: Citation,
    pub context: Vec<Citation>,
    pub model: String,
    pub grounding: GroundingReport,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadReceipt {
    pub filename: String,
    pub text_len: usize,
    pub chunk_count: usize,
    pub created_at: String,
}

pub fn snippet_first_chars(text: &str, max_chars: usize) -> String {
    let t = text.trim();
    match t.char_indices().nth(max_chars) {
        None => t.to_string(),
        Some((byte_end, _)) => {
            let mut s = t[..byte_end].to_string();
            s.push_str("...");
            s
        }
    }
}
