use sha2::{Digest, Sha256};

use crate::config::validate_chunking;
use crate::domain::{Chunk, ChunkingParams};
use crate::error::DocQaError;

/// Preferred cut points, strongest first. A cut lands right after the separator.
const SEPARATORS: [&str; 5] = ["\u{c}", "\n\n", "\n", ". ", " "];

pub(crate) const FORM_FEED: char = '\u{c}';

/// Split `text` into overlapping chunks.
///
/// Guarantees:
/// - every chunk holds at most `max_chunk_len` characters;
/// - chunk `n + 1` starts exactly `overlap` characters before chunk `n` ends, so dropping the
///   first `overlap` characters of every chunk but the first rebuilds `text` verbatim;
/// - chunks are numbered from 0 in text order.
///
/// Within a window the end is pulled back to the strongest boundary (page break first, then
/// paragraph, line, sentence, word) found far enough into the window; otherwise the window is
/// cut at its hard edge.
pub fn ingest(text: &str, params: &ChunkingParams) -> Result<Vec<Chunk>, DocQaError> {
    validate_chunking(params)?;
    if text.trim().is_empty() {
        return Err(DocQaError::EmptyDocument);
    }

    let offsets = CharOffsets::new(text);
    let n = offsets.len();
    let stride = params.max_chunk_len - params.overlap;
    let page_breaks: Vec<usize> = text
        .chars()
        .enumerate()
        .filter(|(_, c)| *c == FORM_FEED)
        .map(|(i, _)| i)
        .collect();

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let hard_end = (start + params.max_chunk_len).min(n);
        let end = if hard_end == n {
            n
        } else {
            let min_end = start + params.overlap + (stride / 2).max(1);
            preferred_end(text, &offsets, min_end, hard_end)
        };

        let span = &text[offsets.byte(start)..offsets.byte(end)];
        let page = if page_breaks.is_empty() {
            None
        } else {
            Some(1 + page_breaks.partition_point(|&p| p < start) as u32)
        };
        chunks.push(Chunk {
            sequence: chunks.len() as u32,
            text: span.to_string(),
            char_start: start,
            char_end: end,
            page,
            text_sha256: sha256_hex(span.as_bytes()),
        });

        if end == n {
            break;
        }
        start = end - params.overlap;
    }

    tracing::debug!(
        chars = n,
        chunks = chunks.len(),
        max_chunk_len = params.max_chunk_len,
        overlap = params.overlap,
        "chunked document"
    );
    Ok(chunks)
}

/// Reassemble the source text from its chunks by dropping the shared overlap.
pub fn reassemble(chunks: &[Chunk], overlap: usize) -> String {
    let mut out = String::new();
    for (i, c) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(&c.text);
        } else {
            out.extend(c.text.chars().skip(overlap));
        }
    }
    out
}

fn preferred_end(text: &str, offsets: &CharOffsets, min_end: usize, hard_end: usize) -> usize {
    if min_end >= hard_end {
        return hard_end;
    }
    let window_start = offsets.byte(min_end);
    let window = &text[window_start..offsets.byte(hard_end)];
    for sep in SEPARATORS {
        if let Some(pos) = window.rfind(sep) {
            return offsets.char_index(window_start + pos + sep.len());
        }
    }
    hard_end
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

/// Byte offset of every char boundary, so char positions can be sliced without rescanning.
struct CharOffsets {
    starts: Vec<usize>,
    total: usize,
}

impl CharOffsets {
    fn new(text: &str) -> Self {
        Self {
            starts: text.char_indices().map(|(b, _)| b).collect(),
            total: text.len(),
        }
    }

    fn len(&self) -> usize {
        self.starts.len()
    }

    fn byte(&self, char_idx: usize) -> usize {
        self.starts.get(char_idx).copied().unwrap_or(self.total)
    }

    // `byte_pos` is always a char boundary here.
    fn char_index(&self, byte_pos: usize) -> usize {
        self.starts.partition_point(|&b| b < byte_pos)
    }
}
