use crate::index::SearchHit;

/// Fixed reply the model is told to give when the chunks do not contain the answer.
pub const NOT_FOUND_REPLY: &str = "I cannot find this information in the provided document.";

/// Numbered `[Chunk n]` blocks, best match first, separated by `---`. Chunk text is embedded
/// verbatim.
pub fn context_blocks(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("[Chunk {}]\n{}", i + 1, hit.chunk.text.trim_end()))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub fn grounded_answer_prompt(question: &str, hits: &[SearchHit]) -> String {
    // Keep the contract explicit:
    // - Use ONLY the chunks provided.
    // - Declining with the fixed sentence is an acceptable answer.
    let context = context_blocks(hits);
    format!(
        r#"You are answering questions about a single uploaded document. Answer STRICTLY from the document chunks below.

Rules (non-negotiable):
1) Use ONLY information stated in the document chunks. Do not use outside knowledge.
2) When the chunks answer the question, answer concisely and cite the chunk numbers you used (e.g. "According to Chunk 1, ...").
3) If the chunks do not contain the answer, reply exactly: "{NOT_FOUND_REPLY}" Saying you don't know is always acceptable.
4) Do not invent or infer facts that are not explicitly stated in the chunks.
5) Quote the document when it helps.

Document chunks:
{context}

Question: {question}

Answer (cite chunk numbers):"#
    )
}
