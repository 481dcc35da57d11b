use std::collections::{BTreeSet, HashSet};

use docqa_core::domain::GroundingReport;

const MIN_TERM_CHARS: usize = 4;
const MAX_REPORTED_TERMS: usize = 20;

const DECLINE_MARKERS: [&str; 5] = [
    "cannot find this information",
    "can't find this information",
    "i don't know",
    "i do not know",
    "not mentioned in the document",
];

// Words too common to say anything about grounding.
const STOPWORDS: [&str; 32] = [
    "about", "according", "also", "answer", "because", "been", "being", "chunk", "chunks",
    "could", "document", "does", "from", "have", "into", "more", "most", "only", "other",
    "provided", "should", "some", "such", "than", "that", "their", "there", "these", "they",
    "this", "were", "what",
];

/// Compare an answer with the chunk texts it was generated from.
///
/// Advisory only: the report never blocks or rewrites an answer. A term is an answer word of at
/// least four characters that is not a stopword; it is unsupported when no chunk contains it.
pub fn grounding_report(answer: &str, context: &[&str]) -> GroundingReport {
    let lower = answer.to_lowercase();
    let declined = DECLINE_MARKERS.iter().any(|m| lower.contains(m));

    let known: HashSet<String> = context.iter().flat_map(|c| terms(c)).collect();
    let answer_terms: BTreeSet<String> = terms(answer).collect();
    let unsupported: Vec<String> = answer_terms
        .iter()
        .filter(|t| !known.contains(*t))
        .take(MAX_REPORTED_TERMS)
        .cloned()
        .collect();

    GroundingReport {
        declined,
        answer_terms: answer_terms.len(),
        unsupported_terms: unsupported,
    }
}

fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TERM_CHARS)
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
}
