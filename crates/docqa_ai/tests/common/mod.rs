#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use docqa_ai::embeddings::{Embedder, EmbeddingService, HashingEmbedder, ModelHandle};
use docqa_ai::llm::{GenerationClient, Llm};
use docqa_ai::orchestrator::{Orchestrator, PipelineSettings};
use docqa_core::domain::ChunkingParams;
use docqa_core::error::DocQaError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// Hashing embedder that counts calls.
pub struct CountingEmbedder {
    inner: HashingEmbedder,
    pub calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: HashingEmbedder::new(128),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for CountingEmbedder {
    fn model(&self) -> &str {
        "counting"
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn embed(&self, input: &str) -> Result<Vec<f32>, DocQaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(input)
    }
}

/// Answers with the first context chunk of the prompt, the way a well-behaved model quotes it.
pub struct QuotingLlm {
    pub calls: AtomicUsize,
}

impl QuotingLlm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Llm for QuotingLlm {
    fn generate(&self, _model: &str, prompt: &str) -> Result<String, DocQaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let first = prompt
            .split("[Chunk 1]\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\n---\n\n").next())
            .and_then(|block| block.split("\n\nQuestion:").next())
            .ok_or_else(|| DocQaError::generation("prompt has no context"))?;
        Ok(format!("According to Chunk 1, {}", first.trim()))
    }
}

/// Never answers within any reasonable deadline.
pub struct SilentLlm {
    pub hold: Duration,
}

impl Llm for SilentLlm {
    fn generate(&self, _model: &str, _prompt: &str) -> Result<String, DocQaError> {
        thread::sleep(self.hold);
        Ok("too late".to_string())
    }
}

pub struct FailingLlm;

impl Llm for FailingLlm {
    fn generate(&self, _model: &str, _prompt: &str) -> Result<String, DocQaError> {
        Err(DocQaError::generation("connection refused"))
    }
}

pub fn settings(max_chunk_len: usize, overlap: usize, top_k: usize) -> PipelineSettings {
    PipelineSettings {
        chunking: ChunkingParams {
            max_chunk_len,
            overlap,
        },
        top_k,
    }
}

pub fn orchestrator(
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn Llm>,
    settings: PipelineSettings,
    timeout: Duration,
) -> Orchestrator {
    let embeddings = EmbeddingService::new(Arc::new(ModelHandle::ready(embedder)), 4);
    let generator = GenerationClient::new(llm, "fake-model", timeout);
    Orchestrator::new(settings, embeddings, generator)
}

const KEYWORDS: [&str; 6] = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"];

/// Counts known keywords; one dimension per keyword. Rankings under it are easy to predict.
pub struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn model(&self) -> &str {
        "keywords"
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len()
    }

    fn embed(&self, input: &str) -> Result<Vec<f32>, DocQaError> {
        let mut v = vec![0.0f32; KEYWORDS.len()];
        for word in input.split(|c: char| !c.is_alphanumeric()) {
            let word = word.to_lowercase();
            if let Some(i) = KEYWORDS.iter().position(|k| *k == word) {
                v[i] += 1.0;
            }
        }
        Ok(v)
    }
}

/// A minimal PDF with one line of Courier text per page.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let kids: Vec<Object> = pages
        .iter()
        .map(|text| {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().expect("encode")));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            })
            .into()
        })
        .collect();

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save");
    bytes
}
