use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use docqa_core::config::DocQaConfig;
use docqa_core::domain::{
    Answer, Citation, ChunkingParams, Document, DocumentSummary, Query, UploadReceipt,
};
use docqa_core::error::DocQaError;
use docqa_core::ingest::{build_document, DocumentExtractor, TextExtractor};
use docqa_core::now_rfc3339_utc;
use serde::{Deserialize, Serialize};

use crate::embeddings::EmbeddingService;
use crate::guardrails::grounding_report;
use crate::index::{IndexEntry, SearchHit, VectorIndex};
use crate::llm::GenerationClient;
use crate::prompts::grounded_answer_prompt;

pub mod state;

pub use state::{FailureReason, FlowKind, PipelineRun, PipelineState};

// Below this share of supported answer terms the answer is logged as weakly grounded.
const WEAK_SUPPORT_RATIO: f32 = 0.5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineSettings {
    pub chunking: ChunkingParams,
    pub top_k: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunking: ChunkingParams::default(),
            top_k: 4,
        }
    }
}

impl From<&DocQaConfig> for PipelineSettings {
    fn from(cfg: &DocQaConfig) -> Self {
        Self {
            chunking: cfg.chunking,
            top_k: cfg.top_k,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrchestratorStatus {
    pub document: Option<DocumentSummary>,
    pub last_upload: PipelineState,
    pub embedding_model: String,
    pub embedding_model_loaded: bool,
    pub generation_model: String,
}

/// The active document and the index built from it. Always replaced together.
#[derive(Debug, Default)]
struct ActiveSlot {
    document: Option<Document>,
    index: VectorIndex,
}

enum UploadContent<'a> {
    Bytes(&'a [u8]),
    Text(&'a str),
}

/// Owns the single active document and runs the upload and ask pipelines over it.
///
/// Notes:
/// - `search` and the index swap share one `RwLock`: asks read concurrently, an upload's swap
///   waits for them and blocks new ones only for the swap itself.
/// - Uploads are serialized by a separate gate so their swaps cannot interleave.
/// - Embedding and generation run outside the slot lock.
/// - A failed upload never touches the slot; an ask never mutates anything.
pub struct Orchestrator {
    settings: PipelineSettings,
    extractor: Box<dyn TextExtractor>,
    embeddings: EmbeddingService,
    generator: GenerationClient,
    slot: RwLock<ActiveSlot>,
    upload_gate: Mutex<()>,
    last_upload: Mutex<PipelineState>,
}

impl Orchestrator {
    pub fn new(
        settings: PipelineSettings,
        embeddings: EmbeddingService,
        generator: GenerationClient,
    ) -> Self {
        Self {
            settings,
            extractor: Box::new(DocumentExtractor),
            embeddings,
            generator,
            slot: RwLock::new(ActiveSlot::default()),
            upload_gate: Mutex::new(()),
            last_upload: Mutex::new(PipelineState::Idle),
        }
    }

    /// Replace the default [`DocumentExtractor`] (PDF or UTF-8 text).
    pub fn with_extractor(mut self, extractor: impl TextExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Load the embedding model ahead of the first upload.
    pub fn warm_up(&self) -> Result<usize, DocQaError> {
        self.embeddings.warm_up()
    }

    pub fn upload(&self, filename: &str, bytes: &[u8]) -> Result<UploadReceipt, DocQaError> {
        self.run_upload(filename, UploadContent::Bytes(bytes))
    }

    /// Upload text that was already extracted by the caller.
    pub fn upload_text(&self, filename: &str, text: &str) -> Result<UploadReceipt, DocQaError> {
        self.run_upload(filename, UploadContent::Text(text))
    }

    pub fn ask(&self, question: &str) -> Result<Answer, DocQaError> {
        if self.read_slot().document.is_none() {
            tracing::info!("question rejected: no document uploaded");
            return Err(DocQaError::NoDocument);
        }
        let query = Query {
            question: question.trim().to_string(),
            asked_at: now_rfc3339_utc(),
        };
        if query.question.is_empty() {
            return Err(DocQaError::EmptyQuestion);
        }

        let started = Instant::now();
        let mut run = PipelineRun::ask();
        let answer = self.ask_stages(&mut run, &query)?;
        tracing::info!(
            filename = %answer.source.filename,
            source_chunk = answer.source.sequence,
            score = answer.source.score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "question answered"
        );
        Ok(answer)
    }

    pub fn active_document(&self) -> Option<DocumentSummary> {
        self.read_slot().document.as_ref().map(Document::summary)
    }

    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            document: self.active_document(),
            last_upload: lock(&self.last_upload).clone(),
            embedding_model: self.embeddings.model_name().to_string(),
            embedding_model_loaded: self.embeddings.handle().is_loaded(),
            generation_model: self.generator.model().to_string(),
        }
    }

    fn run_upload(
        &self,
        filename: &str,
        content: UploadContent<'_>,
    ) -> Result<UploadReceipt, DocQaError> {
        let _gate = lock(&self.upload_gate);
        let started = Instant::now();
        let mut run = PipelineRun::upload();
        let result = self.upload_stages(&mut run, filename, content);
        *lock(&self.last_upload) = run.state().clone();

        if let Ok(receipt) = &result {
            tracing::info!(
                filename = %receipt.filename,
                chunks = receipt.chunk_count,
                chars = receipt.text_len,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "document indexed"
            );
        }
        result
    }

    fn upload_stages(
        &self,
        run: &mut PipelineRun,
        filename: &str,
        content: UploadContent<'_>,
    ) -> Result<UploadReceipt, DocQaError> {
        run.advance(PipelineState::Ingesting)?;
        let document = self
            .ingest(filename, content)
            .map_err(|e| run.fail(e))?;

        run.advance(PipelineState::Embedding)?;
        let entries = self.embed_chunks(&document).map_err(|e| run.fail(e))?;

        let receipt = UploadReceipt {
            filename: document.filename.clone(),
            text_len: document.text_len,
            chunk_count: document.chunks.len(),
            created_at: document.created_at.clone(),
        };
        {
            let mut slot = self.write_slot();
            slot.index.build(entries).map_err(|e| run.fail(e))?;
            slot.document = Some(document);
        }
        run.advance(PipelineState::Indexed)?;
        Ok(receipt)
    }

    fn ingest(&self, filename: &str, content: UploadContent<'_>) -> Result<Document, DocQaError> {
        let text = match content {
            UploadContent::Bytes(bytes) => self.extractor.extract(filename, bytes)?,
            UploadContent::Text(text) => docqa_core::ingest::normalize_text(text),
        };
        build_document(filename, &text, &self.settings.chunking, now_rfc3339_utc())
    }

    fn embed_chunks(&self, document: &Document) -> Result<Vec<IndexEntry>, DocQaError> {
        let texts: Vec<&str> = document.chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embeddings.embed(&texts)?;
        Ok(document
            .chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry::new(Arc::clone(chunk), vector))
            .collect())
    }

    fn ask_stages(&self, run: &mut PipelineRun, query: &Query) -> Result<Answer, DocQaError> {
        run.advance(PipelineState::Retrieving)?;
        let (filename, hits) = self.retrieve(&query.question).map_err(|e| run.fail(e))?;
        let Some(best) = hits.first() else {
            return Err(run.fail(DocQaError::IndexEmpty));
        };
        let source = Citation::for_chunk(&filename, &best.chunk, best.score);

        run.advance(PipelineState::Augmenting)?;
        let prompt = grounded_answer_prompt(&query.question, &hits);

        run.advance(PipelineState::Generating)?;
        let text = self.generator.generate(&prompt).map_err(|e| run.fail(e))?;

        let context_texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
        let grounding = grounding_report(&text, &context_texts);
        if !grounding.declined && grounding.support_ratio() < WEAK_SUPPORT_RATIO {
            tracing::warn!(
                unsupported = ?grounding.unsupported_terms,
                support = grounding.support_ratio(),
                "answer is weakly supported by the retrieved chunks"
            );
        }

        run.advance(PipelineState::Done)?;
        Ok(Answer {
            question: query.question.clone(),
            answer: text,
            source,
            context: hits
                .iter()
                .map(|h| Citation::for_chunk(&filename, &h.chunk, h.score))
                .collect(),
            model: self.generator.model().to_string(),
            grounding,
        })
    }

    /// Embed the question, then search the active index. Filename and hits come from the same
    /// snapshot even if an upload swaps the slot meanwhile.
    fn retrieve(&self, question: &str) -> Result<(String, Vec<SearchHit>), DocQaError> {
        let query_vector = self.embeddings.embed_one(question)?;
        let slot = self.read_slot();
        let document = slot.document.as_ref().ok_or(DocQaError::NoDocument)?;
        let hits = slot.index.search(&query_vector, self.settings.top_k)?;
        tracing::debug!(
            filename = %document.filename,
            hits = hits.len(),
            best = ?hits.first().map(|h| h.score),
            "retrieved chunks"
        );
        Ok((document.filename.clone(), hits))
    }

    fn read_slot(&self) -> RwLockReadGuard<'_, ActiveSlot> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, ActiveSlot> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("settings", &self.settings)
            .field("embeddings", &self.embeddings)
            .field("generator", &self.generator)
            .finish_non_exhaustive()
    }
}
