mod common;

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{
    orchestrator, pdf_with_pages, settings, CountingEmbedder, FailingLlm, KeywordEmbedder,
    QuotingLlm, SilentLlm,
};
use docqa_ai::orchestrator::{FailureReason, PipelineState};
use docqa_core::error::{DocQaError, ErrorCategory};
use docqa_core::ingest::{load_document_file, TextExtractor};
use pretty_assertions::assert_eq;

const TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn asking_before_any_upload_is_no_document_and_does_no_model_work() {
    let embedder = CountingEmbedder::new();
    let llm = QuotingLlm::new();
    let orch = orchestrator(embedder.clone(), llm.clone(), settings(1000, 200, 4), TIMEOUT);

    assert_eq!(orch.ask("What does Alpha cause?").unwrap_err(), DocQaError::NoDocument);
    // Even a blank question is reported as missing document first.
    assert_eq!(orch.ask("   ").unwrap_err(), DocQaError::NoDocument);
    assert_eq!(DocQaError::NoDocument.category(), ErrorCategory::Input);

    assert_eq!(embedder.calls(), 0);
    assert_eq!(llm.calls(), 0);
    assert_eq!(orch.status().document, None);
    assert_eq!(orch.status().last_upload, PipelineState::Idle);
}

#[test]
fn answers_from_the_single_chunk_and_cites_it() {
    let orch = orchestrator(
        CountingEmbedder::new(),
        QuotingLlm::new(),
        settings(1000, 200, 4),
        TIMEOUT,
    );
    let receipt = orch
        .upload_text("notes.txt", "Alpha causes Beta. Beta causes Gamma.")
        .expect("upload");
    assert_eq!(receipt.filename, "notes.txt");
    assert_eq!(receipt.chunk_count, 1);
    assert_eq!(receipt.text_len, 37);

    let answer = orch.ask("What does Alpha cause?").expect("ask");
    assert!(answer.answer.contains("Beta"), "answer: {}", answer.answer);
    assert_eq!(answer.source.filename, "notes.txt");
    assert_eq!(answer.source.sequence, 0);
    assert_eq!(answer.source.char_range, [0, 37]);
    assert!(answer.source.snippet.contains("Alpha causes Beta"));
    assert_eq!(answer.context.len(), 1);
    assert_eq!(answer.model, "fake-model");
    assert!(!answer.grounding.declined);
    assert_eq!(answer.grounding.unsupported_terms, Vec::<String>::new());
}

#[test]
fn retrieves_the_chunk_that_matches_the_question() {
    let text = "Alpha causes Beta in warm climates.\n\n\
                Gamma prevents Delta when frozen.\n\n\
                Epsilon follows Zeta every spring.";
    let orch = orchestrator(
        Arc::new(KeywordEmbedder),
        QuotingLlm::new(),
        settings(40, 5, 2),
        TIMEOUT,
    );
    let receipt = orch.upload_text("greek.txt", text).expect("upload");
    assert_eq!(receipt.chunk_count, 3);

    let answer = orch.ask("What does Gamma prevent?").expect("ask");
    assert_eq!(answer.source.sequence, 1);
    assert!(answer.source.snippet.contains("Gamma prevents Delta"));
    assert!(answer.answer.contains("Gamma prevents Delta"));
    assert_eq!(answer.context.len(), 2);
    assert_eq!(answer.context[0], answer.source);
}

#[test]
fn a_new_upload_replaces_the_previous_document_entirely() {
    let orch = orchestrator(
        CountingEmbedder::new(),
        QuotingLlm::new(),
        settings(1000, 200, 4),
        TIMEOUT,
    );
    orch.upload_text("a.txt", "Alpha causes Beta.").expect("upload a");
    orch.upload_text("b.txt", "Gamma prevents Delta.").expect("upload b");

    let answer = orch.ask("What does Alpha cause?").expect("ask");
    assert_eq!(answer.source.filename, "b.txt");
    assert!(answer.context.iter().all(|c| c.filename == "b.txt"));
    assert!(!answer.answer.contains("Beta"), "answer: {}", answer.answer);
    assert_eq!(
        orch.active_document().map(|d| d.filename),
        Some("b.txt".to_string())
    );
}

#[test]
fn reupload_under_the_same_name_never_cites_the_old_text() {
    let orch = orchestrator(
        CountingEmbedder::new(),
        QuotingLlm::new(),
        settings(1000, 200, 4),
        TIMEOUT,
    );
    orch.upload_text("notes.txt", "Alpha causes Beta.").expect("upload a");
    let before = orch.ask("What does Alpha cause?").expect("ask a");
    assert!(before.source.snippet.contains("Alpha causes Beta."));
    let old_sha = before.source.text_sha256.clone();

    orch.upload_text("notes.txt", "Gamma prevents Delta now.").expect("upload b");
    let after = orch.ask("What does Alpha cause?").expect("ask b");

    assert_eq!(after.source.filename, "notes.txt");
    assert_eq!(after.source.snippet, "Gamma prevents Delta now.");
    assert_ne!(after.source.text_sha256, old_sha);
    assert!(after.context.iter().all(|c| c.text_sha256 != old_sha));
    assert!(after.context.iter().all(|c| !c.snippet.contains("Alpha")));
    assert!(!after.answer.contains("Alpha"), "answer: {}", after.answer);
    assert_eq!(orch.active_document().map(|d| d.chunk_count), Some(1));
}

#[test]
fn pdf_upload_cites_the_page_of_the_answer() {
    let bytes = pdf_with_pages(&[
        "Alpha causes Beta in warm climates.",
        "Gamma prevents Delta when frozen.",
    ]);
    let orch = orchestrator(
        Arc::new(KeywordEmbedder),
        QuotingLlm::new(),
        settings(40, 0, 1),
        TIMEOUT,
    );
    let receipt = orch.upload("handbook.pdf", &bytes).expect("upload");
    assert_eq!(receipt.chunk_count, 2);

    let answer = orch.ask("What does Gamma prevent?").expect("ask");
    assert_eq!(answer.source.filename, "handbook.pdf");
    assert_eq!(answer.source.sequence, 1);
    assert_eq!(answer.source.page, Some(2));
    assert!(answer.answer.contains("Gamma prevents Delta"), "answer: {}", answer.answer);

    let answer = orch.ask("What does Alpha cause?").expect("ask");
    assert_eq!(answer.source.page, Some(1));
}

/// Stands in for an OCR service: ignores the bytes and returns a fixed transcript.
struct TranscriptExtractor(&'static str);

impl TextExtractor for TranscriptExtractor {
    fn extract(&self, _filename: &str, _bytes: &[u8]) -> Result<String, DocQaError> {
        Ok(self.0.to_string())
    }
}

#[test]
fn a_custom_extractor_replaces_the_default() {
    let orch = orchestrator(
        CountingEmbedder::new(),
        QuotingLlm::new(),
        settings(1000, 200, 4),
        TIMEOUT,
    )
    .with_extractor(TranscriptExtractor("Alpha causes Beta."));

    let receipt = orch.upload("scan.png", &[0x89, b'P', b'N', b'G', 0, 0]).expect("upload");
    assert_eq!(receipt.text_len, 18);
    let answer = orch.ask("What does Alpha cause?").expect("ask");
    assert!(answer.answer.contains("Alpha causes Beta."));
}

#[test]
fn failed_upload_keeps_the_active_document() {
    let orch = orchestrator(
        CountingEmbedder::new(),
        QuotingLlm::new(),
        settings(1000, 200, 4),
        TIMEOUT,
    );
    orch.upload_text("a.txt", "Alpha causes Beta.").expect("upload a");

    let err = orch
        .upload("scan.pdf", b"%PDF-1.7 binary body")
        .unwrap_err();
    assert!(matches!(err, DocQaError::Upload { .. }));
    assert_eq!(err.category(), ErrorCategory::Input);
    assert!(matches!(
        orch.status().last_upload,
        PipelineState::Failed(FailureReason { ref code, .. }) if code == "UPLOAD_ERROR"
    ));

    assert_eq!(
        orch.upload_text("blank.txt", " \n\t ").unwrap_err(),
        DocQaError::EmptyDocument
    );

    let status = orch.status();
    assert_eq!(status.document.map(|d| d.filename), Some("a.txt".to_string()));
    let answer = orch.ask("What does Alpha cause?").expect("ask");
    assert_eq!(answer.source.filename, "a.txt");
}

#[test]
fn blank_question_is_rejected_once_a_document_exists() {
    let llm = QuotingLlm::new();
    let orch = orchestrator(
        CountingEmbedder::new(),
        llm.clone(),
        settings(1000, 200, 4),
        TIMEOUT,
    );
    orch.upload_text("a.txt", "Alpha causes Beta.").expect("upload");
    assert_eq!(orch.ask(" \n ").unwrap_err(), DocQaError::EmptyQuestion);
    assert_eq!(llm.calls(), 0);
}

#[test]
fn silent_model_times_out_after_the_window_without_hanging() {
    let window = Duration::from_millis(300);
    let orch = orchestrator(
        CountingEmbedder::new(),
        Arc::new(SilentLlm {
            hold: Duration::from_secs(5),
        }),
        settings(1000, 200, 4),
        window,
    );
    orch.upload_text("a.txt", "Alpha causes Beta.").expect("upload");

    let started = Instant::now();
    let err = orch.ask("What does Alpha cause?").unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err, DocQaError::GenerationTimeout { timeout: window });
    assert_eq!(err.category(), ErrorCategory::Infrastructure);
    assert!(elapsed >= window, "returned early after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(4), "hung for {elapsed:?}");

    // The document is still there; the timeout did not disturb it.
    assert!(orch.active_document().is_some());
}

#[test]
fn generation_failures_surface_verbatim() {
    let orch = orchestrator(
        CountingEmbedder::new(),
        Arc::new(FailingLlm),
        settings(1000, 200, 4),
        TIMEOUT,
    );
    orch.upload_text("a.txt", "Alpha causes Beta.").expect("upload");
    assert_eq!(
        orch.ask("What does Alpha cause?").unwrap_err(),
        DocQaError::Generation {
            cause: "connection refused".to_string()
        }
    );
}

#[test]
fn uploads_a_file_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("handbook.md");
    fs::write(&path, "# Handbook\r\n\r\nAlpha causes Beta.\r\n").expect("write");

    let orch = orchestrator(
        CountingEmbedder::new(),
        QuotingLlm::new(),
        settings(1000, 200, 4),
        TIMEOUT,
    );
    let (filename, bytes) = load_document_file(&path).expect("load");
    let receipt = orch.upload(&filename, &bytes).expect("upload");
    assert_eq!(receipt.filename, "handbook.md");
    assert_eq!(orch.status().last_upload, PipelineState::Indexed);
    assert_eq!(
        orch.status().document.map(|d| d.chunk_count),
        Some(1)
    );
}

#[test]
fn concurrent_asks_always_cite_a_consistent_snapshot() {
    let orch = Arc::new(orchestrator(
        CountingEmbedder::new(),
        QuotingLlm::new(),
        settings(1000, 200, 4),
        TIMEOUT,
    ));
    orch.upload_text("a.txt", "Alpha alpha alpha.").expect("upload");

    let uploader = {
        let orch = Arc::clone(&orch);
        thread::spawn(move || {
            for i in 0..20 {
                let (name, text) = if i % 2 == 0 {
                    ("g.txt", "Gamma gamma gamma.")
                } else {
                    ("a.txt", "Alpha alpha alpha.")
                };
                orch.upload_text(name, text).expect("upload");
            }
        })
    };
    let askers: Vec<_> = (0..4)
        .map(|_| {
            let orch = Arc::clone(&orch);
            thread::spawn(move || {
                for _ in 0..20 {
                    let answer = orch.ask("alpha?").expect("ask");
                    let expected = if answer.source.filename == "a.txt" {
                        "Alpha"
                    } else {
                        "Gamma"
                    };
                    assert!(answer.source.snippet.starts_with(expected));
                    assert!(answer.answer.contains(expected));
                }
            })
        })
        .collect();

    uploader.join().expect("uploader");
    for a in askers {
        a.join().expect("asker");
    }
}
