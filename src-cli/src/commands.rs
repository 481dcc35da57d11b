use std::path::Path;

use docqa_ai::ollama::RuntimeHealth;
use docqa_ai::orchestrator::Orchestrator;
use docqa_core::config::DocQaConfig;
use docqa_core::domain::{Answer, UploadReceipt};
use docqa_core::error::AppError;
use docqa_core::ingest::load_document_file;

pub fn upload_file(orch: &Orchestrator, path: &Path) -> Result<UploadReceipt, AppError> {
    let (filename, bytes) = load_document_file(path)?;
    Ok(orch.upload(&filename, &bytes)?)
}

pub fn ask(orch: &Orchestrator, question: &str) -> Result<Answer, AppError> {
    Ok(orch.ask(question)?)
}

pub fn health(config: &DocQaConfig) -> Result<RuntimeHealth, AppError> {
    Ok(docqa_ai::check_runtime(config)?)
}

pub fn render_answer(answer: &Answer) -> String {
    let src = &answer.source;
    let page = src.page.map(|p| format!(", page {p}")).unwrap_or_default();
    let mut out = format!(
        "{}\n\nSource: {} chunk {} (chars {}..{}{page}, score {:.3})\n> {}",
        answer.answer.trim(),
        src.filename,
        src.sequence,
        src.char_range[0],
        src.char_range[1],
        src.score,
        src.snippet.replace('\n', "\n> ")
    );
    if !answer.grounding.declined && !answer.grounding.unsupported_terms.is_empty() {
        out.push_str(&format!(
            "\n\nNot found in the retrieved context: {}",
            answer.grounding.unsupported_terms.join(", ")
        ));
    }
    out
}

pub fn render_error(err: &AppError) -> String {
    match &err.details {
        Some(details) => format!("{err}\n  {details}"),
        None => err.to_string(),
    }
}
