use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Single structured error shape handed to whatever transport sits in front of the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

/// Who has to act on a failure: the caller (bad input) or an operator (runtime problem).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Input,
    Infrastructure,
}

/// Every failure the upload/ask pipeline can report. All of them are terminal for the
/// request that produced them; nothing in the core retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocQaError {
    #[error("upload rejected: {reason}")]
    Upload { reason: String },

    #[error("document contains no text")]
    EmptyDocument,

    #[error("embedding model '{model}' failed to load: {cause}")]
    ModelLoad { model: String, cause: String },

    #[error("embedding failed: {cause}")]
    Embedding { cause: String },

    #[error("no document has been uploaded yet")]
    NoDocument,

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("vector index is empty")]
    IndexEmpty,

    #[error("generation timed out after {}s", .timeout.as_secs_f64())]
    GenerationTimeout { timeout: Duration },

    #[error("generation failed: {cause}")]
    Generation { cause: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("illegal pipeline transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

impl DocQaError {
    pub fn upload(reason: impl Into<String>) -> Self {
        Self::Upload {
            reason: reason.into(),
        }
    }

    pub fn embedding(cause: impl fmt::Display) -> Self {
        Self::Embedding {
            cause: cause.to_string(),
        }
    }

    pub fn generation(cause: impl fmt::Display) -> Self {
        Self::Generation {
            cause: cause.to_string(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code, used in logs and in [`AppError::code`].
    pub fn code(&self) -> &'static str {
        match self {
            DocQaError::Upload { .. } => "UPLOAD_ERROR",
            DocQaError::EmptyDocument => "EMPTY_DOCUMENT",
            DocQaError::ModelLoad { .. } => "MODEL_LOAD_ERROR",
            DocQaError::Embedding { .. } => "EMBEDDING_ERROR",
            DocQaError::NoDocument => "NO_DOCUMENT",
            DocQaError::EmptyQuestion => "EMPTY_QUESTION",
            DocQaError::IndexEmpty => "INDEX_EMPTY",
            DocQaError::GenerationTimeout { .. } => "GENERATION_TIMEOUT",
            DocQaError::Generation { .. } => "GENERATION_ERROR",
            DocQaError::InvalidConfig { .. } => "INVALID_CONFIG",
            DocQaError::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DocQaError::Upload { .. }
            | DocQaError::EmptyDocument
            | DocQaError::NoDocument
            | DocQaError::EmptyQuestion => ErrorCategory::Input,
            DocQaError::ModelLoad { .. }
            | DocQaError::Embedding { .. }
            | DocQaError::IndexEmpty
            | DocQaError::GenerationTimeout { .. }
            | DocQaError::Generation { .. }
            | DocQaError::InvalidConfig { .. }
            | DocQaError::InvalidTransition { .. } => ErrorCategory::Infrastructure,
        }
    }

    fn user_message(&self) -> &'static str {
        match self {
            DocQaError::Upload { .. } => "The uploaded file could not be read as a text document",
            DocQaError::EmptyDocument => "The uploaded document contains no text",
            DocQaError::ModelLoad { .. } => "The embedding model could not be loaded",
            DocQaError::Embedding { .. } => "Computing embeddings failed",
            DocQaError::NoDocument => "Please upload a document before asking questions",
            DocQaError::EmptyQuestion => "Question must not be empty",
            DocQaError::IndexEmpty => "The document index is empty",
            DocQaError::GenerationTimeout { .. } => "The local model did not answer in time",
            DocQaError::Generation { .. } => "The local model failed to generate an answer",
            DocQaError::InvalidConfig { .. } => "The service is misconfigured",
            DocQaError::InvalidTransition { .. } => "Internal pipeline error",
        }
    }
}

impl From<DocQaError> for AppError {
    fn from(err: DocQaError) -> Self {
        // Advisory only: operators may re-issue the request, the core never does.
        let retryable = matches!(
            err,
            DocQaError::GenerationTimeout { .. }
                | DocQaError::Generation { .. }
                | DocQaError::Embedding { .. }
        );
        AppError::new(err.code(), err.user_message())
            .with_details(err.to_string())
            .with_retryable(retryable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        let all = vec![
            DocQaError::upload("x"),
            DocQaError::EmptyDocument,
            DocQaError::ModelLoad {
                model: "m".to_string(),
                cause: "c".to_string(),
            },
            DocQaError::embedding("x"),
            DocQaError::NoDocument,
            DocQaError::EmptyQuestion,
            DocQaError::IndexEmpty,
            DocQaError::GenerationTimeout {
                timeout: Duration::from_secs(1),
            },
            DocQaError::generation("x"),
            DocQaError::invalid_config("x"),
            DocQaError::InvalidTransition {
                from: "a".to_string(),
                to: "b".to_string(),
            },
        ];
        let mut codes = all.iter().map(|e| e.code()).collect::<Vec<_>>();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn input_errors_are_distinguished_from_infrastructure() {
        assert_eq!(DocQaError::NoDocument.category(), ErrorCategory::Input);
        assert_eq!(DocQaError::EmptyDocument.category(), ErrorCategory::Input);
        assert_eq!(DocQaError::upload("bad").category(), ErrorCategory::Input);
        assert_eq!(
            DocQaError::generation("refused").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(
            DocQaError::GenerationTimeout {
                timeout: Duration::from_secs(180)
            }
            .category(),
            ErrorCategory::Infrastructure
        );
    }

    #[test]
    fn app_error_keeps_code_and_cause() {
        let err: AppError = DocQaError::generation("connection refused").into();
        assert_eq!(err.code, "GENERATION_ERROR");
        assert!(err.retryable);
        assert_eq!(
            err.details.as_deref(),
            Some("generation failed: connection refused")
        );

        let timeout: AppError = DocQaError::GenerationTimeout {
            timeout: Duration::from_millis(1500),
        }
        .into();
        assert_eq!(timeout.code, "GENERATION_TIMEOUT");
        assert_eq!(
            timeout.details.as_deref(),
            Some("generation timed out after 1.5s")
        );
    }
}
