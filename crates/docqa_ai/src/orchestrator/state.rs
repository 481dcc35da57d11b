use std::fmt;

use docqa_core::error::DocQaError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureReason {
    pub code: String,
    pub message: String,
}

impl From<&DocQaError> for FailureReason {
    fn from(err: &DocQaError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Pipeline stage of one upload or ask request.
///
/// Upload: `Idle -> Ingesting -> Embedding -> Indexed`.
/// Ask: `Indexed -> Retrieving -> Augmenting -> Generating -> Done`.
/// Any working stage may end in `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Ingesting,
    Embedding,
    Indexed,
    Retrieving,
    Augmenting,
    Generating,
    Done,
    Failed(FailureReason),
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Ingesting => "ingesting",
            PipelineState::Embedding => "embedding",
            PipelineState::Indexed => "indexed",
            PipelineState::Retrieving => "retrieving",
            PipelineState::Augmenting => "augmenting",
            PipelineState::Generating => "generating",
            PipelineState::Done => "done",
            PipelineState::Failed(_) => "failed",
        }
    }

    pub fn permits(&self, next: &PipelineState) -> bool {
        use PipelineState::*;
        match self {
            Idle => matches!(next, Ingesting),
            Ingesting => matches!(next, Embedding | Failed(_)),
            Embedding => matches!(next, Indexed | Failed(_)),
            Indexed => matches!(next, Retrieving),
            Retrieving => matches!(next, Augmenting | Failed(_)),
            Augmenting => matches!(next, Generating | Failed(_)),
            Generating => matches!(next, Done | Failed(_)),
            Done | Failed(_) => false,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Failed(reason) => write!(f, "failed({})", reason.code),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Upload,
    Ask,
}

/// State and trail of a single request.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    flow: FlowKind,
    state: PipelineState,
    trail: Vec<PipelineState>,
}

impl PipelineRun {
    pub fn upload() -> Self {
        Self::starting_at(FlowKind::Upload, PipelineState::Idle)
    }

    pub fn ask() -> Self {
        Self::starting_at(FlowKind::Ask, PipelineState::Indexed)
    }

    fn starting_at(flow: FlowKind, state: PipelineState) -> Self {
        Self {
            flow,
            trail: vec![state.clone()],
            state,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn trail(&self) -> &[PipelineState] {
        &self.trail
    }

    pub fn advance(&mut self, next: PipelineState) -> Result<(), DocQaError> {
        if !self.state.permits(&next) {
            return Err(DocQaError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(flow = ?self.flow, from = %self.state, to = %next, "pipeline transition");
        self.state = next.clone();
        self.trail.push(next);
        Ok(())
    }

    /// Record `err` as the terminal state and hand it back for propagation.
    pub fn fail(&mut self, err: DocQaError) -> DocQaError {
        let failed = PipelineState::Failed(FailureReason::from(&err));
        if let Err(illegal) = self.advance(failed) {
            tracing::warn!(flow = ?self.flow, error = %illegal, "failure outside a working stage");
        }
        tracing::warn!(flow = ?self.flow, code = err.code(), error = %err, "request failed");
        err
    }
}
