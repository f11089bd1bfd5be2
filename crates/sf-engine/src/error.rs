//! Engine-level error taxonomy. Distinct from `AdapterError` and
//! `SchedulerOutcomeError` — this crate only wraps the other two when a node
//! fails fatally, plus the engine's own bookkeeping failures.

use thiserror::Error;

use sf_core::types::{ToolId, WorkflowId};
use sf_schema::workflow::WorkflowPhase;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("tool_id {0} is not registered")]
    ToolNotRegistered(ToolId),

    #[error("scenario {scenario} rejected its tool selection: {reason}")]
    PlanBuild { scenario: String, reason: String },

    #[error("workflow {0} is already in a terminal phase")]
    AlreadyTerminal(WorkflowId),

    #[error("workflow {workflow_id} is in phase {phase}, which cannot {action}")]
    InvalidTransition {
        workflow_id: WorkflowId,
        phase: WorkflowPhase,
        action: &'static str,
    },

    #[error("workflow {0} has no human_review node awaiting annotation")]
    NotAwaitingReview(WorkflowId),

    #[error(transparent)]
    Checkpoint(#[from] sf_checkpoint::CheckpointError),

    #[error("node at index {index} failed: {source}")]
    NodeFailed {
        index: usize,
        #[source]
        source: sf_adapter_api::AdapterError,
    },

    /// `diagnostic` carries the last attempt's adapter error text, when one
    /// was captured; not part of the `Display` message since `class` alone
    /// already identifies the failure category.
    #[error("node at index {index} exhausted its retries: {class:?}")]
    RetriesExhausted {
        index: usize,
        class: sf_scheduler::FailureClass,
        diagnostic: Option<String>,
    },

    #[error("node at index {index} was canceled")]
    NodeCanceled { index: usize },
}

pub type EngineResult<T> = Result<T, EngineError>;
