use sf_core::types::WorkflowId;
use thiserror::Error;

pub type CheckpointResult<T> = Result<T, CheckpointError>;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("workflow {0} has no checkpoints")]
    NoCheckpoints(WorkflowId),

    #[error("workflow {workflow_id} has no checkpoint at seq {seq}")]
    SeqNotFound { workflow_id: WorkflowId, seq: u64 },

    #[error("workflow {0} has no metadata")]
    NoMetadata(WorkflowId),

    #[error("checkpoint serialization failed: {0}")]
    Serialize(String),

    #[error("checkpoint deserialization failed: {0}")]
    Deserialize(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
