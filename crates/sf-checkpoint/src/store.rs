use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sf_core::types::WorkflowId;
use sf_schema::workflow::{WorkflowPhase, WorkflowState};

use crate::error::CheckpointResult;

/// Denormalized index of a workflow's last-known state, separate from the
/// (potentially large, findings-bearing) checkpoint snapshots. Lets readers
/// such as `scanforge status --all` list workflows without loading every
/// checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub workflow_id: WorkflowId,
    pub workflow_type: String,
    pub phase: WorkflowPhase,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowMetadata {
    #[must_use]
    pub fn from_state(state: &WorkflowState) -> Self {
        Self {
            workflow_id: state.workflow_id.clone(),
            workflow_type: state.workflow_type.clone(),
            phase: state.phase,
            created_at: state.created_at,
            updated_at: state.updated_at,
        }
    }
}

/// Persistence interface consumed by the engine. All writes are idempotent:
/// writing the same `(workflow_id, seq)` snapshot twice is a no-op from the
/// caller's perspective.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn put_checkpoint(
        &self,
        workflow_id: &WorkflowId,
        seq: u64,
        snapshot: &WorkflowState,
    ) -> CheckpointResult<()>;

    /// Reads the checkpoint at `seq`, or the latest one if `seq` is `None`.
    async fn get_checkpoint(
        &self,
        workflow_id: &WorkflowId,
        seq: Option<u64>,
    ) -> CheckpointResult<WorkflowState>;

    /// Every checkpoint sequence number recorded for this workflow, ascending.
    async fn list_checkpoints(&self, workflow_id: &WorkflowId) -> CheckpointResult<Vec<u64>>;

    async fn put_workflow_metadata(&self, metadata: &WorkflowMetadata) -> CheckpointResult<()>;

    async fn get_workflow_metadata(&self, workflow_id: &WorkflowId) -> CheckpointResult<WorkflowMetadata>;

    async fn list_workflows(&self) -> CheckpointResult<Vec<WorkflowId>>;

    /// Removes every checkpoint and the metadata entry for `workflow_id`.
    /// Idempotent: deleting an already-deleted (or never-existing) workflow
    /// succeeds silently.
    async fn delete_workflow(&self, workflow_id: &WorkflowId) -> CheckpointResult<()>;
}
