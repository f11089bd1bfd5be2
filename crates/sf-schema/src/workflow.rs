//! Workflow State and the plan/node/event vocabulary shared
//! between the engine, scheduler, and checkpoint store. This module defines
//! data only; `sf-engine` owns the state machine that mutates it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use sf_core::types::{ToolId, WorkflowId};

use crate::finding::UnifiedFinding;
use crate::request::Target;

/// `(workflow_id, checkpoint_seq)` — the stable identity of one immutable
/// checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CheckpointId {
    pub seq: u64,
}

impl CheckpointId {
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self { seq }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum WorkflowPhase {
    Pending,
    Running,
    Paused,
    Succeeded,
    Failed,
    Canceled,
}

impl WorkflowPhase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// A unit of work in a plan. Carries enough to be
/// re-derived deterministically from a checkpoint: no runtime handles,
/// only the tool ids and policy a node needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Initialize,
    SingleScan { tool_id: ToolId },
    ParallelScan { tool_ids: Vec<ToolId> },
    ResultCollection,
    Validation { severity_floor: Option<crate::severity::SeverityLevel>, required_cwes: Vec<u32>, excluded_cwes: Vec<u32> },
    HumanReview,
    /// Re-run of the node at `retry_of` under a stricter policy: re-runs the
    /// immediately preceding scan node.
    Retry { retry_of: usize },
    Finalize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum NodeStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeResult {
    pub status: NodeStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub diagnostic: Option<String>,
}

impl Default for NodeResult {
    fn default() -> Self {
        Self {
            status: NodeStatus::Pending,
            started_at: None,
            finished_at: None,
            attempts: 0,
            diagnostic: None,
        }
    }
}

/// Events the engine emits over the course of a run. Each is
/// idempotent-keyed by `(workflow_id, seq)` — `seq` here is the event's own
/// monotonic sequence number within the workflow, independent of
/// `checkpoint_seq` (a node can emit several events between checkpoints).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    WorkflowStarted,
    NodeStarted { kind: String, index: usize },
    ToolStarted { tool_id: ToolId },
    FindingEmitted { finding_id: String },
    ToolFinished { tool_id: ToolId, status: String },
    NodeFinished { kind: String, index: usize, status: NodeStatus },
    Progress { value: f32 },
    CheckpointSaved { seq: u64 },
    Paused,
    Resumed,
    WorkflowFinished { phase: WorkflowPhase },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub event: WorkflowEvent,
}

/// Full state of one workflow instance. A checkpoint is an
/// immutable snapshot of exactly this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: WorkflowId,
    pub workflow_type: String,
    pub phase: WorkflowPhase,
    pub target: Target,
    pub selected_tool_ids: Vec<ToolId>,
    pub plan: Vec<NodeSpec>,
    pub cursor: usize,
    pub node_results: Vec<NodeResult>,
    pub findings: Vec<UnifiedFinding>,
    pub context: BTreeMap<String, String>,
    pub progress: f32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub checkpoint_seq: u64,
    pub event_seq: u64,
}

impl WorkflowState {
    #[must_use]
    pub fn new(
        workflow_id: WorkflowId,
        workflow_type: impl Into<String>,
        target: Target,
        selected_tool_ids: Vec<ToolId>,
        plan: Vec<NodeSpec>,
    ) -> Self {
        let now = Utc::now();
        let node_count = plan.len();
        Self {
            workflow_id,
            workflow_type: workflow_type.into(),
            phase: WorkflowPhase::Pending,
            target,
            selected_tool_ids,
            plan,
            cursor: 0,
            node_results: (0..node_count).map(|_| NodeResult::default()).collect(),
            findings: Vec::new(),
            context: BTreeMap::new(),
            progress: 0.0,
            error: None,
            created_at: now,
            updated_at: now,
            checkpoint_seq: 0,
            event_seq: 0,
        }
    }

    /// Invariant: `cursor ≤ |plan|`.
    #[must_use]
    pub fn cursor_in_bounds(&self) -> bool {
        self.cursor <= self.plan.len()
    }

    /// Invariant: `phase=SUCCEEDED` implies `cursor = |plan|`.
    #[must_use]
    pub fn succeeded_implies_cursor_complete(&self) -> bool {
        self.phase != WorkflowPhase::Succeeded || self.cursor == self.plan.len()
    }
}
