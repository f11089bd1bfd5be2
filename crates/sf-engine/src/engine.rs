//! The workflow run loop: sequential node execution with a checkpoint
//! written before every subsequent node's side effects, resumable from any
//! checkpoint, and cancelable cooperatively via a per-workflow token.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::Utc;
use sf_adapter_api::CancellationToken;
use sf_core::types::{ToolId, WorkflowId};
use sf_checkpoint::WorkflowMetadata;
use sf_schema::request::Target;
use sf_schema::workflow::{NodeStatus, WorkflowEvent, WorkflowPhase, WorkflowState};
use sf_templates::{Scenario, ValidationPolicy};

use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::events::EventEmitter;
use crate::node::{self, NodeOutcome, HUMAN_REVIEW_ANNOTATION_KEY};
use crate::request::{WorkflowOptions, OPTIONS_CONTEXT_KEY};

/// Drives workflows against one [`EngineContext`]. Holds a cancellation token
/// per in-flight workflow so `cancel()` can reach a run from outside its own
/// call stack; everything else a run needs lives in the checkpointed
/// `WorkflowState` itself.
pub struct Engine {
    ctx: EngineContext,
    cancellations: Mutex<BTreeMap<WorkflowId, CancellationToken>>,
}

impl Engine {
    #[must_use]
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            ctx,
            cancellations: Mutex::new(BTreeMap::new()),
        }
    }

    fn cancellation_for(&self, workflow_id: &WorkflowId) -> CancellationToken {
        let mut map = self.cancellations.lock().expect("cancellation map lock poisoned");
        map.entry(workflow_id.clone()).or_insert_with(CancellationToken::new).clone()
    }

    fn reset_cancellation(&self, workflow_id: &WorkflowId) -> CancellationToken {
        let mut map = self.cancellations.lock().expect("cancellation map lock poisoned");
        let token = CancellationToken::new();
        map.insert(workflow_id.clone(), token.clone());
        token
    }

    /// Build a plan from a named scenario and persist the workflow's
    /// creation checkpoint (`seq=0`, `phase=PENDING`). Does not run it —
    /// call [`Engine::run`] on the returned state.
    pub async fn create_workflow(
        &self,
        workflow_id: WorkflowId,
        scenario: Scenario,
        target: Target,
        tool_ids: Vec<ToolId>,
        validation: ValidationPolicy,
        options: WorkflowOptions,
    ) -> EngineResult<WorkflowState> {
        let plan = sf_templates::build_plan(scenario, &tool_ids, validation).map_err(|source| EngineError::PlanBuild {
            scenario: scenario.name().to_string(),
            reason: source.to_string(),
        })?;

        let mut state = WorkflowState::new(workflow_id.clone(), scenario.name(), target, tool_ids, plan);
        state.context.insert(OPTIONS_CONTEXT_KEY.to_string(), options.to_context_value());

        self.ctx.store.put_checkpoint(&workflow_id, state.checkpoint_seq, &state).await?;
        self.ctx.store.put_workflow_metadata(&WorkflowMetadata::from_state(&state)).await?;
        Ok(state)
    }

    /// Start a freshly-created (`PENDING`) workflow and drive it to a
    /// terminal or `PAUSED` phase.
    pub async fn run(&self, mut state: WorkflowState) -> EngineResult<WorkflowState> {
        if state.phase != WorkflowPhase::Pending {
            return Err(EngineError::InvalidTransition {
                workflow_id: state.workflow_id.clone(),
                phase: state.phase,
                action: "run",
            });
        }
        state.phase = WorkflowPhase::Running;
        let cancellation = self.cancellation_for(&state.workflow_id);
        self.drive(&mut state, cancellation).await?;
        Ok(state)
    }

    /// Resume a `PAUSED` workflow from its latest checkpoint (or an explicit
    /// `checkpoint_seq`), optionally attaching a `human_review` annotation.
    /// Re-enters at `cursor` unchanged — no already-succeeded node re-runs.
    pub async fn resume(
        &self,
        workflow_id: &WorkflowId,
        checkpoint_seq: Option<u64>,
        human_review_annotation: Option<String>,
    ) -> EngineResult<WorkflowState> {
        let mut state = self.ctx.store.get_checkpoint(workflow_id, checkpoint_seq).await?;
        if state.phase != WorkflowPhase::Paused {
            return Err(EngineError::InvalidTransition {
                workflow_id: workflow_id.clone(),
                phase: state.phase,
                action: "resume",
            });
        }
        if let Some(annotation) = human_review_annotation {
            state.context.insert(HUMAN_REVIEW_ANNOTATION_KEY.to_string(), annotation);
        }
        state.phase = WorkflowPhase::Running;

        let cancellation = self.reset_cancellation(workflow_id);
        let emitter = EventEmitter { sink: self.ctx.events.as_ref() };
        let mut seq = state.event_seq;
        emitter.emit(workflow_id, &mut seq, WorkflowEvent::Resumed).await;
        state.event_seq = seq;

        self.drive(&mut state, cancellation).await?;
        Ok(state)
    }

    /// Signal cancellation. A `RUNNING` workflow's in-flight node observes
    /// the token at its next check and the driving `run`/`resume` call
    /// transitions it to `CANCELED`. A `PAUSED` workflow has no in-flight
    /// task to observe the token, so this transitions it directly.
    pub async fn cancel(&self, workflow_id: &WorkflowId) -> EngineResult<()> {
        let mut state = self.ctx.store.get_checkpoint(workflow_id, None).await?;
        if state.phase.is_terminal() {
            return Err(EngineError::AlreadyTerminal(workflow_id.clone()));
        }

        self.cancellation_for(workflow_id).cancel();

        if state.phase == WorkflowPhase::Paused {
            state.phase = WorkflowPhase::Canceled;
            state.updated_at = Utc::now();
            state.checkpoint_seq += 1;
            self.ctx.store.put_checkpoint(workflow_id, state.checkpoint_seq, &state).await?;
            self.ctx.store.put_workflow_metadata(&WorkflowMetadata::from_state(&state)).await?;

            let emitter = EventEmitter { sink: self.ctx.events.as_ref() };
            let mut seq = state.event_seq;
            emitter
                .emit(workflow_id, &mut seq, WorkflowEvent::WorkflowFinished { phase: state.phase })
                .await;
        }
        Ok(())
    }

    async fn drive(&self, state: &mut WorkflowState, cancellation: CancellationToken) -> EngineResult<()> {
        let emitter = EventEmitter { sink: self.ctx.events.as_ref() };
        let mut seq = state.event_seq;

        loop {
            if state.cursor >= state.plan.len() {
                state.phase = WorkflowPhase::Succeeded;
                break;
            }

            let index = state.cursor;
            let kind = state.plan[index].kind.clone();
            let label = node::kind_name(&kind).to_string();

            emitter
                .emit(&state.workflow_id, &mut seq, WorkflowEvent::NodeStarted { kind: label.clone(), index })
                .await;
            state.node_results[index].status = NodeStatus::Running;
            state.node_results[index].started_at = Some(Utc::now());
            state.node_results[index].attempts += 1;

            let outcome = node::run_node(&kind, state, &self.ctx, &cancellation, &emitter, &mut seq).await;

            match outcome {
                NodeOutcome::Succeeded => {
                    state.node_results[index].status = NodeStatus::Succeeded;
                    state.node_results[index].finished_at = Some(Utc::now());
                    emitter
                        .emit(
                            &state.workflow_id,
                            &mut seq,
                            WorkflowEvent::NodeFinished { kind: label, index, status: NodeStatus::Succeeded },
                        )
                        .await;

                    state.cursor += 1;
                    state.progress = state.cursor as f32 / state.plan.len() as f32;
                    emitter
                        .emit(&state.workflow_id, &mut seq, WorkflowEvent::Progress { value: state.progress })
                        .await;

                    state.event_seq = seq;
                    state.checkpoint_seq += 1;
                    state.updated_at = Utc::now();
                    self.ctx.store.put_checkpoint(&state.workflow_id, state.checkpoint_seq, state).await?;
                    emitter
                        .emit(&state.workflow_id, &mut seq, WorkflowEvent::CheckpointSaved { seq: state.checkpoint_seq })
                        .await;
                    state.event_seq = seq;
                }
                NodeOutcome::Paused => {
                    state.phase = WorkflowPhase::Paused;
                    emitter.emit(&state.workflow_id, &mut seq, WorkflowEvent::Paused).await;
                    state.event_seq = seq;
                    state.checkpoint_seq += 1;
                    state.updated_at = Utc::now();
                    self.ctx.store.put_checkpoint(&state.workflow_id, state.checkpoint_seq, state).await?;
                    self.ctx.store.put_workflow_metadata(&WorkflowMetadata::from_state(state)).await?;
                    return Ok(());
                }
                NodeOutcome::Canceled => {
                    state.node_results[index].status = NodeStatus::Failed;
                    state.node_results[index].diagnostic = Some("canceled".to_string());
                    state.node_results[index].finished_at = Some(Utc::now());
                    state.phase = WorkflowPhase::Canceled;

                    state.event_seq = seq;
                    state.checkpoint_seq += 1;
                    state.updated_at = Utc::now();
                    // Final checkpoint for this run: nothing is persisted
                    // after a cancellation takes effect.
                    self.ctx.store.put_checkpoint(&state.workflow_id, state.checkpoint_seq, state).await?;

                    emitter
                        .emit(&state.workflow_id, &mut seq, WorkflowEvent::WorkflowFinished { phase: state.phase })
                        .await;
                    state.event_seq = seq;
                    self.ctx.store.put_workflow_metadata(&WorkflowMetadata::from_state(state)).await?;
                    return Ok(());
                }
                NodeOutcome::Failed(err) => {
                    state.node_results[index].status = NodeStatus::Failed;
                    state.node_results[index].diagnostic = Some(err.to_string());
                    state.node_results[index].finished_at = Some(Utc::now());
                    state.phase = WorkflowPhase::Failed;
                    state.error = Some(err.to_string());

                    state.event_seq = seq;
                    state.checkpoint_seq += 1;
                    state.updated_at = Utc::now();
                    self.ctx.store.put_checkpoint(&state.workflow_id, state.checkpoint_seq, state).await?;
                    emitter
                        .emit(&state.workflow_id, &mut seq, WorkflowEvent::WorkflowFinished { phase: state.phase })
                        .await;
                    state.event_seq = seq;
                    self.ctx.store.put_workflow_metadata(&WorkflowMetadata::from_state(state)).await?;
                    return Err(err);
                }
            }
        }

        // Only reached via the top-of-loop `cursor >= plan.len()` break: phase=SUCCEEDED.
        emitter
            .emit(&state.workflow_id, &mut seq, WorkflowEvent::WorkflowFinished { phase: state.phase })
            .await;
        state.event_seq = seq;
        state.checkpoint_seq += 1;
        state.updated_at = Utc::now();
        self.ctx.store.put_checkpoint(&state.workflow_id, state.checkpoint_seq, state).await?;
        self.ctx.store.put_workflow_metadata(&WorkflowMetadata::from_state(state)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_checkpoint::FileStore;
    use sf_adapters::Registry;
    use std::sync::Arc;

    fn engine() -> (Engine, camino::Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::mem::forget(dir); // keep the tempdir alive for the test's duration
        let registry = Registry::new();
        registry.register(Arc::new(crate::test_support::FakeAdapter::new("semgrep", 2))).unwrap();
        let ctx = EngineContext::new(Arc::new(registry), Arc::new(FileStore::new(root.clone())));
        (Engine::new(ctx), root)
    }

    #[tokio::test]
    async fn code_commit_workflow_runs_to_completion() {
        let (engine, _root) = engine();
        let workflow_id = WorkflowId::new("wf-cc-1");
        let state = engine
            .create_workflow(
                workflow_id.clone(),
                Scenario::CodeCommit,
                Target::local_path("/tmp"),
                vec![ToolId::new("semgrep")],
                ValidationPolicy::default(),
                WorkflowOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(state.phase, WorkflowPhase::Pending);

        let finished = engine.run(state).await.unwrap();
        assert_eq!(finished.phase, WorkflowPhase::Succeeded);
        assert_eq!(finished.cursor, finished.plan.len());
    }

    #[tokio::test]
    async fn release_regression_pauses_at_human_review_then_resumes() {
        let (engine, _root) = engine();
        let workflow_id = WorkflowId::new("wf-rr-1");
        let state = engine
            .create_workflow(
                workflow_id.clone(),
                Scenario::ReleaseRegression,
                Target::local_path("/tmp"),
                vec![ToolId::new("semgrep")],
                ValidationPolicy::default(),
                WorkflowOptions::default(),
            )
            .await
            .unwrap();

        let paused = engine.run(state).await.unwrap();
        assert_eq!(paused.phase, WorkflowPhase::Paused);
        let human_review_index = paused.plan.iter().position(|n| node::kind_name(&n.kind) == "human_review").unwrap();
        assert_eq!(paused.cursor, human_review_index);

        let resumed = engine
            .resume(&workflow_id, None, Some("approved by reviewer".to_string()))
            .await
            .unwrap();
        assert_eq!(resumed.phase, WorkflowPhase::Succeeded);
        assert_eq!(resumed.cursor, resumed.plan.len());
    }

    #[tokio::test]
    async fn unregistered_tool_fails_the_workflow_at_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let ctx = EngineContext::new(Arc::new(Registry::new()), Arc::new(FileStore::new(root)));
        let engine = Engine::new(ctx);

        let workflow_id = WorkflowId::new("wf-missing-tool");
        let state = engine
            .create_workflow(
                workflow_id,
                Scenario::CodeCommit,
                Target::local_path("/tmp"),
                vec![ToolId::new("semgrep")],
                ValidationPolicy::default(),
                WorkflowOptions::default(),
            )
            .await
            .unwrap();

        let err = engine.run(state).await.unwrap_err();
        assert!(matches!(err, EngineError::ToolNotRegistered(_)));
    }

    #[tokio::test]
    async fn canceling_a_paused_workflow_transitions_it_directly() {
        let (engine, _root) = engine();
        let workflow_id = WorkflowId::new("wf-cancel-paused");
        let state = engine
            .create_workflow(
                workflow_id.clone(),
                Scenario::ReleaseRegression,
                Target::local_path("/tmp"),
                vec![ToolId::new("semgrep")],
                ValidationPolicy::default(),
                WorkflowOptions::default(),
            )
            .await
            .unwrap();
        let paused = engine.run(state).await.unwrap();
        assert_eq!(paused.phase, WorkflowPhase::Paused);

        engine.cancel(&workflow_id).await.unwrap();
        let err = engine.resume(&workflow_id, None, None).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn canceling_an_already_terminal_workflow_errors() {
        let (engine, _root) = engine();
        let workflow_id = WorkflowId::new("wf-already-done");
        let state = engine
            .create_workflow(
                workflow_id.clone(),
                Scenario::CodeCommit,
                Target::local_path("/tmp"),
                vec![ToolId::new("semgrep")],
                ValidationPolicy::default(),
                WorkflowOptions::default(),
            )
            .await
            .unwrap();
        engine.run(state).await.unwrap();

        let err = engine.cancel(&workflow_id).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyTerminal(_)));
    }
}
