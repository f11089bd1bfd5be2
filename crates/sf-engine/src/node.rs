//! One node's execution, per spec §4.5's eight node kinds.
//!
//! A node never retains state of its own between attempts — everything a
//! re-entry needs (cursor, findings so far, selected tools) lives in
//! `WorkflowState` and survives a checkpoint/resume unchanged. Scan nodes
//! delegate retry/backoff to `sf_scheduler::Scheduler`; this module only
//! decides what counts as success, partial success, pause, or fatal failure
//! at the node level.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sf_adapter_api::{Adapter, AdapterError, CancellationToken};
use sf_core::types::ToolId;
use sf_scheduler::{BoxFuture, FailureClass, RetryPolicy, Scheduler, SchedulerConfig, SchedulerOutcomeError, Task};
use sf_schema::capability::CapabilityDescriptor;
use sf_schema::finding::UnifiedFinding;
use sf_schema::request::ScanRequest;
use sf_schema::severity::SeverityLevel;
use sf_schema::workflow::{NodeKind, WorkflowEvent, WorkflowState};

use crate::context::EngineContext;
use crate::error::EngineError;
use crate::events::EventEmitter;
use crate::request::{build_execution_context, build_scan_request};

/// Key under `WorkflowState.context` a resumed `human_review` node checks
/// for. Set by `Engine::resume` before re-entering the node; absent means
/// the workflow hasn't been annotated yet.
pub const HUMAN_REVIEW_ANNOTATION_KEY: &str = "human_review_annotation";

#[derive(Debug)]
pub enum NodeOutcome {
    Succeeded,
    /// `human_review` with no annotation yet on file.
    Paused,
    Canceled,
    Failed(EngineError),
}

fn classify(error: &AdapterError) -> FailureClass {
    match error {
        AdapterError::Timeout { .. } => FailureClass::Timeout,
        AdapterError::ExecutionFailed { exit_code, .. } => FailureClass::ExecutionFailed { exit_code: *exit_code },
        AdapterError::ParseError(_) => FailureClass::ParseError,
        AdapterError::Canceled => FailureClass::Canceled,
        // `ToolMissing` has no dedicated scheduler failure class: both it and
        // `InvalidInput` are deterministic, always-fatal, never-retried
        // outcomes, so they share the non-retryable class here. The adapter's
        // own error text (captured in `ScanTask::diagnostics`) still
        // distinguishes them in the node's diagnostic string.
        AdapterError::ToolMissing(_) | AdapterError::InvalidInput { .. } => FailureClass::InvalidInput,
    }
}

struct ScanTask {
    adapter: Arc<dyn Adapter>,
    request: ScanRequest,
    descriptor: CapabilityDescriptor,
    node_budget: Duration,
    tool_id: ToolId,
    diagnostics: Arc<Mutex<BTreeMap<ToolId, String>>>,
}

impl Task<Vec<UnifiedFinding>> for ScanTask {
    fn attempt(&self, cancellation: CancellationToken) -> BoxFuture<Result<Vec<UnifiedFinding>, FailureClass>> {
        let adapter = Arc::clone(&self.adapter);
        let request = self.request.clone();
        let exec_ctx = build_execution_context(&request, &self.descriptor, self.node_budget, cancellation);
        let diagnostics = Arc::clone(&self.diagnostics);
        let tool_id = self.tool_id.clone();
        Box::pin(async move {
            let on_event = |_event: sf_adapter_api::AdapterEvent| {};
            match adapter.run(&request, &exec_ctx, &on_event).await {
                Ok(findings) => Ok(findings),
                Err(err) => {
                    diagnostics
                        .lock()
                        .expect("scan task diagnostics lock poisoned")
                        .insert(tool_id, err.to_string());
                    Err(classify(&err))
                }
            }
        })
    }
}

fn build_task(
    ctx: &EngineContext,
    state: &WorkflowState,
    tool_id: &ToolId,
    diagnostics: &Arc<Mutex<BTreeMap<ToolId, String>>>,
) -> Result<Arc<dyn Task<Vec<UnifiedFinding>>>, EngineError> {
    let adapter = ctx
        .registry
        .get(tool_id)
        .ok_or_else(|| EngineError::ToolNotRegistered(tool_id.clone()))?;
    let descriptor = adapter.describe();
    let request = build_scan_request(state, tool_id);
    Ok(Arc::new(ScanTask {
        adapter,
        request,
        descriptor,
        node_budget: ctx.node_budget,
        tool_id: tool_id.clone(),
        diagnostics: Arc::clone(diagnostics),
    }))
}

async fn run_single_scan(
    tool_id: &ToolId,
    state: &mut WorkflowState,
    ctx: &EngineContext,
    cancellation: &CancellationToken,
    emitter: &EventEmitter<'_>,
    event_seq: &mut u64,
) -> NodeOutcome {
    let diagnostics = Arc::new(Mutex::new(BTreeMap::new()));
    let task = match build_task(ctx, state, tool_id, &diagnostics) {
        Ok(task) => task,
        Err(err) => return NodeOutcome::Failed(err),
    };
    let _guard = ctx.registry.begin_execution(tool_id);
    emitter
        .emit(&state.workflow_id, event_seq, WorkflowEvent::ToolStarted { tool_id: tool_id.clone() })
        .await;

    let mut results = ctx.scheduler.run_all(vec![(tool_id.clone(), task)], cancellation.clone(), None).await;
    let (_, outcome) = results.pop().expect("exactly one task was submitted");

    match outcome {
        Ok(findings) => {
            emitter
                .emit(
                    &state.workflow_id,
                    event_seq,
                    WorkflowEvent::ToolFinished { tool_id: tool_id.clone(), status: "succeeded".into() },
                )
                .await;
            for finding in &findings {
                emitter
                    .emit(
                        &state.workflow_id,
                        event_seq,
                        WorkflowEvent::FindingEmitted { finding_id: finding.finding_id.as_str().to_string() },
                    )
                    .await;
            }
            state.findings.extend(findings);
            NodeOutcome::Succeeded
        }
        Err(SchedulerOutcomeError::Canceled) => {
            emitter
                .emit(
                    &state.workflow_id,
                    event_seq,
                    WorkflowEvent::ToolFinished { tool_id: tool_id.clone(), status: "canceled".into() },
                )
                .await;
            NodeOutcome::Canceled
        }
        Err(SchedulerOutcomeError::Exhausted(class)) => {
            emitter
                .emit(
                    &state.workflow_id,
                    event_seq,
                    WorkflowEvent::ToolFinished { tool_id: tool_id.clone(), status: "failed".into() },
                )
                .await;
            let diagnostic = diagnostics.lock().expect("diagnostics lock poisoned").get(tool_id).cloned();
            NodeOutcome::Failed(EngineError::RetriesExhausted { index: state.cursor, class, diagnostic })
        }
    }
}

async fn run_parallel_scan(
    tool_ids: &[ToolId],
    state: &mut WorkflowState,
    ctx: &EngineContext,
    cancellation: &CancellationToken,
    emitter: &EventEmitter<'_>,
    event_seq: &mut u64,
) -> NodeOutcome {
    let diagnostics = Arc::new(Mutex::new(BTreeMap::new()));
    let mut tasks = Vec::with_capacity(tool_ids.len());
    for tool_id in tool_ids {
        match build_task(ctx, state, tool_id, &diagnostics) {
            Ok(task) => tasks.push((tool_id.clone(), task)),
            Err(err) => return NodeOutcome::Failed(err),
        }
        emitter
            .emit(&state.workflow_id, event_seq, WorkflowEvent::ToolStarted { tool_id: tool_id.clone() })
            .await;
    }

    let results = ctx.scheduler.run_all(tasks, cancellation.clone(), None).await;

    let mut any_succeeded = false;
    let mut last_failure: Option<(ToolId, FailureClass)> = None;
    for (tool_id, outcome) in results {
        match outcome {
            Ok(findings) => {
                any_succeeded = true;
                emitter
                    .emit(
                        &state.workflow_id,
                        event_seq,
                        WorkflowEvent::ToolFinished { tool_id: tool_id.clone(), status: "succeeded".into() },
                    )
                    .await;
                for finding in &findings {
                    emitter
                        .emit(
                            &state.workflow_id,
                            event_seq,
                            WorkflowEvent::FindingEmitted { finding_id: finding.finding_id.as_str().to_string() },
                        )
                        .await;
                }
                state.findings.extend(findings);
            }
            Err(SchedulerOutcomeError::Canceled) => {
                emitter
                    .emit(
                        &state.workflow_id,
                        event_seq,
                        WorkflowEvent::ToolFinished { tool_id: tool_id.clone(), status: "canceled".into() },
                    )
                    .await;
            }
            Err(SchedulerOutcomeError::Exhausted(class)) => {
                emitter
                    .emit(
                        &state.workflow_id,
                        event_seq,
                        WorkflowEvent::ToolFinished { tool_id: tool_id.clone(), status: "failed".into() },
                    )
                    .await;
                last_failure = Some((tool_id, class));
            }
        }
    }

    // A workflow-level cancel always wins, even if some tasks had already
    // produced findings before it fired: those findings stay in
    // `state.findings` (added above), but the node itself reports canceled.
    if cancellation.is_canceled() {
        return NodeOutcome::Canceled;
    }

    if any_succeeded {
        return NodeOutcome::Succeeded;
    }

    match last_failure {
        Some((tool_id, class)) => {
            let diagnostic = diagnostics.lock().expect("diagnostics lock poisoned").get(&tool_id).cloned();
            NodeOutcome::Failed(EngineError::RetriesExhausted { index: state.cursor, class, diagnostic })
        }
        None => NodeOutcome::Canceled,
    }
}

async fn run_retry(
    retry_of: usize,
    state: &mut WorkflowState,
    ctx: &EngineContext,
    cancellation: &CancellationToken,
    emitter: &EventEmitter<'_>,
    event_seq: &mut u64,
) -> NodeOutcome {
    let Some(retried_kind) = state.plan.get(retry_of).map(|node| node.kind.clone()) else {
        return NodeOutcome::Failed(EngineError::PlanBuild {
            scenario: state.workflow_type.clone(),
            reason: format!("retry node references out-of-bounds index {retry_of}"),
        });
    };

    // Stricter policy than the original scan: a single attempt, no backoff —
    // this node only fires when the preceding scan already reported success
    // with zero findings, so a further multi-attempt retry would just
    // re-run the same no-op tool invocation several times.
    let strict_ctx = EngineContext {
        registry: Arc::clone(&ctx.registry),
        scheduler: Arc::new(Scheduler::new(SchedulerConfig {
            max_parallel: 1,
            per_task_timeout: ctx.node_budget,
            retry: RetryPolicy {
                max_retries: 0,
                base_backoff: Duration::ZERO,
                backoff_factor: 1,
                max_backoff: Duration::ZERO,
                retryable_exit_codes: Vec::new(),
            },
        })),
        store: Arc::clone(&ctx.store),
        events: Arc::clone(&ctx.events),
        node_budget: ctx.node_budget,
    };

    match retried_kind {
        NodeKind::SingleScan { tool_id } => {
            run_single_scan(&tool_id, state, &strict_ctx, cancellation, emitter, event_seq).await
        }
        NodeKind::ParallelScan { tool_ids } => {
            run_parallel_scan(&tool_ids, state, &strict_ctx, cancellation, emitter, event_seq).await
        }
        other => NodeOutcome::Failed(EngineError::PlanBuild {
            scenario: state.workflow_type.clone(),
            reason: format!("retry_of index {retry_of} does not name a scan node: {other:?}"),
        }),
    }
}

fn violates_policy(
    finding: &UnifiedFinding,
    severity_floor: Option<SeverityLevel>,
    required_cwes: &[u32],
    excluded_cwes: &[u32],
) -> bool {
    if let Some(floor) = severity_floor {
        if finding.severity.level < floor {
            return true;
        }
    }
    match finding.vulnerability_type.cwe_id {
        Some(cwe) => excluded_cwes.contains(&cwe) || (!required_cwes.is_empty() && !required_cwes.contains(&cwe)),
        None => !required_cwes.is_empty(),
    }
}

/// Apply the node's policy predicates; findings that don't conform are
/// tagged, never dropped — partial/non-conformant results stay exportable
/// per spec §7's "partial results are retained" rule.
fn run_validation(
    severity_floor: Option<SeverityLevel>,
    required_cwes: &[u32],
    excluded_cwes: &[u32],
    state: &mut WorkflowState,
) -> NodeOutcome {
    for finding in &mut state.findings {
        if violates_policy(finding, severity_floor, required_cwes, excluded_cwes) {
            finding.metadata.tags.insert("policy_violation".to_string());
        }
    }
    NodeOutcome::Succeeded
}

/// Stable name for a node kind, used in `NodeStarted`/`NodeFinished` events
/// and diagnostics; mirrors the private helper `sf_templates` uses internally
/// for its own plan-shape assertions.
#[must_use]
pub fn kind_name(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Initialize => "initialize",
        NodeKind::SingleScan { .. } => "single_scan",
        NodeKind::ParallelScan { .. } => "parallel_scan",
        NodeKind::ResultCollection => "result_collection",
        NodeKind::Validation { .. } => "validation",
        NodeKind::HumanReview => "human_review",
        NodeKind::Retry { .. } => "retry",
        NodeKind::Finalize => "finalize",
    }
}

fn run_initialize(state: &WorkflowState, ctx: &EngineContext) -> NodeOutcome {
    for tool_id in &state.selected_tool_ids {
        if ctx.registry.get(tool_id).is_none() {
            return NodeOutcome::Failed(EngineError::ToolNotRegistered(tool_id.clone()));
        }
    }
    NodeOutcome::Succeeded
}

#[allow(clippy::too_many_arguments)]
pub async fn run_node(
    kind: &NodeKind,
    state: &mut WorkflowState,
    ctx: &EngineContext,
    cancellation: &CancellationToken,
    emitter: &EventEmitter<'_>,
    event_seq: &mut u64,
) -> NodeOutcome {
    match kind {
        NodeKind::Initialize => {
            let outcome = run_initialize(state, ctx);
            if matches!(outcome, NodeOutcome::Succeeded) {
                emitter.emit(&state.workflow_id, event_seq, WorkflowEvent::WorkflowStarted).await;
            }
            outcome
        }
        NodeKind::SingleScan { tool_id } => run_single_scan(tool_id, state, ctx, cancellation, emitter, event_seq).await,
        NodeKind::ParallelScan { tool_ids } => {
            run_parallel_scan(tool_ids, state, ctx, cancellation, emitter, event_seq).await
        }
        NodeKind::ResultCollection => {
            state.findings = sf_aggregate::aggregate(std::mem::take(&mut state.findings));
            NodeOutcome::Succeeded
        }
        NodeKind::Validation { severity_floor, required_cwes, excluded_cwes } => {
            run_validation(*severity_floor, required_cwes, excluded_cwes, state)
        }
        NodeKind::HumanReview => {
            if state.context.contains_key(HUMAN_REVIEW_ANNOTATION_KEY) {
                NodeOutcome::Succeeded
            } else {
                NodeOutcome::Paused
            }
        }
        NodeKind::Retry { retry_of } => run_retry(*retry_of, state, ctx, cancellation, emitter, event_seq).await,
        NodeKind::Finalize => NodeOutcome::Succeeded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_checkpoint::FileStore;
    use sf_core::types::WorkflowId;
    use sf_schema::request::Target;
    use sf_schema::workflow::NodeSpec;

    fn ctx() -> EngineContext {
        let dir = tempfile::tempdir().unwrap();
        EngineContext::new(
            Arc::new(sf_adapters::Registry::new()),
            Arc::new(FileStore::new(camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap())),
        )
    }

    fn state() -> WorkflowState {
        WorkflowState::new(
            WorkflowId::new("wf-1"),
            "code_commit",
            Target::local_path("/tmp"),
            vec![ToolId::new("semgrep")],
            vec![NodeSpec { kind: NodeKind::Initialize }],
        )
    }

    #[test]
    fn validation_tags_findings_below_severity_floor() {
        let finding = crate::test_support::sample_finding("f1", SeverityLevel::Low, Some(89));
        let mut state = state();
        state.findings = vec![finding];
        let outcome = run_validation(Some(SeverityLevel::High), &[], &[], &mut state);
        assert!(matches!(outcome, NodeOutcome::Succeeded));
        assert!(state.findings[0].metadata.tags.contains("policy_violation"));
    }

    #[test]
    fn validation_tags_findings_missing_a_required_cwe() {
        let finding = crate::test_support::sample_finding("f1", SeverityLevel::High, None);
        let mut state = state();
        state.findings = vec![finding];
        run_validation(None, &[79], &[], &mut state);
        assert!(state.findings[0].metadata.tags.contains("policy_violation"));
    }

    #[test]
    fn validation_leaves_conformant_findings_untagged() {
        let finding = crate::test_support::sample_finding("f1", SeverityLevel::Critical, Some(79));
        let mut state = state();
        state.findings = vec![finding];
        run_validation(Some(SeverityLevel::High), &[79], &[], &mut state);
        assert!(state.findings[0].metadata.tags.is_empty());
    }

    #[tokio::test]
    async fn initialize_fails_fast_on_unregistered_tool() {
        let ctx = ctx();
        let state = state();
        let outcome = run_initialize(&state, &ctx);
        assert!(matches!(outcome, NodeOutcome::Failed(EngineError::ToolNotRegistered(_))));
    }

    #[tokio::test]
    async fn initialize_succeeds_once_every_tool_is_registered() {
        let ctx = ctx();
        ctx.registry.register(Arc::new(crate::test_support::FakeAdapter::new("semgrep", 0))).unwrap();
        let state = state();
        assert!(matches!(run_initialize(&state, &ctx), NodeOutcome::Succeeded));
    }

    #[tokio::test]
    async fn human_review_pauses_without_an_annotation_and_succeeds_with_one() {
        let ctx = ctx();
        let log = crate::events::InMemoryEventLog::new();
        let emitter = EventEmitter { sink: &log };
        let cancellation = CancellationToken::new();
        let mut seq = 0;
        let mut state = state();

        let outcome = run_node(&NodeKind::HumanReview, &mut state, &ctx, &cancellation, &emitter, &mut seq).await;
        assert!(matches!(outcome, NodeOutcome::Paused));

        state.context.insert(HUMAN_REVIEW_ANNOTATION_KEY.to_string(), "approved".to_string());
        let outcome = run_node(&NodeKind::HumanReview, &mut state, &ctx, &cancellation, &emitter, &mut seq).await;
        assert!(matches!(outcome, NodeOutcome::Succeeded));
    }
}
