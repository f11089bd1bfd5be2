//! Turns one workflow's stored options plus a node's `tool_id` into a
//! `ScanRequest`/`ExecutionContext` pair. A `ScanRequest` is never persisted
//! on its own (per spec §3.5) — it's reconstructed here from the workflow's
//! checkpointed state on every attempt, including after a resume.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sf_adapter_api::{CancellationToken, ExecutionContext};
use sf_core::types::{ScanId, ToolId};
use sf_schema::capability::CapabilityDescriptor;
use sf_schema::request::{ScanContext, ScanLimits, ScanOptions, ScanRequest, ScanType, Target};
use sf_schema::severity::SeverityLevel;
use sf_schema::workflow::WorkflowState;

pub const OPTIONS_CONTEXT_KEY: &str = "scan_options";

/// Workflow-wide scan parameters, set once at creation and applied to every
/// scan node the plan runs. Stored JSON-encoded in
/// `WorkflowState.context["scan_options"]` so it survives checkpoint/resume
/// without widening `sf_schema::WorkflowState` itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOptions {
    pub language_hint: Option<String>,
    pub custom_rules: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub severity_floor: Option<SeverityLevel>,
    pub timeout_secs: u64,
    pub max_findings: Option<u32>,
    pub network_allowed: bool,
    pub project_name: String,
    pub triggered_by: String,
    pub scan_type: ScanTypeOption,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ScanTypeOption {
    Full,
    Incremental,
}

impl From<ScanTypeOption> for ScanType {
    fn from(value: ScanTypeOption) -> Self {
        match value {
            ScanTypeOption::Full => ScanType::Full,
            ScanTypeOption::Incremental => ScanType::Incremental,
        }
    }
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            language_hint: None,
            custom_rules: Vec::new(),
            exclude_paths: Vec::new(),
            severity_floor: None,
            timeout_secs: 300,
            max_findings: None,
            network_allowed: false,
            project_name: String::new(),
            triggered_by: "unknown".into(),
            scan_type: ScanTypeOption::Full,
        }
    }
}

impl WorkflowOptions {
    #[must_use]
    pub fn to_context_value(&self) -> String {
        serde_json::to_string(self).expect("WorkflowOptions always serializes")
    }

    pub fn from_context_value(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    #[must_use]
    pub fn from_state(state: &WorkflowState) -> Self {
        state
            .context
            .get(OPTIONS_CONTEXT_KEY)
            .and_then(|raw| Self::from_context_value(raw).ok())
            .unwrap_or_default()
    }
}

/// Build the `ScanRequest` one adapter run for `tool_id` uses at `state.cursor`.
/// `scan_id` is derived from `(workflow_id, tool_id, cursor)` so re-running
/// the same node on resume reproduces the same scan identity.
#[must_use]
pub fn build_scan_request(state: &WorkflowState, tool_id: &ToolId) -> ScanRequest {
    let options = WorkflowOptions::from_state(state);
    ScanRequest {
        scan_id: ScanId::new(format!("{}-{}-{}", state.workflow_id, tool_id, state.cursor)),
        target: state.target.clone(),
        options: ScanOptions {
            language_hint: options.language_hint.clone(),
            custom_rules: options.custom_rules.clone(),
            exclude_paths: options.exclude_paths.clone(),
            severity_floor: options.severity_floor,
        },
        context: ScanContext {
            workflow_id: Some(state.workflow_id.clone()),
            project_name: options.project_name.clone(),
            scan_type: options.scan_type.into(),
            triggered_by: options.triggered_by.clone(),
        },
        limits: ScanLimits {
            timeout_secs: options.timeout_secs,
            max_findings: options.max_findings,
        },
        network_allowed: options.network_allowed,
    }
}

/// `deadline = min(node budget, adapter descriptor timeout, request's limit)`,
/// per spec §5.
#[must_use]
pub fn build_execution_context(
    request: &ScanRequest,
    descriptor: &CapabilityDescriptor,
    node_budget: Duration,
    cancellation: CancellationToken,
) -> ExecutionContext {
    let descriptor_timeout = Duration::from_secs(descriptor.execution.default_timeout_secs);
    let request_timeout = Duration::from_secs(request.limits.timeout_secs);
    let timeout = node_budget.min(descriptor_timeout).min(request_timeout);

    ExecutionContext::new(
        PathBuf::from(&request.target.location),
        timeout,
        request.network_allowed,
        cancellation,
    )
}

#[must_use]
pub fn local_target(path: impl Into<String>) -> Target {
    Target::local_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_core::types::WorkflowId;
    use sf_schema::workflow::{NodeKind, NodeSpec};
    use std::collections::BTreeMap;

    fn state_with_options(options: &WorkflowOptions) -> WorkflowState {
        let mut state = WorkflowState::new(
            WorkflowId::new("wf-1"),
            "code_commit",
            Target::local_path("/tmp/project"),
            vec![ToolId::new("semgrep")],
            vec![NodeSpec { kind: NodeKind::Initialize }],
        );
        let mut context = BTreeMap::new();
        context.insert(OPTIONS_CONTEXT_KEY.to_string(), options.to_context_value());
        state.context = context;
        state
    }

    #[test]
    fn scan_id_is_derived_from_workflow_tool_and_cursor() {
        let state = state_with_options(&WorkflowOptions::default());
        let request = build_scan_request(&state, &ToolId::new("semgrep"));
        assert_eq!(request.scan_id.as_str(), "wf-1-semgrep-0");
    }

    #[test]
    fn options_round_trip_through_state_context() {
        let mut options = WorkflowOptions::default();
        options.timeout_secs = 42;
        options.network_allowed = true;
        options.project_name = "demo".into();
        let state = state_with_options(&options);
        let request = build_scan_request(&state, &ToolId::new("trivy"));
        assert_eq!(request.limits.timeout_secs, 42);
        assert!(request.network_allowed);
        assert_eq!(request.context.project_name, "demo");
    }

    #[test]
    fn missing_options_fall_back_to_defaults() {
        let state = WorkflowState::new(
            WorkflowId::new("wf-2"),
            "code_commit",
            Target::local_path("/tmp"),
            vec![],
            vec![],
        );
        let request = build_scan_request(&state, &ToolId::new("semgrep"));
        assert_eq!(request.limits.timeout_secs, 300);
        assert!(!request.network_allowed);
    }

    #[test]
    fn execution_deadline_is_the_tightest_of_the_three_budgets() {
        let state = state_with_options(&WorkflowOptions {
            timeout_secs: 600,
            ..WorkflowOptions::default()
        });
        let request = build_scan_request(&state, &ToolId::new("semgrep"));
        let descriptor = crate::test_support::sample_descriptor("semgrep", 120);
        let ctx = build_execution_context(&request, &descriptor, Duration::from_secs(50), CancellationToken::new());
        assert_eq!(ctx.timeout, Duration::from_secs(50));
    }
}
