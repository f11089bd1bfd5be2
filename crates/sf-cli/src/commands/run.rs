//! `scanforge run`: build a scenario plan, create the workflow's seq=0
//! checkpoint, and drive it to a terminal phase or a `human_review` pause.

use std::str::FromStr;

use chrono::Utc;
use serde::Serialize;

use sf_core::types::{ToolId, WorkflowId};
use sf_core::ExitCode;
use sf_engine::WorkflowOptions;
use sf_schema::capability::TargetKind;
use sf_schema::request::Target;
use sf_schema::workflow::WorkflowState;
use sf_templates::{Scenario, ValidationPolicy};

use crate::args::Commands;
use crate::config::Config;
use crate::support::{build_engine, emit, map_engine_error};

#[derive(Serialize)]
struct RunSummary {
    workflow_id: String,
    phase: String,
    cursor: usize,
    plan_len: usize,
    finding_count: usize,
}

impl RunSummary {
    fn from_state(state: &WorkflowState) -> Self {
        Self {
            workflow_id: state.workflow_id.to_string(),
            phase: state.phase.to_string(),
            cursor: state.cursor,
            plan_len: state.plan.len(),
            finding_count: state.findings.len(),
        }
    }
}

fn infer_target_kind(target: &str, override_kind: &Option<String>) -> Result<TargetKind, ExitCode> {
    if let Some(kind) = override_kind {
        return TargetKind::from_str(&kind.to_uppercase()).map_err(|_| {
            tracing::error!(target_kind = %kind, "unrecognized --target-kind");
            ExitCode::CLI_ARGS
        });
    }
    if target.starts_with("http://") || target.starts_with("https://") {
        Ok(TargetKind::HttpUrl)
    } else {
        Ok(TargetKind::LocalPath)
    }
}

pub async fn execute(command: Commands, config: &Config) -> Result<(), ExitCode> {
    let Commands::Run {
        workflow_id,
        scenario,
        target,
        target_kind,
        branch,
        commit,
        digest,
        tools,
        required_cwes,
        excluded_cwes,
        timeout_secs,
        max_findings,
        network_allowed,
        project_name,
        triggered_by,
        json,
    } = command
    else {
        unreachable!("dispatch only routes Commands::Run here");
    };

    let scenario = Scenario::parse(&scenario).ok_or_else(|| {
        tracing::error!(scenario = %scenario, "unrecognized scenario");
        ExitCode::CLI_ARGS
    })?;

    let kind = infer_target_kind(&target, &target_kind)?;
    let target = Target {
        kind,
        location: target,
        branch,
        commit,
        digest,
    };

    let tool_ids: Vec<ToolId> = tools.into_iter().map(ToolId::new).collect();

    let severity_floor = config.severity_floor;
    let validation = ValidationPolicy {
        severity_floor,
        required_cwes,
        excluded_cwes,
    };

    let options = WorkflowOptions {
        severity_floor,
        timeout_secs,
        max_findings,
        network_allowed,
        project_name,
        triggered_by,
        ..WorkflowOptions::default()
    };

    let workflow_id = WorkflowId::new(
        workflow_id.unwrap_or_else(|| format!("{}-{}", scenario.name(), Utc::now().timestamp_millis())),
    );

    let engine = build_engine(config);
    let state = engine
        .create_workflow(workflow_id.clone(), scenario, target, tool_ids, validation, options)
        .await
        .map_err(map_engine_error)?;

    let finished = engine.run(state).await.map_err(map_engine_error)?;
    let summary = RunSummary::from_state(&finished);

    emit(&summary, json, |summary| {
        println!("workflow {} finished in phase {}", summary.workflow_id, summary.phase);
        println!("  {}/{} nodes, {} finding(s)", summary.cursor, summary.plan_len, summary.finding_count);
    });

    if finished.phase.is_terminal() && finished.phase != sf_schema::workflow::WorkflowPhase::Succeeded {
        return Err(ExitCode::EXECUTION_FAILED);
    }
    Ok(())
}
