//! `scanforge status`: report one workflow's checkpointed state, every known
//! workflow's metadata, or the effective configuration with its sources.

use serde::Serialize;

use sf_checkpoint::CheckpointStore;
use sf_core::types::WorkflowId;
use sf_core::ExitCode;

use crate::args::Commands;
use crate::config::Config;
use crate::support::{build_store, emit, map_checkpoint_error};

#[derive(Serialize)]
struct WorkflowStatus {
    workflow_id: String,
    workflow_type: String,
    phase: String,
    cursor: usize,
    plan_len: usize,
    finding_count: usize,
    policy_violations: usize,
    updated_at: String,
}

#[derive(Serialize)]
struct WorkflowSummary {
    workflow_id: String,
    workflow_type: String,
    phase: String,
    updated_at: String,
}

#[derive(Serialize)]
struct ConfigField {
    key: String,
    value: String,
    source: String,
}

pub async fn execute(command: Commands, config: &Config) -> Result<(), ExitCode> {
    let Commands::Status { workflow_id, all, show_config, json } = command else {
        unreachable!("dispatch only routes Commands::Status here");
    };

    if show_config {
        let mut fields: Vec<ConfigField> = config
            .effective_config()
            .into_iter()
            .map(|(key, (value, source))| ConfigField { key, value, source: format!("{source:?}").to_lowercase() })
            .collect();
        fields.sort_by(|a, b| a.key.cmp(&b.key));
        emit(&fields, json, |fields| {
            for field in fields {
                println!("{:<28} {:<24} ({})", field.key, field.value, field.source);
            }
        });
        return Ok(());
    }

    let store = build_store(config);

    if all {
        let ids = store.list_workflows().await.map_err(map_checkpoint_error)?;
        let mut summaries = Vec::with_capacity(ids.len());
        for id in &ids {
            let metadata = store.get_workflow_metadata(id).await.map_err(map_checkpoint_error)?;
            summaries.push(WorkflowSummary {
                workflow_id: metadata.workflow_id.to_string(),
                workflow_type: metadata.workflow_type,
                phase: metadata.phase.to_string(),
                updated_at: metadata.updated_at.to_rfc3339(),
            });
        }
        emit(&summaries, json, |summaries| {
            for summary in summaries {
                println!("{}\t{}\t{}\t{}", summary.workflow_id, summary.workflow_type, summary.phase, summary.updated_at);
            }
        });
        return Ok(());
    }

    let workflow_id = workflow_id.ok_or_else(|| {
        tracing::error!("status requires either --workflow-id or --all");
        ExitCode::CLI_ARGS
    })?;
    let workflow_id = WorkflowId::new(workflow_id);
    let state = store.get_checkpoint(&workflow_id, None).await.map_err(map_checkpoint_error)?;

    let policy_violations = state.findings.iter().filter(|f| f.metadata.tags.contains("policy_violation")).count();
    let status = WorkflowStatus {
        workflow_id: state.workflow_id.to_string(),
        workflow_type: state.workflow_type,
        phase: state.phase.to_string(),
        cursor: state.cursor,
        plan_len: state.plan.len(),
        finding_count: state.findings.len(),
        policy_violations,
        updated_at: state.updated_at.to_rfc3339(),
    };

    emit(&status, json, |status| {
        println!("workflow {} ({})", status.workflow_id, status.workflow_type);
        println!("  phase:    {}", status.phase);
        println!("  progress: {}/{} nodes", status.cursor, status.plan_len);
        println!("  findings: {} ({} policy_violation)", status.finding_count, status.policy_violations);
        println!("  updated:  {}", status.updated_at);
    });
    Ok(())
}
