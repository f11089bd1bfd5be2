//! `scanforge resume`: re-enter a `PAUSED` workflow from its latest (or an
//! explicit) checkpoint, optionally attaching a `human_review` annotation.

use serde::Serialize;

use sf_core::types::WorkflowId;
use sf_core::ExitCode;
use sf_schema::workflow::{WorkflowPhase, WorkflowState};

use crate::args::Commands;
use crate::config::Config;
use crate::support::{build_engine, emit, map_engine_error};

#[derive(Serialize)]
struct ResumeSummary {
    workflow_id: String,
    phase: String,
    cursor: usize,
    plan_len: usize,
}

impl ResumeSummary {
    fn from_state(state: &WorkflowState) -> Self {
        Self {
            workflow_id: state.workflow_id.to_string(),
            phase: state.phase.to_string(),
            cursor: state.cursor,
            plan_len: state.plan.len(),
        }
    }
}

pub async fn execute(command: Commands, config: &Config) -> Result<(), ExitCode> {
    let Commands::Resume { workflow_id, checkpoint_seq, annotation, json } = command else {
        unreachable!("dispatch only routes Commands::Resume here");
    };

    let engine = build_engine(config);
    let workflow_id = WorkflowId::new(workflow_id);
    let finished = engine.resume(&workflow_id, checkpoint_seq, annotation).await.map_err(map_engine_error)?;
    let summary = ResumeSummary::from_state(&finished);

    emit(&summary, json, |summary| {
        println!("workflow {} resumed to phase {}", summary.workflow_id, summary.phase);
        println!("  {}/{} nodes", summary.cursor, summary.plan_len);
    });

    if finished.phase.is_terminal() && finished.phase != WorkflowPhase::Succeeded {
        return Err(ExitCode::EXECUTION_FAILED);
    }
    Ok(())
}
