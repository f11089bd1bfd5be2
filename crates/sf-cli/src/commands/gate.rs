//! `scanforge gate`: evaluate a workflow's latest checkpoint against a
//! findings policy, independent of whatever `validation` node the workflow's
//! own plan ran. Mirrors `sf_engine`'s node-level policy predicate (severity
//! floor, required/excluded CWEs) so a CI step can gate on different
//! thresholds than the workflow was built with, without re-running it.

use serde::Serialize;

use sf_checkpoint::CheckpointStore;
use sf_core::types::WorkflowId;
use sf_core::ExitCode;
use sf_schema::finding::UnifiedFinding;
use sf_schema::severity::SeverityLevel;

use crate::args::Commands;
use crate::config::Config;
use crate::support::{build_store, emit, map_checkpoint_error, parse_severity};

#[derive(Serialize)]
struct GateViolation {
    finding_id: String,
    file_path: String,
    severity: String,
    cwe_id: Option<u32>,
}

#[derive(Serialize)]
struct GateReport {
    workflow_id: String,
    conformant: bool,
    finding_count: usize,
    violations: Vec<GateViolation>,
}

fn violates(
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

pub async fn execute(command: Commands, config: &Config) -> Result<(), ExitCode> {
    let Commands::Gate { workflow_id, severity_floor, required_cwes, excluded_cwes, json } = command else {
        unreachable!("dispatch only routes Commands::Gate here");
    };

    let severity_floor = severity_floor.as_deref().map(parse_severity).transpose()?.or(config.severity_floor);

    let store = build_store(config);
    let id = WorkflowId::new(workflow_id);
    let state = store.get_checkpoint(&id, None).await.map_err(map_checkpoint_error)?;

    let violations: Vec<GateViolation> = state
        .findings
        .iter()
        .filter(|finding| violates(finding, severity_floor, &required_cwes, &excluded_cwes))
        .map(|finding| GateViolation {
            finding_id: finding.finding_id.as_str().to_string(),
            file_path: finding.location.file_path.clone(),
            severity: finding.severity.level.to_string(),
            cwe_id: finding.vulnerability_type.cwe_id,
        })
        .collect();

    let report = GateReport {
        workflow_id: state.workflow_id.to_string(),
        conformant: violations.is_empty(),
        finding_count: state.findings.len(),
        violations,
    };

    emit(&report, json, |report| {
        println!("workflow {}: {}", report.workflow_id, if report.conformant { "conforms" } else { "REJECTED" });
        for violation in &report.violations {
            println!("  {} {} ({}, cwe={:?})", violation.finding_id, violation.file_path, violation.severity, violation.cwe_id);
        }
    });

    if report.conformant {
        Ok(())
    } else {
        Err(ExitCode::GATE_REJECTED)
    }
}
