//! Scenario templates: the four named plan shapes a workflow request can
//! select instead of specifying an explicit node list.

use sf_core::types::ToolId;
use sf_schema::severity::SeverityLevel;
use sf_schema::{NodeKind, NodeSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    CodeCommit,
    DependencyUpdate,
    EmergencyVuln,
    ReleaseRegression,
}

impl Scenario {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "code_commit" => Some(Self::CodeCommit),
            "dependency_update" => Some(Self::DependencyUpdate),
            "emergency_vuln" => Some(Self::EmergencyVuln),
            "release_regression" => Some(Self::ReleaseRegression),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CodeCommit => "code_commit",
            Self::DependencyUpdate => "dependency_update",
            Self::EmergencyVuln => "emergency_vuln",
            Self::ReleaseRegression => "release_regression",
        }
    }
}

/// The validation node's policy predicates. Left empty, a `validation` node
/// is a no-op pass-through.
#[derive(Debug, Clone, Default)]
pub struct ValidationPolicy {
    pub severity_floor: Option<SeverityLevel>,
    pub required_cwes: Vec<u32>,
    pub excluded_cwes: Vec<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("scenario {scenario} requires at least one tool id")]
    NoTools { scenario: &'static str },
    #[error("scenario {scenario} runs a single_scan node and takes exactly one tool id, got {got}")]
    WrongToolCount { scenario: &'static str, got: usize },
}

/// Build the ordered plan for `scenario`. `tool_ids` selects the adapters the
/// scan nodes run; `single_scan` scenarios require exactly one.
pub fn build_plan(
    scenario: Scenario,
    tool_ids: &[ToolId],
    validation: ValidationPolicy,
) -> Result<Vec<NodeSpec>, TemplateError> {
    if tool_ids.is_empty() {
        return Err(TemplateError::NoTools { scenario: scenario.name() });
    }

    let mut plan = vec![NodeSpec { kind: NodeKind::Initialize }];

    let single_scan_tool = |tool_ids: &[ToolId]| -> Result<ToolId, TemplateError> {
        if tool_ids.len() != 1 {
            return Err(TemplateError::WrongToolCount { scenario: scenario.name(), got: tool_ids.len() });
        }
        Ok(tool_ids[0].clone())
    };
    let validation_node = |validation: ValidationPolicy| NodeSpec {
        kind: NodeKind::Validation {
            severity_floor: validation.severity_floor,
            required_cwes: validation.required_cwes,
            excluded_cwes: validation.excluded_cwes,
        },
    };

    match scenario {
        Scenario::CodeCommit => {
            plan.push(NodeSpec { kind: NodeKind::SingleScan { tool_id: single_scan_tool(tool_ids)? } });
            plan.push(NodeSpec { kind: NodeKind::ResultCollection });
            plan.push(NodeSpec { kind: NodeKind::Finalize });
        }
        Scenario::DependencyUpdate => {
            plan.push(NodeSpec { kind: NodeKind::SingleScan { tool_id: single_scan_tool(tool_ids)? } });
            plan.push(validation_node(validation));
            plan.push(NodeSpec { kind: NodeKind::Finalize });
        }
        Scenario::EmergencyVuln => {
            plan.push(NodeSpec { kind: NodeKind::ParallelScan { tool_ids: tool_ids.to_vec() } });
            plan.push(NodeSpec { kind: NodeKind::ResultCollection });
            plan.push(validation_node(validation));
            plan.push(NodeSpec { kind: NodeKind::Finalize });
        }
        Scenario::ReleaseRegression => {
            plan.push(NodeSpec { kind: NodeKind::ParallelScan { tool_ids: tool_ids.to_vec() } });
            plan.push(NodeSpec { kind: NodeKind::ResultCollection });
            plan.push(validation_node(validation));
            plan.push(NodeSpec { kind: NodeKind::HumanReview });
            plan.push(NodeSpec { kind: NodeKind::Finalize });
        }
    }

    Ok(plan)
}

fn node_kind_name(kind: &NodeKind) -> &'static str {
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

/// The node-kind names of a plan, in order — used by tests and diagnostics
/// to compare a built plan against a scenario's fixed shape without
/// depending on `NodeKind`'s field contents.
#[must_use]
pub fn plan_shape(plan: &[NodeSpec]) -> Vec<&'static str> {
    plan.iter().map(|node| node_kind_name(&node.kind)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(id: &str) -> ToolId {
        ToolId::new(id)
    }

    #[test]
    fn code_commit_matches_its_fixed_shape() {
        let plan = build_plan(Scenario::CodeCommit, &[tool("semgrep")], ValidationPolicy::default()).unwrap();
        assert_eq!(plan_shape(&plan), vec!["initialize", "single_scan", "result_collection", "finalize"]);
    }

    #[test]
    fn dependency_update_matches_its_fixed_shape() {
        let plan = build_plan(Scenario::DependencyUpdate, &[tool("osv_scanner")], ValidationPolicy::default()).unwrap();
        assert_eq!(plan_shape(&plan), vec!["initialize", "single_scan", "validation", "finalize"]);
    }

    #[test]
    fn emergency_vuln_matches_its_fixed_shape() {
        let plan = build_plan(
            Scenario::EmergencyVuln,
            &[tool("semgrep"), tool("trivy")],
            ValidationPolicy::default(),
        )
        .unwrap();
        assert_eq!(
            plan_shape(&plan),
            vec!["initialize", "parallel_scan", "result_collection", "validation", "finalize"]
        );
    }

    #[test]
    fn release_regression_matches_its_fixed_shape() {
        let plan = build_plan(
            Scenario::ReleaseRegression,
            &[tool("semgrep"), tool("trivy")],
            ValidationPolicy::default(),
        )
        .unwrap();
        assert_eq!(
            plan_shape(&plan),
            vec!["initialize", "parallel_scan", "result_collection", "validation", "human_review", "finalize"]
        );
    }

    #[test]
    fn single_scan_scenarios_reject_more_than_one_tool() {
        let err = build_plan(Scenario::CodeCommit, &[tool("a"), tool("b")], ValidationPolicy::default()).unwrap_err();
        assert!(matches!(err, TemplateError::WrongToolCount { got: 2, .. }));
    }

    #[test]
    fn empty_tool_list_is_rejected_for_every_scenario() {
        for scenario in [
            Scenario::CodeCommit,
            Scenario::DependencyUpdate,
            Scenario::EmergencyVuln,
            Scenario::ReleaseRegression,
        ] {
            let err = build_plan(scenario, &[], ValidationPolicy::default()).unwrap_err();
            assert!(matches!(err, TemplateError::NoTools { .. }));
        }
    }

    #[test]
    fn scenario_name_round_trips_through_parse() {
        for scenario in [
            Scenario::CodeCommit,
            Scenario::DependencyUpdate,
            Scenario::EmergencyVuln,
            Scenario::ReleaseRegression,
        ] {
            assert_eq!(Scenario::parse(scenario.name()), Some(scenario));
        }
        assert_eq!(Scenario::parse("not_a_scenario"), None);
    }
}
