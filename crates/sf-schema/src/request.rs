//! Scan Request.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use sf_core::types::{ScanId, WorkflowId};

use crate::capability::TargetKind;
use crate::severity::SeverityLevel;

/// What to scan: a kind plus a locator, and the VCS coordinates needed to
/// reproduce the exact state that was scanned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub kind: TargetKind,
    pub location: String,
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub digest: Option<String>,
}

impl Target {
    #[must_use]
    pub fn local_path(path: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::LocalPath,
            location: path.into(),
            branch: None,
            commit: None,
            digest: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanOptions {
    pub language_hint: Option<String>,
    pub custom_rules: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub severity_floor: Option<SeverityLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ScanType {
    Full,
    Incremental,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanContext {
    pub workflow_id: Option<WorkflowId>,
    pub project_name: String,
    pub scan_type: ScanType,
    pub triggered_by: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScanLimits {
    pub timeout_secs: u64,
    pub max_findings: Option<u32>,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            max_findings: None,
        }
    }
}

/// A request to run exactly one adapter against one target. Owned by the
/// engine for the lifetime of a single task; never persisted
/// on its own — it's reconstructed from the workflow's plan on each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub scan_id: ScanId,
    pub target: Target,
    pub options: ScanOptions,
    pub context: ScanContext,
    pub limits: ScanLimits,
    pub network_allowed: bool,
}
