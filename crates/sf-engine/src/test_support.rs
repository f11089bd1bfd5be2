//! Shared fixtures for this crate's unit tests only.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use sf_adapter_api::{Adapter, AdapterError, ExecutionContext, NativeOutput, ValidationError};
use sf_core::types::{CvssScore, FindingId, ScanId, ToolId};
use sf_schema::capability::{Category, ExecutionProfile, InputRequirements, OutputSchema, TargetKind};
use sf_schema::finding::{Confidence, Description, FindingMetadata, Location, Severity, SourceToolRef, UnifiedFinding, VerificationStatus, VulnerabilityType};
use sf_schema::request::ScanRequest;
use sf_schema::severity::{Exploitability, SeverityLevel};

pub fn sample_descriptor(tool_id: &str, default_timeout_secs: u64) -> sf_schema::capability::CapabilityDescriptor {
    sf_schema::capability::CapabilityDescriptor {
        tool_id: ToolId::new(tool_id),
        tool_name: tool_id.to_string(),
        tool_version: "0.0.0".into(),
        category: Category::Sast,
        vendor: "test".into(),
        description: "test fixture adapter".into(),
        supported_languages: BTreeSet::new(),
        detection_types: BTreeSet::new(),
        cwe_coverage: BTreeSet::new(),
        input_requirements: InputRequirements {
            requires_source: true,
            requires_binary: false,
            requires_running_app: false,
            requires_manifest: false,
            supported_vcs: BTreeSet::new(),
            accepted_target_kinds: BTreeSet::from([TargetKind::LocalPath]),
        },
        output_schema: OutputSchema {
            native_format: "text".into(),
            expected_fields: vec![],
        },
        execution: ExecutionProfile {
            default_timeout_secs,
            min_memory_mb: 1,
            min_cpu_cores: 1,
            requires_network: false,
        },
        metadata: sf_schema::capability::CapabilityMetadata {
            license: "MIT".into(),
            docs_url: None,
            adapter_version: "1".into(),
            registered_at: Utc::now(),
        },
    }
}

pub fn sample_finding(id: &str, level: SeverityLevel, cwe_id: Option<u32>) -> UnifiedFinding {
    UnifiedFinding {
        finding_id: FindingId::new(id),
        scan_session_id: ScanId::new("scan-1"),
        vulnerability_type: VulnerabilityType {
            name: "test vulnerability".into(),
            cwe_id,
            owasp_category: None,
        },
        location: Location {
            file_path: "app/db.py".into(),
            function_name: None,
            class_name: None,
            line_start: 1,
            line_end: None,
            column_start: None,
            column_end: None,
            code_snippet: None,
        },
        severity: Severity {
            level,
            cvss: CvssScore::new(5.0).ok(),
            exploitability: Exploitability::Unknown,
        },
        confidence: Confidence::new(80, "fixture"),
        source_tool: vec![SourceToolRef {
            tool_id: "semgrep".into(),
            rule_id: "rule.test".into(),
            native_severity: level.to_string(),
            raw_output: serde_json::Value::Null,
        }],
        description: Description::default(),
        metadata: FindingMetadata {
            detected_at: Utc::now(),
            language: None,
            tags: BTreeSet::new(),
            references: Vec::new(),
        },
        verification_status: VerificationStatus::Pending,
    }
}

/// A scan adapter that never touches a subprocess: `execute` returns
/// immediately and `parse` hands back a fixed finding count, each with a
/// distinct id so callers can tell invocations apart. Stands in for the
/// real tool adapters in engine-level tests that exercise the run loop
/// rather than any one tool's native output format.
pub struct FakeAdapter {
    tool_id: ToolId,
    finding_count: usize,
    calls: AtomicUsize,
}

impl FakeAdapter {
    #[must_use]
    pub fn new(tool_id: &str, finding_count: usize) -> Self {
        Self {
            tool_id: ToolId::new(tool_id),
            finding_count,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Adapter for FakeAdapter {
    fn describe(&self) -> sf_schema::capability::CapabilityDescriptor {
        sample_descriptor(self.tool_id.as_str(), 60)
    }

    fn validate(&self, _request: &ScanRequest) -> Result<(), ValidationError> {
        Ok(())
    }

    async fn execute(&self, _request: &ScanRequest, _ctx: &ExecutionContext) -> Result<NativeOutput, AdapterError> {
        Ok(NativeOutput::text("ok".into(), sf_adapter_api::ExecutionDiagnostics::default()))
    }

    fn parse(&self, _native_output: &NativeOutput, request: &ScanRequest) -> Result<Vec<UnifiedFinding>, AdapterError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..self.finding_count)
            .map(|n| {
                let mut finding = sample_finding(
                    &format!("{}-{}-{call}-{n}", self.tool_id.as_str(), request.scan_id.as_str()),
                    SeverityLevel::Medium,
                    None,
                );
                finding.source_tool[0].tool_id = self.tool_id.as_str().to_string();
                finding
            })
            .collect())
    }
}
