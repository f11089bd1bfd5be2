//! Trivy adapter (SCA + container image scanning).

use std::collections::BTreeSet;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use sf_adapter_api::{Adapter, AdapterError, ExecutionContext, NativeOutput, ValidationError};
use sf_adapter_api::context::ExecutionDiagnostics;
use sf_core::types::ToolId;
use sf_runner::{AsyncProcessRunner, CommandSpec, TokioProcessRunner};
use sf_schema::capability::{
    CapabilityDescriptor, CapabilityMetadata, Category, ExecutionProfile, InputRequirements,
    OutputSchema, TargetKind,
};
use sf_schema::finding::{
    Confidence, Description, Location, Severity, SourceToolRef, UnifiedFinding, VerificationStatus,
    VulnerabilityType, derive_finding_id,
};
use sf_schema::request::ScanRequest;
use sf_schema::severity::{Exploitability, normalize_severity};

use crate::common::{apply_max_findings, command_hash, find_binary, metadata_now, validate_network, validate_target_kind};

#[derive(Default)]
pub struct TrivyAdapter;

impl TrivyAdapter {
    fn scan_subcommand(target_kind: TargetKind) -> &'static str {
        match target_kind {
            TargetKind::ContainerImage => "image",
            _ => "fs",
        }
    }
}

#[async_trait]
impl Adapter for TrivyAdapter {
    fn describe(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            tool_id: ToolId::new("trivy"),
            tool_name: "Trivy".into(),
            tool_version: "0.x".into(),
            category: Category::Sca,
            vendor: "Aqua Security".into(),
            description: "Dependency and container image vulnerability scanning".into(),
            supported_languages: BTreeSet::from(
                ["go", "python", "javascript", "java", "rust", "ruby"].map(String::from),
            ),
            detection_types: BTreeSet::from(["sca".to_string(), "container".to_string()]),
            cwe_coverage: BTreeSet::new(),
            input_requirements: InputRequirements {
                requires_source: false,
                requires_binary: false,
                requires_running_app: false,
                requires_manifest: true,
                supported_vcs: BTreeSet::from(["git".to_string()]),
                accepted_target_kinds: BTreeSet::from([
                    TargetKind::LocalPath,
                    TargetKind::GitRepo,
                    TargetKind::ContainerImage,
                ]),
            },
            output_schema: OutputSchema {
                native_format: "trivy-json".into(),
                expected_fields: vec!["Results".into()],
            },
            execution: ExecutionProfile {
                default_timeout_secs: 600,
                min_memory_mb: 512,
                min_cpu_cores: 1,
                requires_network: true,
            },
            metadata: CapabilityMetadata {
                license: "Apache-2.0".into(),
                docs_url: Some("https://aquasecurity.github.io/trivy/".into()),
                adapter_version: "1".into(),
                registered_at: chrono::Utc::now(),
            },
        }
    }

    fn validate(&self, request: &ScanRequest) -> Result<(), ValidationError> {
        let descriptor = self.describe();
        validate_target_kind(&descriptor, request)?;
        validate_network(&descriptor, request)?;
        Ok(())
    }

    async fn execute(
        &self,
        request: &ScanRequest,
        ctx: &ExecutionContext,
    ) -> Result<NativeOutput, AdapterError> {
        let binary = find_binary("trivy")?;
        let subcommand = Self::scan_subcommand(request.target.kind);
        let mut cmd = CommandSpec::new(binary)
            .arg(subcommand)
            .arg("--format")
            .arg("json")
            .arg("--quiet");

        if !ctx.network_allowed {
            cmd = cmd.arg("--skip-db-update").arg("--offline-scan");
        }
        for excluded in &request.options.exclude_paths {
            cmd = cmd.arg("--skip-dirs").arg(excluded.as_str());
        }
        cmd = cmd.cwd(ctx.working_dir.clone()).arg(request.target.location.as_str());

        let hash = command_hash(&cmd);
        let started = Instant::now();
        let output = TokioProcessRunner::default()
            .run(&cmd, ctx.timeout, &ctx.cancellation)
            .await
            .map_err(|e| AdapterError::ExecutionFailed {
                exit_code: None,
                stderr_tail: e.to_string(),
            })?;
        let duration = started.elapsed();

        if output.timed_out {
            return Err(AdapterError::Timeout { partial: None });
        }
        if output.exit_code != Some(0) {
            return Err(AdapterError::ExecutionFailed {
                exit_code: output.exit_code,
                stderr_tail: tail(&output.stderr_string()),
            });
        }

        let payload: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| AdapterError::ParseError(format!("invalid trivy json: {e}")))?;

        Ok(NativeOutput::json(
            payload,
            output.stdout_string(),
            ExecutionDiagnostics {
                command_hash: Some(hash),
                duration,
                exit_code: output.exit_code,
                stderr_tail: tail(&output.stderr_string()),
            },
        ))
    }

    fn parse(
        &self,
        native_output: &NativeOutput,
        request: &ScanRequest,
    ) -> Result<Vec<UnifiedFinding>, AdapterError> {
        let results = native_output
            .payload
            .get("Results")
            .and_then(Value::as_array)
            .ok_or_else(|| AdapterError::ParseError("missing `Results` array".into()))?;

        let mut findings = Vec::new();
        for result in results {
            let target_file = result.get("Target").and_then(Value::as_str).unwrap_or("").to_string();
            let Some(vulnerabilities) = result.get("Vulnerabilities").and_then(Value::as_array) else {
                continue;
            };
            for vuln in vulnerabilities {
                let vuln_id = vuln.get("VulnerabilityID").and_then(Value::as_str).unwrap_or("unknown");
                let pkg_name = vuln.get("PkgName").and_then(Value::as_str).unwrap_or("");
                let installed_version = vuln.get("InstalledVersion").and_then(Value::as_str).unwrap_or("");
                let fixed_version = vuln.get("FixedVersion").and_then(Value::as_str);
                let title = vuln.get("Title").and_then(Value::as_str).unwrap_or(vuln_id);
                let description = vuln.get("Description").and_then(Value::as_str).unwrap_or("");
                let native_severity = vuln.get("Severity").and_then(Value::as_str).unwrap_or("UNKNOWN").to_string();
                let normalized = normalize_severity(&native_severity);
                let cvss_score = vuln
                    .pointer("/CVSS/nvd/V3Score")
                    .or_else(|| vuln.pointer("/CVSS/redhat/V3Score"))
                    .and_then(Value::as_f64);
                let cvss = cvss_score.and_then(|v| sf_core::types::CvssScore::new(v as f32).ok());
                let references = vuln
                    .get("References")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(Value::as_str).map(String::from).collect())
                    .unwrap_or_default();
                let cwe_id = vuln
                    .get("CweIDs")
                    .and_then(Value::as_array)
                    .and_then(|arr| arr.first())
                    .and_then(Value::as_str)
                    .and_then(sf_schema::extract_cwe);

                let location_snippet = format!("{pkg_name}@{installed_version}");
                let finding_id = derive_finding_id(
                    "trivy",
                    vuln_id,
                    &target_file,
                    0,
                    Some(location_snippet.as_str()),
                );

                let remediation = match fixed_version {
                    Some(fixed) => format!("Upgrade {pkg_name} to {fixed}"),
                    None => "No fixed version published yet".to_string(),
                };

                findings.push(UnifiedFinding {
                    finding_id,
                    scan_session_id: request.scan_id.clone(),
                    vulnerability_type: VulnerabilityType {
                        name: vuln_id.to_string(),
                        cwe_id,
                        owasp_category: None,
                    },
                    location: Location {
                        file_path: target_file.clone(),
                        function_name: None,
                        class_name: None,
                        line_start: 0,
                        line_end: None,
                        column_start: None,
                        column_end: None,
                        code_snippet: Some(location_snippet),
                    },
                    severity: Severity {
                        level: normalized.level,
                        cvss,
                        exploitability: Exploitability::Unknown,
                    },
                    confidence: Confidence::new(95, "trivy advisory database match"),
                    source_tool: vec![SourceToolRef {
                        tool_id: "trivy".into(),
                        rule_id: vuln_id.to_string(),
                        native_severity,
                        raw_output: vuln.clone(),
                    }],
                    description: Description {
                        summary: title.to_string(),
                        detail: description.to_string(),
                        impact: String::new(),
                        remediation,
                    },
                    metadata: {
                        let mut m = metadata_now(None, std::iter::empty());
                        m.references = references;
                        m
                    },
                    verification_status: VerificationStatus::Pending,
                });
            }
        }

        Ok(apply_max_findings(findings, request.limits.max_findings))
    }
}

fn tail(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(20)..].join("\n")
}
