//! osv-scanner adapter (SCA via the OSV advisory database).

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
pub struct OsvScannerAdapter;

#[async_trait]
impl Adapter for OsvScannerAdapter {
    fn describe(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            tool_id: ToolId::new("osv-scanner"),
            tool_name: "OSV-Scanner".into(),
            tool_version: "1.x".into(),
            category: Category::Sca,
            vendor: "OSV / Google".into(),
            description: "Dependency vulnerability scanning against the OSV advisory database".into(),
            supported_languages: BTreeSet::from(
                ["go", "python", "javascript", "rust", "java", "ruby", "php"].map(String::from),
            ),
            detection_types: BTreeSet::from(["sca".to_string()]),
            cwe_coverage: BTreeSet::new(),
            input_requirements: InputRequirements {
                requires_source: false,
                requires_binary: false,
                requires_running_app: false,
                requires_manifest: true,
                supported_vcs: BTreeSet::from(["git".to_string()]),
                accepted_target_kinds: BTreeSet::from([TargetKind::LocalPath, TargetKind::GitRepo]),
            },
            output_schema: OutputSchema {
                native_format: "osv-json".into(),
                expected_fields: vec!["results".into()],
            },
            execution: ExecutionProfile {
                default_timeout_secs: 300,
                min_memory_mb: 256,
                min_cpu_cores: 1,
                requires_network: true,
            },
            metadata: CapabilityMetadata {
                license: "Apache-2.0".into(),
                docs_url: Some("https://osv.dev/".into()),
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
        let binary = find_binary("osv-scanner")?;
        let cmd = CommandSpec::new(binary)
            .arg("--format")
            .arg("json")
            .arg("--recursive")
            .cwd(ctx.working_dir.clone())
            .arg(request.target.location.as_str());

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
        // osv-scanner exits 1 when vulnerabilities were found.
        if !matches!(output.exit_code, Some(0) | Some(1)) {
            return Err(AdapterError::ExecutionFailed {
                exit_code: output.exit_code,
                stderr_tail: tail(&output.stderr_string()),
            });
        }

        let payload: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| AdapterError::ParseError(format!("invalid osv-scanner json: {e}")))?;

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
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| AdapterError::ParseError("missing `results` array".into()))?;

        let mut findings = Vec::new();
        for result in results {
            let source_path = result
                .pointer("/source/path")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let Some(packages) = result.get("packages").and_then(Value::as_array) else {
                continue;
            };
            for package in packages {
                let pkg_name = package.pointer("/package/name").and_then(Value::as_str).unwrap_or("");
                let pkg_version = package.pointer("/package/version").and_then(Value::as_str).unwrap_or("");
                let Some(vulnerabilities) = package.get("vulnerabilities").and_then(Value::as_array) else {
                    continue;
                };
                for vuln in vulnerabilities {
                    let vuln_id = vuln.get("id").and_then(Value::as_str).unwrap_or("unknown");
                    let summary = vuln.get("summary").and_then(Value::as_str).unwrap_or(vuln_id);
                    let details = vuln.get("details").and_then(Value::as_str).unwrap_or("");
                    let native_severity = vuln
                        .get("database_specific")
                        .and_then(|v| v.get("severity"))
                        .and_then(Value::as_str)
                        .unwrap_or("MEDIUM")
                        .to_string();
                    let normalized = normalize_severity(&native_severity);
                    let references = vuln
                        .get("references")
                        .and_then(Value::as_array)
                        .map(|arr| {
                            arr.iter()
                                .filter_map(|r| r.get("url").and_then(Value::as_str))
                                .map(String::from)
                                .collect()
                        })
                        .unwrap_or_default();

                    let location_snippet = format!("{pkg_name}@{pkg_version}");
                    let finding_id = derive_finding_id(
                        "osv-scanner",
                        vuln_id,
                        &source_path,
                        0,
                        Some(location_snippet.as_str()),
                    );

                    findings.push(UnifiedFinding {
                        finding_id,
                        scan_session_id: request.scan_id.clone(),
                        vulnerability_type: VulnerabilityType {
                            name: vuln_id.to_string(),
                            cwe_id: sf_schema::extract_cwe(details),
                            owasp_category: None,
                        },
                        location: Location {
                            file_path: source_path.clone(),
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
                            cvss: None,
                            exploitability: Exploitability::Unknown,
                        },
                        confidence: Confidence::new(90, "osv advisory database match"),
                        source_tool: vec![SourceToolRef {
                            tool_id: "osv-scanner".into(),
                            rule_id: vuln_id.to_string(),
                            native_severity,
                            raw_output: vuln.clone(),
                        }],
                        description: Description {
                            summary: summary.to_string(),
                            detail: details.to_string(),
                            impact: String::new(),
                            remediation: String::new(),
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
        }

        Ok(apply_max_findings(findings, request.limits.max_findings))
    }
}

fn tail(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(20)..].join("\n")
}
