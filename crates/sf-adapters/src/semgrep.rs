//! Semgrep adapter (SAST).

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
use sf_schema::severity::normalize_severity;

use crate::common::{apply_max_findings, command_hash, find_binary, metadata_now, validate_network, validate_target_kind};

#[derive(Default)]
pub struct SemgrepAdapter;

impl SemgrepAdapter {
    fn native_severity_token(extra: &Value) -> &str {
        extra.get("severity").and_then(Value::as_str).unwrap_or("INFO")
    }

    fn canonical_token(native: &str) -> &'static str {
        match native {
            "ERROR" => "high",
            "WARNING" => "medium",
            _ => "info",
        }
    }
}

#[async_trait]
impl Adapter for SemgrepAdapter {
    fn describe(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            tool_id: ToolId::new("semgrep"),
            tool_name: "Semgrep".into(),
            tool_version: "1.x".into(),
            category: Category::Sast,
            vendor: "Semgrep Inc.".into(),
            description: "Static analysis via pattern-based rules across many languages".into(),
            supported_languages: BTreeSet::from(
                ["python", "javascript", "typescript", "go", "java", "ruby", "c", "rust"]
                    .map(String::from),
            ),
            detection_types: BTreeSet::from(["sast".to_string()]),
            cwe_coverage: BTreeSet::from([79, 89, 22, 78, 94, 502, 611, 798]),
            input_requirements: InputRequirements {
                requires_source: true,
                requires_binary: false,
                requires_running_app: false,
                requires_manifest: false,
                supported_vcs: BTreeSet::from(["git".to_string()]),
                accepted_target_kinds: BTreeSet::from([TargetKind::LocalPath, TargetKind::GitRepo]),
            },
            output_schema: OutputSchema {
                native_format: "semgrep-json".into(),
                expected_fields: vec!["results".into()],
            },
            execution: ExecutionProfile {
                default_timeout_secs: 300,
                min_memory_mb: 512,
                min_cpu_cores: 1,
                requires_network: false,
            },
            metadata: CapabilityMetadata {
                license: "LGPL-2.1-only".into(),
                docs_url: Some("https://semgrep.dev/docs/".into()),
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
        let binary = find_binary("semgrep")?;
        let mut cmd = CommandSpec::new(binary)
            .arg("--json")
            .arg("--quiet")
            .arg("--disable-version-check");

        if request.options.custom_rules.is_empty() {
            cmd = cmd.arg("--config").arg("auto");
        } else {
            for rule in &request.options.custom_rules {
                cmd = cmd.arg("--config").arg(rule.as_str());
            }
        }
        for excluded in &request.options.exclude_paths {
            cmd = cmd.arg("--exclude").arg(excluded.as_str());
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
            let partial = serde_json::from_slice::<Value>(&output.stdout)
                .ok()
                .map(|payload| {
                    NativeOutput::json(payload, output.stdout_string(), ExecutionDiagnostics {
                        command_hash: Some(hash.clone()),
                        duration,
                        exit_code: None,
                        stderr_tail: tail(&output.stderr_string()),
                    })
                    .partial()
                });
            return Err(AdapterError::Timeout { partial });
        }

        // semgrep exits 1 when findings were detected; only other non-zero
        // codes indicate a real execution failure.
        if !matches!(output.exit_code, Some(0) | Some(1)) {
            return Err(AdapterError::ExecutionFailed {
                exit_code: output.exit_code,
                stderr_tail: tail(&output.stderr_string()),
            });
        }

        let payload: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| AdapterError::ParseError(format!("invalid semgrep json: {e}")))?;

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

        let mut findings = Vec::with_capacity(results.len());
        for result in results {
            let rule_id = result.get("check_id").and_then(Value::as_str).unwrap_or("unknown");
            let file_path = result.get("path").and_then(Value::as_str).unwrap_or("");
            let line_start = result
                .pointer("/start/line")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32;
            let line_end = result.pointer("/end/line").and_then(Value::as_u64).map(|v| v as u32);
            let column_start = result.pointer("/start/col").and_then(Value::as_u64).map(|v| v as u32);
            let column_end = result.pointer("/end/col").and_then(Value::as_u64).map(|v| v as u32);
            let extra = result.get("extra").cloned().unwrap_or(Value::Null);
            let code_snippet = extra.get("lines").and_then(Value::as_str).map(String::from);
            let message = extra.get("message").and_then(Value::as_str).unwrap_or("").to_string();

            let native_severity = Self::native_severity_token(&extra).to_string();
            let normalized = normalize_severity(Self::canonical_token(&native_severity));

            let metadata = extra.get("metadata").cloned().unwrap_or(Value::Null);
            let cwe_text = metadata
                .get("cwe")
                .and_then(Value::as_array)
                .and_then(|arr| arr.first())
                .and_then(Value::as_str)
                .unwrap_or("");
            let cwe_id = sf_schema::extract_cwe(cwe_text);
            let owasp_category = metadata
                .get("owasp")
                .and_then(Value::as_array)
                .and_then(|arr| arr.first())
                .and_then(Value::as_str)
                .map(String::from);
            let references = metadata
                .get("references")
                .and_then(Value::as_array)
                .map(|arr| arr.iter().filter_map(Value::as_str).map(String::from).collect())
                .unwrap_or_default();
            let confidence_score: u8 = match metadata.get("confidence").and_then(Value::as_str) {
                Some("HIGH") => 90,
                Some("MEDIUM") => 60,
                Some("LOW") => 30,
                _ => 50,
            };
            let language = metadata
                .get("technology")
                .and_then(Value::as_array)
                .and_then(|arr| arr.first())
                .and_then(Value::as_str)
                .map(String::from);

            let finding_id = derive_finding_id(
                "semgrep",
                rule_id,
                file_path,
                line_start,
                code_snippet.as_deref(),
            );

            let mut finding_metadata = metadata_now(language, native_output.partial.then(|| "partial".to_string()));
            finding_metadata.references = references;

            findings.push(UnifiedFinding {
                finding_id,
                scan_session_id: request.scan_id.clone(),
                vulnerability_type: VulnerabilityType {
                    name: rule_id.to_string(),
                    cwe_id,
                    owasp_category,
                },
                location: Location {
                    file_path: file_path.to_string(),
                    function_name: None,
                    class_name: None,
                    line_start,
                    line_end,
                    column_start,
                    column_end,
                    code_snippet,
                },
                severity: Severity {
                    level: normalized.level,
                    cvss: None,
                    exploitability: sf_schema::severity::Exploitability::Unknown,
                },
                confidence: Confidence::new(confidence_score, "semgrep metadata.confidence"),
                source_tool: vec![SourceToolRef {
                    tool_id: "semgrep".into(),
                    rule_id: rule_id.to_string(),
                    native_severity,
                    raw_output: result.clone(),
                }],
                description: Description {
                    summary: message.clone(),
                    detail: message,
                    impact: String::new(),
                    remediation: metadata
                        .get("fix")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .to_string(),
                },
                metadata: finding_metadata,
                verification_status: VerificationStatus::Pending,
            });
        }

        Ok(apply_max_findings(findings, request.limits.max_findings))
    }
}

fn tail(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(20)..].join("\n")
}
