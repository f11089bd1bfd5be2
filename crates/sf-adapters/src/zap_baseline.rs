//! OWASP ZAP baseline scan adapter (DAST).

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
pub struct ZapBaselineAdapter;

impl ZapBaselineAdapter {
    // zap-baseline.py's `riskcode` is a string "0".."3"; `riskdesc` carries
    // the human label ("High (Medium)") that also folds in confidence.
    fn native_token_from_riskcode(riskcode: &str) -> &'static str {
        match riskcode {
            "3" => "high",
            "2" => "medium",
            "1" => "low",
            _ => "info",
        }
    }
}

#[async_trait]
impl Adapter for ZapBaselineAdapter {
    fn describe(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            tool_id: ToolId::new("zap-baseline"),
            tool_name: "OWASP ZAP Baseline".into(),
            tool_version: "2.x".into(),
            category: Category::Dast,
            vendor: "OWASP".into(),
            description: "Passive dynamic scan of a running HTTP target".into(),
            supported_languages: BTreeSet::new(),
            detection_types: BTreeSet::from(["dast".to_string()]),
            cwe_coverage: BTreeSet::from([79, 89, 200, 352, 311]),
            input_requirements: InputRequirements {
                requires_source: false,
                requires_binary: false,
                requires_running_app: true,
                requires_manifest: false,
                supported_vcs: BTreeSet::new(),
                accepted_target_kinds: BTreeSet::from([TargetKind::HttpUrl]),
            },
            output_schema: OutputSchema {
                native_format: "zap-json".into(),
                expected_fields: vec!["site".into()],
            },
            execution: ExecutionProfile {
                default_timeout_secs: 900,
                min_memory_mb: 1024,
                min_cpu_cores: 1,
                requires_network: true,
            },
            metadata: CapabilityMetadata {
                license: "Apache-2.0".into(),
                docs_url: Some("https://www.zaproxy.org/docs/docker/baseline-scan/".into()),
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
        let binary = find_binary("zap-baseline.py")?;
        let report_path = ctx.working_dir.join("zap-report.json");
        let cmd = CommandSpec::new(binary)
            .arg("-t")
            .arg(request.target.location.as_str())
            .arg("-J")
            .arg(report_path.as_os_str())
            .cwd(ctx.working_dir.clone());

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
        // zap-baseline.py exits 1 on WARN, 2 on FAIL thresholds; both still
        // produce a usable report.
        if !matches!(output.exit_code, Some(0) | Some(1) | Some(2)) {
            return Err(AdapterError::ExecutionFailed {
                exit_code: output.exit_code,
                stderr_tail: tail(&output.stderr_string()),
            });
        }

        let report_bytes = std::fs::read(&report_path)
            .map_err(|e| AdapterError::ParseError(format!("reading zap report: {e}")))?;
        let payload: Value = serde_json::from_slice(&report_bytes)
            .map_err(|e| AdapterError::ParseError(format!("invalid zap json: {e}")))?;

        Ok(NativeOutput::json(
            payload,
            String::from_utf8_lossy(&report_bytes).to_string(),
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
        let sites = native_output
            .payload
            .get("site")
            .and_then(Value::as_array)
            .ok_or_else(|| AdapterError::ParseError("missing `site` array".into()))?;

        let mut findings = Vec::new();
        for site in sites {
            let site_name = site.get("@name").and_then(Value::as_str).unwrap_or("").to_string();
            let Some(alerts) = site.get("alerts").and_then(Value::as_array) else {
                continue;
            };
            for alert in alerts {
                let rule_id = alert.get("pluginid").and_then(Value::as_str).unwrap_or("unknown");
                let name = alert.get("alert").and_then(Value::as_str).unwrap_or(rule_id);
                let desc = alert.get("desc").and_then(Value::as_str).unwrap_or("");
                let solution = alert.get("solution").and_then(Value::as_str).unwrap_or("");
                let riskcode = alert.get("riskcode").and_then(Value::as_str).unwrap_or("1");
                let native_severity = Self::native_token_from_riskcode(riskcode).to_string();
                let normalized = normalize_severity(&native_severity);
                let cwe_id = alert
                    .get("cweid")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<u32>().ok())
                    .filter(|id| *id > 0);
                let references = alert
                    .get("reference")
                    .and_then(Value::as_str)
                    .map(|r| r.lines().map(String::from).collect())
                    .unwrap_or_default();

                let Some(instances) = alert.get("instances").and_then(Value::as_array) else {
                    continue;
                };
                for instance in instances {
                    let uri = instance.get("uri").and_then(Value::as_str).unwrap_or(&site_name);
                    let evidence = instance.get("evidence").and_then(Value::as_str);

                    let finding_id = derive_finding_id("zap-baseline", rule_id, uri, 0, evidence);

                    findings.push(UnifiedFinding {
                        finding_id,
                        scan_session_id: request.scan_id.clone(),
                        vulnerability_type: VulnerabilityType {
                            name: name.to_string(),
                            cwe_id,
                            owasp_category: None,
                        },
                        location: Location {
                            file_path: uri.to_string(),
                            function_name: None,
                            class_name: None,
                            line_start: 0,
                            line_end: None,
                            column_start: None,
                            column_end: None,
                            code_snippet: evidence.map(String::from),
                        },
                        severity: Severity {
                            level: normalized.level,
                            cvss: None,
                            exploitability: Exploitability::Unknown,
                        },
                        confidence: Confidence::new(70, "zap passive rule match"),
                        source_tool: vec![SourceToolRef {
                            tool_id: "zap-baseline".into(),
                            rule_id: rule_id.to_string(),
                            native_severity: native_severity.clone(),
                            raw_output: alert.clone(),
                        }],
                        description: Description {
                            summary: name.to_string(),
                            detail: desc.to_string(),
                            impact: String::new(),
                            remediation: solution.to_string(),
                        },
                        metadata: {
                            let mut m = metadata_now(None, std::iter::empty());
                            m.references = references.clone();
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

#[cfg(test)]
mod tests {
    use super::*;
    use sf_core::types::ScanId;
    use sf_schema::request::{ScanContext, ScanLimits, ScanOptions, ScanType, Target};

    fn request() -> ScanRequest {
        ScanRequest {
            scan_id: ScanId::new("scan-1"),
            target: Target {
                kind: TargetKind::HttpUrl,
                location: "https://staging.example.com".into(),
                branch: None,
                commit: None,
                digest: None,
            },
            options: ScanOptions::default(),
            context: ScanContext {
                workflow_id: None,
                project_name: "proj".into(),
                scan_type: ScanType::Full,
                triggered_by: "test".into(),
            },
            limits: ScanLimits::default(),
            network_allowed: true,
        }
    }

    #[test]
    fn parses_one_finding_per_alert_instance() {
        let payload = serde_json::json!({
            "site": [{
                "@name": "https://staging.example.com",
                "alerts": [{
                    "pluginid": "10038",
                    "alert": "Content Security Policy header not set",
                    "desc": "missing CSP header",
                    "solution": "set a CSP header",
                    "riskcode": "2",
                    "cweid": "693",
                    "reference": "https://example.com/csp\nhttps://example.com/csp2",
                    "instances": [
                        {"uri": "https://staging.example.com/", "evidence": ""},
                        {"uri": "https://staging.example.com/login", "evidence": ""}
                    ]
                }]
            }]
        });
        let output = NativeOutput::json(payload, "raw".into(), ExecutionDiagnostics::default());
        let adapter = ZapBaselineAdapter;
        let findings = adapter.parse(&output, &request()).unwrap();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].vulnerability_type.cwe_id, Some(693));
        assert_eq!(findings[0].severity.level, sf_schema::SeverityLevel::Medium);
    }
}
