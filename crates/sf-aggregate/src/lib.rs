//! Cross-tool result collection: dedup findings that share a `finding_id`,
//! tag correlated-but-distinct findings, and report the merged set in a
//! fixed deterministic order.

pub mod dedup;
pub mod sort;

pub use dedup::{deduplicate, tag_correlated};
pub use sort::sort_findings;

use sf_schema::UnifiedFinding;

/// The full `result_collection` pipeline: dedup, correlate, sort.
/// Idempotent — running it again on its own output is a no-op beyond the
/// (already-satisfied) correlation tags.
#[must_use]
pub fn aggregate(findings: Vec<UnifiedFinding>) -> Vec<UnifiedFinding> {
    let mut findings = deduplicate(findings);
    tag_correlated(&mut findings);
    sort_findings(&mut findings);
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_core::types::{FindingId, ScanId};
    use sf_schema::finding::{Confidence, Description, FindingMetadata, Location, Severity, SourceToolRef, VerificationStatus, VulnerabilityType};
    use sf_schema::severity::{Exploitability, SeverityLevel};
    use std::collections::BTreeSet;

    fn finding(finding_id: &str, confidence: u8, tool_id: &str, file_path: &str, line_start: u32) -> UnifiedFinding {
        UnifiedFinding {
            finding_id: FindingId::new(finding_id),
            scan_session_id: ScanId::new("scan-1"),
            vulnerability_type: VulnerabilityType {
                name: "sql-injection".into(),
                cwe_id: Some(89),
                owasp_category: None,
            },
            location: Location {
                file_path: file_path.into(),
                line_start,
                ..Default::default()
            },
            severity: Severity {
                level: SeverityLevel::High,
                cvss: None,
                exploitability: Exploitability::Unknown,
            },
            confidence: Confidence::new(confidence, "test"),
            source_tool: vec![SourceToolRef {
                tool_id: tool_id.into(),
                rule_id: "r1".into(),
                native_severity: "high".into(),
                raw_output: serde_json::json!({"tool": tool_id}),
            }],
            description: Description::default(),
            metadata: FindingMetadata {
                detected_at: chrono::Utc::now(),
                language: None,
                tags: BTreeSet::new(),
                references: vec![],
            },
            verification_status: VerificationStatus::Pending,
        }
    }

    #[test]
    fn two_tools_reporting_the_same_sql_injection_collapse_into_one_finding() {
        let semgrep = finding("f1", 60, "semgrep", "app/db.py", 42);
        let codeql = finding("f1", 85, "codeql", "app/db.py", 42);
        let result = aggregate(vec![semgrep, codeql]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].confidence.score, 85);
        let tool_ids: BTreeSet<_> = result[0].source_tool.iter().map(|s| s.tool_id.clone()).collect();
        assert_eq!(tool_ids, BTreeSet::from(["semgrep".to_string(), "codeql".to_string()]));
    }

    #[test]
    fn aggregation_is_idempotent_end_to_end() {
        let findings = vec![
            finding("f1", 60, "semgrep", "app/db.py", 42),
            finding("f1", 85, "codeql", "app/db.py", 42),
            finding("f2", 70, "trivy", "app/other.py", 10),
        ];
        let once = aggregate(findings);
        let twice = aggregate(once.clone());
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.finding_id, b.finding_id);
            assert_eq!(a.source_tool.len(), b.source_tool.len());
            assert_eq!(a.metadata.tags, b.metadata.tags);
        }
    }
}
