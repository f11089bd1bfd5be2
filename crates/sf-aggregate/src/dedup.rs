//! Cross-tool dedup and correlation tagging (`result_collection`'s merge
//! step). Findings sharing a `finding_id` collapse into one; findings at the
//! same file/line/vulnerability but with distinct ids are tagged
//! `"correlated"` instead of merged.

use std::collections::BTreeMap;

use sf_core::types::FindingId;
use sf_schema::finding::canonical_file_path;
use sf_schema::UnifiedFinding;

/// Collapse findings sharing a `finding_id`: the member with the higher
/// `confidence.score` supplies every field except `source_tool`, which
/// becomes the concatenation of every contributing member's tool refs so no
/// raw payload is lost.
#[must_use]
pub fn deduplicate(findings: Vec<UnifiedFinding>) -> Vec<UnifiedFinding> {
    let mut groups: BTreeMap<FindingId, Vec<UnifiedFinding>> = BTreeMap::new();
    for finding in findings {
        groups.entry(finding.finding_id.clone()).or_default().push(finding);
    }

    groups
        .into_values()
        .map(|mut group| {
            if group.len() == 1 {
                return group.remove(0);
            }
            let winner_index = group
                .iter()
                .enumerate()
                .max_by_key(|(_, f)| f.confidence.score)
                .map(|(i, _)| i)
                .unwrap_or(0);
            let mut winner = group.swap_remove(winner_index);
            for mut contributor in group {
                winner.source_tool.append(&mut contributor.source_tool);
            }
            winner
        })
        .collect()
}

/// Mark findings sharing `(canonical(file_path), line_start,
/// vulnerability_type.name)` as correlated without merging them. Assumes
/// `findings` already has distinct `finding_id`s (i.e. runs after
/// [`deduplicate`]).
pub fn tag_correlated(findings: &mut [UnifiedFinding]) {
    let mut counts: BTreeMap<(String, u32, String), u32> = BTreeMap::new();
    for finding in findings.iter() {
        let key = correlation_key(finding);
        *counts.entry(key).or_default() += 1;
    }

    for finding in findings.iter_mut() {
        let key = correlation_key(finding);
        if counts.get(&key).copied().unwrap_or(0) > 1 {
            finding.metadata.tags.insert("correlated".to_string());
        }
    }
}

fn correlation_key(finding: &UnifiedFinding) -> (String, u32, String) {
    (
        canonical_file_path(&finding.location.file_path),
        finding.location.line_start,
        finding.vulnerability_type.name.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_core::types::{FindingId, ScanId};
    use sf_schema::finding::{Confidence, Description, FindingMetadata, Location, Severity, SourceToolRef, VerificationStatus, VulnerabilityType};
    use sf_schema::severity::{Exploitability, SeverityLevel};
    use std::collections::BTreeSet;

    fn finding(finding_id: &str, confidence: u8, tool_id: &str) -> UnifiedFinding {
        UnifiedFinding {
            finding_id: FindingId::new(finding_id),
            scan_session_id: ScanId::new("scan-1"),
            vulnerability_type: VulnerabilityType {
                name: "sql-injection".into(),
                cwe_id: Some(89),
                owasp_category: None,
            },
            location: Location {
                file_path: "app/db.py".into(),
                line_start: 42,
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
    fn findings_with_same_id_collapse_keeping_higher_confidence() {
        let low = finding("f1", 40, "semgrep");
        let high = finding("f1", 90, "codeql");
        let merged = deduplicate(vec![low, high]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].confidence.score, 90);
        assert_eq!(merged[0].source_tool.len(), 2);
        let tool_ids: BTreeSet<_> = merged[0].source_tool.iter().map(|s| s.tool_id.clone()).collect();
        assert_eq!(tool_ids, BTreeSet::from(["semgrep".to_string(), "codeql".to_string()]));
    }

    #[test]
    fn distinct_ids_same_location_are_tagged_correlated_not_merged() {
        let mut findings = vec![finding("f1", 80, "semgrep"), finding("f2", 70, "codeql")];
        tag_correlated(&mut findings);
        assert_eq!(findings.len(), 2);
        assert!(findings[0].metadata.tags.contains("correlated"));
        assert!(findings[1].metadata.tags.contains("correlated"));
    }

    #[test]
    fn aggregation_is_idempotent() {
        let findings = vec![finding("f1", 40, "semgrep"), finding("f1", 90, "codeql")];
        let once = deduplicate(findings);
        let twice = deduplicate(once.clone());
        assert_eq!(once.len(), twice.len());
        assert_eq!(once[0].source_tool.len(), twice[0].source_tool.len());
    }
}
