//! The deterministic order `result_collection` reports findings in: severity
//! descending, then CVSS descending (nulls last), then file path and start
//! line ascending.

use std::cmp::Ordering;

use sf_schema::UnifiedFinding;

/// Sort findings in place. Stable, so ties not covered by any key (e.g. two
/// findings on the same line) keep their relative input order.
pub fn sort_findings(findings: &mut [UnifiedFinding]) {
    findings.sort_by(|a, b| {
        b.severity
            .level
            .cmp(&a.severity.level)
            .then_with(|| cvss_desc_nulls_last(a.severity.cvss.map(|c| c.get()), b.severity.cvss.map(|c| c.get())))
            .then_with(|| a.location.file_path.cmp(&b.location.file_path))
            .then_with(|| a.location.line_start.cmp(&b.location.line_start))
    });
}

fn cvss_desc_nulls_last(a: Option<f32>, b: Option<f32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_core::types::{CvssScore, FindingId, ScanId};
    use sf_schema::finding::{Confidence, Description, FindingMetadata, Location, Severity, VerificationStatus, VulnerabilityType};
    use sf_schema::severity::{Exploitability, SeverityLevel};
    use std::collections::BTreeSet;

    fn finding(severity: SeverityLevel, cvss: Option<f32>, file_path: &str, line_start: u32) -> UnifiedFinding {
        UnifiedFinding {
            finding_id: FindingId::new(format!("{file_path}:{line_start}:{severity}")),
            scan_session_id: ScanId::new("scan-1"),
            vulnerability_type: VulnerabilityType {
                name: "x".into(),
                cwe_id: None,
                owasp_category: None,
            },
            location: Location {
                file_path: file_path.into(),
                line_start,
                ..Default::default()
            },
            severity: Severity {
                level: severity,
                cvss: cvss.map(|v| CvssScore::new(v).unwrap()),
                exploitability: Exploitability::Unknown,
            },
            confidence: Confidence::new(80, "test"),
            source_tool: vec![],
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
    fn sorts_by_severity_descending_first() {
        let mut findings = vec![
            finding(SeverityLevel::Low, None, "a.py", 1),
            finding(SeverityLevel::Critical, None, "b.py", 1),
            finding(SeverityLevel::Medium, None, "c.py", 1),
        ];
        sort_findings(&mut findings);
        let levels: Vec<_> = findings.iter().map(|f| f.severity.level).collect();
        assert_eq!(levels, vec![SeverityLevel::Critical, SeverityLevel::Medium, SeverityLevel::Low]);
    }

    #[test]
    fn cvss_breaks_severity_ties_descending_with_nulls_last() {
        let mut findings = vec![
            finding(SeverityLevel::High, None, "a.py", 1),
            finding(SeverityLevel::High, Some(7.5), "b.py", 1),
            finding(SeverityLevel::High, Some(8.9), "c.py", 1),
        ];
        sort_findings(&mut findings);
        let paths: Vec<_> = findings.iter().map(|f| f.location.file_path.clone()).collect();
        assert_eq!(paths, vec!["c.py", "b.py", "a.py"]);
    }

    #[test]
    fn file_path_then_line_start_break_remaining_ties() {
        let mut findings = vec![
            finding(SeverityLevel::High, None, "b.py", 5),
            finding(SeverityLevel::High, None, "a.py", 9),
            finding(SeverityLevel::High, None, "a.py", 2),
        ];
        sort_findings(&mut findings);
        let keys: Vec<_> = findings
            .iter()
            .map(|f| (f.location.file_path.clone(), f.location.line_start))
            .collect();
        assert_eq!(
            keys,
            vec![("a.py".to_string(), 2), ("a.py".to_string(), 9), ("b.py".to_string(), 5)]
        );
    }
}
