//! Unified Finding and its deterministic id derivation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use sf_core::types::{CvssScore, FindingId, ScanId};

use crate::severity::{Exploitability, SeverityLevel};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnerabilityType {
    pub name: String,
    pub cwe_id: Option<u32>,
    pub owasp_category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Location {
    pub file_path: String,
    pub function_name: Option<String>,
    pub class_name: Option<String>,
    pub line_start: u32,
    pub line_end: Option<u32>,
    pub column_start: Option<u32>,
    pub column_end: Option<u32>,
    pub code_snippet: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Severity {
    pub level: SeverityLevel,
    pub cvss: Option<CvssScore>,
    pub exploitability: Exploitability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Confidence {
    pub score: u8,
    pub reason: String,
}

impl Confidence {
    /// Invariant: `confidence ∈ [0, 100]`.
    #[must_use]
    pub fn new(score: u8, reason: impl Into<String>) -> Self {
        Self {
            score: score.min(100),
            reason: reason.into(),
        }
    }
}

/// One contributing tool's view of a finding. A freshly parsed finding
/// carries exactly one; `result_collection` dedup appends to
/// this list when two tools agree on the same `finding_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceToolRef {
    pub tool_id: String,
    pub rule_id: String,
    pub native_severity: String,
    pub raw_output: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Description {
    pub summary: String,
    pub detail: String,
    pub impact: String,
    pub remediation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingMetadata {
    pub detected_at: DateTime<Utc>,
    pub language: Option<String>,
    pub tags: BTreeSet<String>,
    pub references: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Verified,
    FalsePositive,
    WontFix,
}

/// Normalized vulnerability record shared across tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedFinding {
    pub finding_id: FindingId,
    pub scan_session_id: ScanId,
    pub vulnerability_type: VulnerabilityType,
    pub location: Location,
    pub severity: Severity,
    pub confidence: Confidence,
    pub source_tool: Vec<SourceToolRef>,
    pub description: Description,
    pub metadata: FindingMetadata,
    pub verification_status: VerificationStatus,
}

/// Normalize a file path for hashing: forward slashes, no leading `./`,
/// no trailing slash. Two adapters reporting `./app/db.py` and `app/db.py`
/// must produce the same `finding_id`.
#[must_use]
pub fn canonical_file_path(file_path: &str) -> String {
    let normalized = file_path.replace('\\', "/");
    let trimmed = normalized.trim_start_matches("./").trim_end_matches('/');
    trimmed.to_string()
}

/// Strip whitespace and trailing punctuation from a code snippet so trivial
/// re-formatting (indentation width, trailing semicolon style) doesn't
/// change a finding's id across re-runs.
#[must_use]
pub fn normalized_code_fingerprint(snippet: Option<&str>) -> String {
    let Some(snippet) = snippet else {
        return String::new();
    };
    let collapsed: String = snippet.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_string()
}

/// `finding_id = hash(tool_id ∥ rule_id ∥ canonical(file_path) ∥ line_start ∥
/// normalized_code_fingerprint)`. Deterministic and stable
/// across re-runs on unchanged input.
#[must_use]
pub fn derive_finding_id(
    tool_id: &str,
    rule_id: &str,
    file_path: &str,
    line_start: u32,
    code_snippet: Option<&str>,
) -> FindingId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(tool_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(rule_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(canonical_file_path(file_path).as_bytes());
    hasher.update(b"\0");
    hasher.update(line_start.to_le_bytes().as_slice());
    hasher.update(b"\0");
    hasher.update(normalized_code_fingerprint(code_snippet).as_bytes());
    FindingId::new(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finding_id_is_stable_across_equivalent_paths() {
        let a = derive_finding_id("semgrep", "py.sqli", "./app/db.py", 42, Some("query(x)  "));
        let b = derive_finding_id("semgrep", "py.sqli", "app/db.py", 42, Some("query(x)"));
        assert_eq!(a, b);
    }

    #[test]
    fn finding_id_changes_with_any_component() {
        let base = derive_finding_id("semgrep", "py.sqli", "app/db.py", 42, Some("query(x)"));
        let different_tool = derive_finding_id("trivy", "py.sqli", "app/db.py", 42, Some("query(x)"));
        let different_line = derive_finding_id("semgrep", "py.sqli", "app/db.py", 43, Some("query(x)"));
        assert_ne!(base, different_tool);
        assert_ne!(base, different_line);
    }

    #[test]
    fn confidence_clamps_to_valid_range() {
        assert_eq!(Confidence::new(255, "x").score, 100);
        assert_eq!(Confidence::new(0, "x").score, 0);
    }
}
