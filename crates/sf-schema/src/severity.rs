//! Severity normalization table.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};

/// Unified severity level. Ordered `Info < Low < Medium < High < Critical`
/// so `Ord`-based sorts naturally rank critical findings first when reversed,
/// matching the `severity desc` dedup sort order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString, VariantNames,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum SeverityLevel {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// Qualitative ease of exploitation, reported by adapters that have an
/// opinion; `Unknown` when the native tool doesn't surface one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Exploitability {
    Easy,
    Moderate,
    Hard,
    Unknown,
}

/// Result of normalizing a tool's native severity token: the unified level,
/// and — only for tokens that fell through to the default — a diagnostic
/// reason surfaced on the finding's `confidence.reason`.
pub struct Normalized {
    pub level: SeverityLevel,
    pub unmapped_reason: Option<String>,
}

/// Map a tool's native severity token (case-insensitive) to [`SeverityLevel`]
/// per the canonical table below. Unknown tokens degrade to
/// `MEDIUM` with a diagnostic reason rather than failing the parse — a scan
/// with an adapter that emits a severity our table doesn't know yet must
/// still produce a finding.
#[must_use]
pub fn normalize_severity(native_token: &str) -> Normalized {
    let lower = native_token.trim().to_lowercase();
    let level = match lower.as_str() {
        "critical" | "severe" => Some(SeverityLevel::Critical),
        "high" => Some(SeverityLevel::High),
        "medium" | "warning" => Some(SeverityLevel::Medium),
        "low" => Some(SeverityLevel::Low),
        "info" | "informational" | "note" => Some(SeverityLevel::Info),
        _ => None,
    };

    match level {
        Some(level) => Normalized {
            level,
            unmapped_reason: None,
        },
        None => Normalized {
            level: SeverityLevel::Medium,
            unmapped_reason: Some(format!("severity unmapped: {native_token}")),
        },
    }
}

/// The CVSS band a unified level corresponds to.
/// Used by adapters that only have a CVSS score and need a level, and by
/// tests asserting the two stay in sync.
#[must_use]
pub fn cvss_band(level: SeverityLevel) -> (f32, f32) {
    match level {
        SeverityLevel::Critical => (9.0, 10.0),
        SeverityLevel::High => (7.0, 8.9),
        SeverityLevel::Medium => (4.0, 6.9),
        SeverityLevel::Low => (0.1, 3.9),
        SeverityLevel::Info => (0.0, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tokens_map_case_insensitively() {
        for (token, expected) in [
            ("CRITICAL", SeverityLevel::Critical),
            ("severe", SeverityLevel::Critical),
            ("High", SeverityLevel::High),
            ("WARNING", SeverityLevel::Medium),
            ("medium", SeverityLevel::Medium),
            ("low", SeverityLevel::Low),
            ("Note", SeverityLevel::Info),
            ("informational", SeverityLevel::Info),
        ] {
            let normalized = normalize_severity(token);
            assert_eq!(normalized.level, expected, "token={token}");
            assert!(normalized.unmapped_reason.is_none());
        }
    }

    #[test]
    fn unknown_token_maps_to_medium_with_diagnostic() {
        let normalized = normalize_severity("weird");
        assert_eq!(normalized.level, SeverityLevel::Medium);
        let reason = normalized.unmapped_reason.expect("diagnostic reason");
        assert!(reason.contains("severity unmapped"));
        assert!(reason.contains("weird"));
    }

    #[test]
    fn ordering_is_ascending_severity() {
        assert!(SeverityLevel::Info < SeverityLevel::Low);
        assert!(SeverityLevel::Low < SeverityLevel::Medium);
        assert!(SeverityLevel::Medium < SeverityLevel::High);
        assert!(SeverityLevel::High < SeverityLevel::Critical);
    }
}
