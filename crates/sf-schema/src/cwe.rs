//! CWE extraction fallback: when an adapter has no explicit
//! `cwe_id`, the normalizer tries to pull one out of the tool's rule
//! metadata text. First match wins.

use once_cell::sync::Lazy;
use regex::Regex;

static CWE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CWE[-_ ]?([0-9]+)").expect("static regex is valid"));

/// Extract the first `CWE-NNN` (or `CWE_NNN`, `CWE NNN`, `CWENNN`) occurrence
/// from free text, case-sensitively (native rule metadata consistently
/// capitalizes `CWE`).
#[must_use]
pub fn extract_cwe(text: &str) -> Option<u32> {
    CWE_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_hyphenated_form() {
        assert_eq!(extract_cwe("CWE-89: SQL Injection"), Some(89));
    }

    #[test]
    fn extracts_underscore_and_space_forms() {
        assert_eq!(extract_cwe("ref: CWE_79 xss"), Some(79));
        assert_eq!(extract_cwe("see CWE 22 path traversal"), Some(22));
        assert_eq!(extract_cwe("CWE120 buffer"), Some(120));
    }

    #[test]
    fn first_match_wins() {
        assert_eq!(extract_cwe("CWE-89 and also CWE-79"), Some(89));
    }

    #[test]
    fn no_match_returns_none() {
        assert_eq!(extract_cwe("no identifiers here"), None);
    }
}
