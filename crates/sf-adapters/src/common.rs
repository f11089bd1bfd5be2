//! Shared plumbing every built-in adapter uses: binary discovery, request
//! validation against a descriptor's `input_requirements`, and command-hash
//! diagnostics.

use std::collections::BTreeSet;
use std::path::PathBuf;

use sf_adapter_api::{AdapterError, ValidationError};
use sf_runner::CommandSpec;
use sf_schema::capability::CapabilityDescriptor;
use sf_schema::finding::FindingMetadata;
use sf_schema::request::ScanRequest;

/// Locate an adapter's backing binary on `PATH`. Adapters call this at the
/// top of `execute()` so an unreachable binary returns `ToolMissing` without
/// launching any process.
pub fn find_binary(program: &str) -> Result<PathBuf, AdapterError> {
    which::which(program).map_err(|_| AdapterError::ToolMissing(program.to_string()))
}

/// Check `request.target.kind` against `descriptor.input_requirements`
/// before any process is launched.
pub fn validate_target_kind(
    descriptor: &CapabilityDescriptor,
    request: &ScanRequest,
) -> Result<(), ValidationError> {
    if !descriptor
        .input_requirements
        .accepted_target_kinds
        .contains(&request.target.kind)
    {
        return Err(ValidationError::new(
            "target.kind",
            format!(
                "{} does not accept target kind {}",
                descriptor.tool_id, request.target.kind
            ),
        ));
    }
    Ok(())
}

/// Check `request.network_allowed` against `descriptor.execution.requires_network`.
pub fn validate_network(
    descriptor: &CapabilityDescriptor,
    request: &ScanRequest,
) -> Result<(), ValidationError> {
    if descriptor.execution.requires_network && !request.network_allowed {
        return Err(ValidationError::new(
            "network_allowed",
            format!("{} requires network access", descriptor.tool_id),
        ));
    }
    Ok(())
}

/// BLAKE3 hash of an invocation's argv, preserved in diagnostics without
/// leaking full command lines (which may carry path-embedded secrets) into
/// logs.
#[must_use]
pub fn command_hash(cmd: &CommandSpec) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(cmd.program.to_string_lossy().as_bytes());
    for arg in &cmd.args {
        hasher.update(b"\0");
        hasher.update(arg.to_string_lossy().as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Truncate a parsed finding list to `request.limits.max_findings`, if set.
/// Adapters apply this after sorting is irrelevant — cross-adapter sort
/// order is the engine's `result_collection` job; this only
/// bounds how much one adapter run reports.
#[must_use]
pub fn apply_max_findings(
    mut findings: Vec<sf_schema::finding::UnifiedFinding>,
    limit: Option<u32>,
) -> Vec<sf_schema::finding::UnifiedFinding> {
    if let Some(limit) = limit {
        findings.truncate(limit as usize);
    }
    findings
}

#[must_use]
pub fn metadata_now(language: Option<String>, tags: impl IntoIterator<Item = String>) -> FindingMetadata {
    FindingMetadata {
        detected_at: chrono::Utc::now(),
        language,
        tags: tags.into_iter().collect::<BTreeSet<_>>(),
        references: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_reported_as_tool_missing() {
        let err = find_binary("definitely-not-a-real-binary-xyz").unwrap_err();
        assert!(matches!(err, AdapterError::ToolMissing(_)));
    }

    #[test]
    fn command_hash_is_stable_and_distinguishes_args() {
        let a = CommandSpec::new("semgrep").arg("--json");
        let b = CommandSpec::new("semgrep").arg("--json");
        let c = CommandSpec::new("semgrep").arg("--sarif");
        assert_eq!(command_hash(&a), command_hash(&b));
        assert_ne!(command_hash(&a), command_hash(&c));
    }
}
