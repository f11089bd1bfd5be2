//! Capability Descriptor.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use sf_core::types::ToolId;

/// Scanner discipline. `Iast` and `Fuzzing` are valid categories with no
/// built-in adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Category {
    Sast,
    Sca,
    Dast,
    Iast,
    Secrets,
    Container,
    Fuzzing,
}

/// Kind of target a request can point at; also used by [`InputRequirements`]
/// to declare what an adapter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetKind {
    LocalPath,
    GitRepo,
    ContainerImage,
    HttpUrl,
}

/// What an adapter needs to run, and what kinds of target it will accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRequirements {
    pub requires_source: bool,
    pub requires_binary: bool,
    pub requires_running_app: bool,
    pub requires_manifest: bool,
    pub supported_vcs: BTreeSet<String>,
    pub accepted_target_kinds: BTreeSet<TargetKind>,
}

/// The shape of an adapter's native output, for operators inspecting the
/// registry rather than running it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSchema {
    pub native_format: String,
    pub expected_fields: Vec<String>,
}

/// Resource and scheduling defaults an adapter asks for; the scheduler's
/// per-task deadline is `min(node budget, this timeout, request's limit)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionProfile {
    pub default_timeout_secs: u64,
    pub min_memory_mb: u32,
    pub min_cpu_cores: u32,
    pub requires_network: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityMetadata {
    pub license: String,
    pub docs_url: Option<String>,
    pub adapter_version: String,
    pub registered_at: DateTime<Utc>,
}

/// A tool's self-description: identity, coverage, and how to talk to it.
/// Produced by `Adapter::describe()` (`sf-adapter-api`); must be pure and
/// stable for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub tool_id: ToolId,
    pub tool_name: String,
    pub tool_version: String,
    pub category: Category,
    pub vendor: String,
    pub description: String,
    pub supported_languages: BTreeSet<String>,
    pub detection_types: BTreeSet<String>,
    pub cwe_coverage: BTreeSet<u32>,
    pub input_requirements: InputRequirements,
    pub output_schema: OutputSchema,
    pub execution: ExecutionProfile,
    pub metadata: CapabilityMetadata,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("cwe_coverage entry {0} is not a positive integer")]
    NonPositiveCwe(u32),
    #[error("execution.default_timeout_secs must be > 0")]
    NonPositiveTimeout,
    #[error(
        "input_requirements.requires_running_app is set but accepted_target_kinds does not include HTTP_URL"
    )]
    RunningAppRequiresHttpUrl,
}

impl CapabilityDescriptor {
    /// Validate the invariants every descriptor must satisfy.
    /// `tool_id` global-uniqueness is a registry-level invariant (enforced
    /// by `sf-adapters::Registry::register`), not checked here.
    pub fn validate(&self) -> Result<(), CapabilityError> {
        if self.cwe_coverage.contains(&0) {
            return Err(CapabilityError::NonPositiveCwe(0));
        }
        if self.execution.default_timeout_secs == 0 {
            return Err(CapabilityError::NonPositiveTimeout);
        }
        if self.input_requirements.requires_running_app
            && !self
                .input_requirements
                .accepted_target_kinds
                .contains(&TargetKind::HttpUrl)
        {
            return Err(CapabilityError::RunningAppRequiresHttpUrl);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> CapabilityDescriptor {
        CapabilityDescriptor {
            tool_id: ToolId::new("semgrep"),
            tool_name: "Semgrep".into(),
            tool_version: "1.0.0".into(),
            category: Category::Sast,
            vendor: "r2c".into(),
            description: "static analysis".into(),
            supported_languages: BTreeSet::from(["python".into()]),
            detection_types: BTreeSet::from(["sast".into()]),
            cwe_coverage: BTreeSet::from([89, 79]),
            input_requirements: InputRequirements {
                requires_source: true,
                requires_binary: false,
                requires_running_app: false,
                requires_manifest: false,
                supported_vcs: BTreeSet::from(["git".into()]),
                accepted_target_kinds: BTreeSet::from([TargetKind::LocalPath, TargetKind::GitRepo]),
            },
            output_schema: OutputSchema {
                native_format: "semgrep-json".into(),
                expected_fields: vec!["results".into()],
            },
            execution: ExecutionProfile {
                default_timeout_secs: 300,
                min_memory_mb: 256,
                min_cpu_cores: 1,
                requires_network: false,
            },
            metadata: CapabilityMetadata {
                license: "LGPL-2.1".into(),
                docs_url: None,
                adapter_version: "1".into(),
                registered_at: Utc::now(),
            },
        }
    }

    #[test]
    fn valid_descriptor_passes() {
        assert!(descriptor().validate().is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut d = descriptor();
        d.execution.default_timeout_secs = 0;
        assert_eq!(d.validate(), Err(CapabilityError::NonPositiveTimeout));
    }

    #[test]
    fn zero_cwe_is_rejected() {
        let mut d = descriptor();
        d.cwe_coverage.insert(0);
        assert_eq!(d.validate(), Err(CapabilityError::NonPositiveCwe(0)));
    }

    #[test]
    fn running_app_without_http_url_is_rejected() {
        let mut d = descriptor();
        d.input_requirements.requires_running_app = true;
        assert_eq!(d.validate(), Err(CapabilityError::RunningAppRequiresHttpUrl));
    }

    #[test]
    fn running_app_with_http_url_passes() {
        let mut d = descriptor();
        d.input_requirements.requires_running_app = true;
        d.input_requirements
            .accepted_target_kinds
            .insert(TargetKind::HttpUrl);
        assert!(d.validate().is_ok());
    }
}
