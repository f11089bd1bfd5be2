//! The `describe -> validate -> execute -> parse` contract every tool
//! adapter implements.
//!
//! Adapters never retain state across runs and never correlate findings
//! across tools — both belong to `sf-engine`'s `result_collection` node.
//! This crate only defines the contract and the convenience `run()`
//! orchestration; `sf-adapters` provides the registry and the built-in
//! implementations.

pub mod cancellation;
pub mod context;
pub mod error;
pub mod event;

pub use cancellation::CancellationToken;
pub use context::{ExecutionContext, ExecutionDiagnostics, NativeOutput};
pub use error::{AdapterError, ValidationError};
pub use event::AdapterEvent;

use async_trait::async_trait;
use sf_schema::{CapabilityDescriptor, ScanRequest, UnifiedFinding};

/// Uniform interface over one external scanner.
///
/// `describe` must be pure: same output on every call, independent of any
/// prior `validate`/`execute`/`parse`.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Stable, side-effect-free self-description.
    fn describe(&self) -> CapabilityDescriptor;

    /// Reject anything violating `describe().input_requirements` before any
    /// process is launched.
    fn validate(&self, request: &ScanRequest) -> Result<(), ValidationError>;

    /// Invoke the backing tool. Honors `ctx`'s timeout, working directory,
    /// network allowance, and cancellation token.
    async fn execute(
        &self,
        request: &ScanRequest,
        ctx: &ExecutionContext,
    ) -> Result<NativeOutput, AdapterError>;

    /// Deterministic: identical input (including `finding_id`) on every call.
    fn parse(
        &self,
        native_output: &NativeOutput,
        request: &ScanRequest,
    ) -> Result<Vec<UnifiedFinding>, AdapterError>;

    /// `validate ⇒ execute ⇒ parse`, emitting `validated`/`executed`/`parsed`
    /// events for observability. Adapters get this for free;
    /// none of the built-ins override it.
    async fn run(
        &self,
        request: &ScanRequest,
        ctx: &ExecutionContext,
        on_event: &(dyn Fn(AdapterEvent) + Send + Sync),
    ) -> Result<Vec<UnifiedFinding>, AdapterError> {
        self.validate(request)?;
        on_event(AdapterEvent::Validated);

        let native_output = self.execute(request, ctx).await?;
        on_event(AdapterEvent::Executed {
            duration: native_output.diagnostics.duration,
            partial: native_output.partial,
        });

        let findings = self.parse(&native_output, request)?;
        on_event(AdapterEvent::Parsed {
            finding_count: findings.len(),
        });

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_schema::capability::{
        Category, ExecutionProfile, InputRequirements, OutputSchema, TargetKind,
    };
    use sf_schema::request::{ScanContext, ScanLimits, ScanOptions, ScanType, Target};
    use sf_core::types::ScanId;
    use std::collections::BTreeSet;
    use std::sync::Mutex;
    use std::time::Duration;

    struct EchoAdapter;

    #[async_trait]
    impl Adapter for EchoAdapter {
        fn describe(&self) -> CapabilityDescriptor {
            CapabilityDescriptor {
                tool_id: sf_core::types::ToolId::new("echo"),
                tool_name: "Echo".into(),
                tool_version: "0".into(),
                category: Category::Sast,
                vendor: "test".into(),
                description: "test adapter".into(),
                supported_languages: BTreeSet::new(),
                detection_types: BTreeSet::new(),
                cwe_coverage: BTreeSet::new(),
                input_requirements: InputRequirements {
                    requires_source: true,
                    requires_binary: false,
                    requires_running_app: false,
                    requires_manifest: false,
                    supported_vcs: BTreeSet::new(),
                    accepted_target_kinds: BTreeSet::from([TargetKind::LocalPath]),
                },
                output_schema: OutputSchema {
                    native_format: "text".into(),
                    expected_fields: vec![],
                },
                execution: ExecutionProfile {
                    default_timeout_secs: 5,
                    min_memory_mb: 1,
                    min_cpu_cores: 1,
                    requires_network: false,
                },
                metadata: sf_schema::capability::CapabilityMetadata {
                    license: "MIT".into(),
                    docs_url: None,
                    adapter_version: "1".into(),
                    registered_at: chrono::Utc::now(),
                },
            }
        }

        fn validate(&self, _request: &ScanRequest) -> Result<(), ValidationError> {
            Ok(())
        }

        async fn execute(
            &self,
            _request: &ScanRequest,
            _ctx: &ExecutionContext,
        ) -> Result<NativeOutput, AdapterError> {
            Ok(NativeOutput::text("ok".into(), ExecutionDiagnostics::default()))
        }

        fn parse(
            &self,
            _native_output: &NativeOutput,
            _request: &ScanRequest,
        ) -> Result<Vec<UnifiedFinding>, AdapterError> {
            Ok(vec![])
        }
    }

    fn request() -> ScanRequest {
        ScanRequest {
            scan_id: ScanId::new("scan-1"),
            target: Target::local_path("/tmp"),
            options: ScanOptions::default(),
            context: ScanContext {
                workflow_id: None,
                project_name: "p".into(),
                scan_type: ScanType::Full,
                triggered_by: "test".into(),
            },
            limits: ScanLimits::default(),
            network_allowed: false,
        }
    }

    #[tokio::test]
    async fn run_emits_all_three_stage_events_in_order() {
        let adapter = EchoAdapter;
        let ctx = ExecutionContext::new(
            std::path::PathBuf::from("/tmp"),
            Duration::from_secs(5),
            false,
            CancellationToken::new(),
        );
        let events: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());
        let on_event = |event: AdapterEvent| {
            let label = match event {
                AdapterEvent::Validated => "validated",
                AdapterEvent::Executed { .. } => "executed",
                AdapterEvent::Parsed { .. } => "parsed",
            };
            events.lock().unwrap().push(label);
        };

        let result = adapter.run(&request(), &ctx, &on_event).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(*events.lock().unwrap(), vec!["validated", "executed", "parsed"]);
    }
}
