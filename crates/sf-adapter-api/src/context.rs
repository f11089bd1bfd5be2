//! Execution context handed to `Adapter::execute` and the native output it
//! hands back.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;

use crate::cancellation::CancellationToken;

/// Everything an adapter needs to honor while running a tool: deadline,
/// working directory, network allowance, and the cooperative cancellation
/// signal.
#[derive(Clone)]
pub struct ExecutionContext {
    pub working_dir: PathBuf,
    pub timeout: Duration,
    pub network_allowed: bool,
    pub cancellation: CancellationToken,
}

impl ExecutionContext {
    #[must_use]
    pub fn new(
        working_dir: PathBuf,
        timeout: Duration,
        network_allowed: bool,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            working_dir,
            timeout,
            network_allowed,
            cancellation,
        }
    }
}

/// Diagnostics about one invocation, preserved alongside the payload for
/// audit.
#[derive(Debug, Clone, Default)]
pub struct ExecutionDiagnostics {
    pub command_hash: Option<String>,
    pub duration: Duration,
    pub exit_code: Option<i32>,
    pub stderr_tail: String,
}

/// The raw payload `execute` hands to `parse`, plus the diagnostics it
/// captured along the way. `raw_text` is preserved verbatim in each finding's
/// `source_tool.raw_output` for audit.
#[derive(Debug, Clone)]
pub struct NativeOutput {
    /// Parsed JSON view of the payload, when the tool emits JSON. Adapters
    /// for line-oriented tools leave this `Value::Null` and parse `raw_text`
    /// directly.
    pub payload: Value,
    pub raw_text: String,
    pub diagnostics: ExecutionDiagnostics,
    /// Set when this came from a timed-out adapter that supports streaming
    /// partial output; `parse` must tag resulting findings
    /// with `metadata.tag = "partial"`.
    pub partial: bool,
}

impl NativeOutput {
    #[must_use]
    pub fn text(raw_text: String, diagnostics: ExecutionDiagnostics) -> Self {
        Self {
            payload: Value::Null,
            raw_text,
            diagnostics,
            partial: false,
        }
    }

    #[must_use]
    pub fn json(payload: Value, raw_text: String, diagnostics: ExecutionDiagnostics) -> Self {
        Self {
            payload,
            raw_text,
            diagnostics,
            partial: false,
        }
    }

    #[must_use]
    pub fn partial(mut self) -> Self {
        self.partial = true;
        self
    }
}
