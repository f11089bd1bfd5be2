//! Structured logging setup shared by every `scanforge` binary and library.
//!
//! All output goes to stderr; stdout is reserved for the broker's
//! line-delimited JSON-RPC protocol and for the CLI's own
//! machine-readable `--json` output, neither of which may be interleaved
//! with log lines.

use std::time::{Duration, Instant};
use tracing::{Level, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Initialize the global tracing subscriber.
///
/// `verbose` selects a compact-vs-structured format; the actual level
/// filter defers to `RUST_LOG` when set, falling back to
/// `scanforge=debug,info` (verbose) or `scanforge=info,warn` (default).
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("scanforge=debug,info")
            } else {
                EnvFilter::try_new("scanforge=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let writer = std::io::stderr;

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(false)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Span covering one workflow node's execution, carrying the fields every
/// engine/scheduler/adapter log line correlates on.
pub fn node_span(workflow_id: &str, node_id: &str, tool_id: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "node_execution",
        workflow_id = %workflow_id,
        node_id = %node_id,
        tool_id = %tool_id,
    )
}

/// Span covering a single adapter invocation within a node, distinct from
/// `node_span` since a retrying node opens several of these in sequence.
pub fn adapter_span(tool_id: &str, scan_id: &str, attempt: u32) -> tracing::Span {
    span!(
        Level::INFO,
        "adapter_invocation",
        tool_id = %tool_id,
        scan_id = %scan_id,
        attempt = %attempt,
    )
}

/// Measures wall-clock time for a named operation and emits a `tracing`
/// event on drop. Cheaper than threading a `Logger` object through call
/// sites that only need one timing.
pub struct OperationTimer {
    operation: &'static str,
    start: Instant,
}

impl OperationTimer {
    #[must_use]
    pub fn start(operation: &'static str) -> Self {
        tracing::debug!(operation, "starting");
        Self {
            operation,
            start: Instant::now(),
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        tracing::debug!(
            operation = self.operation,
            duration_ms = self.start.elapsed().as_millis() as u64,
            "completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_timer_reports_nonzero_elapsed() {
        let timer = OperationTimer::start("test_op");
        std::thread::sleep(Duration::from_millis(5));
        assert!(timer.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn node_span_has_expected_name() {
        let span = node_span("wf-1", "node-1", "semgrep");
        if let Some(metadata) = span.metadata() {
            assert_eq!(metadata.name(), "node_execution");
        }
    }

    #[test]
    fn init_tracing_does_not_panic() {
        let _ = init_tracing(false);
    }
}
