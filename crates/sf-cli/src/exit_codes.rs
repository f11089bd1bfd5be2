//! Maps the workspace's per-subsystem error enums down to a single
//! `sf_core::ExitCode`. Library code never calls `std::process::exit`;
//! `cli::run()` returns a `Result<(), sf_core::ExitCode>` and `main()` is the
//! only place the process actually terminates.

use sf_core::ExitCode;
use sf_engine::EngineError;
use sf_scheduler::FailureClass;

/// Maps an `sf_engine::EngineError` to an exit code. Each subsystem keeps
/// its own `thiserror` enum (engine/checkpoint/scheduler/adapter); this is
/// the only place that collapses them into a process exit status.
#[must_use]
pub fn engine_error_exit_code(err: &EngineError) -> ExitCode {
    match err {
        EngineError::ToolNotRegistered(_) => ExitCode::TOOL_NOT_REGISTERED,
        EngineError::PlanBuild { .. } => ExitCode::CLI_ARGS,
        EngineError::AlreadyTerminal(_) | EngineError::InvalidTransition { .. } | EngineError::NotAwaitingReview(_) => {
            ExitCode::INVALID_TRANSITION
        }
        EngineError::Checkpoint(_) => ExitCode::CHECKPOINT_IO,
        EngineError::NodeFailed { source, .. } => adapter_error_exit_code(source),
        EngineError::RetriesExhausted { class, .. } => failure_class_exit_code(*class),
        EngineError::NodeCanceled { .. } => ExitCode::CANCELED,
    }
}

fn adapter_error_exit_code(err: &sf_adapter_api::AdapterError) -> ExitCode {
    use sf_adapter_api::AdapterError;
    match err {
        AdapterError::InvalidInput { .. } => ExitCode::INVALID_INPUT,
        AdapterError::ToolMissing(_) => ExitCode::TOOL_MISSING,
        AdapterError::ExecutionFailed { .. } => ExitCode::EXECUTION_FAILED,
        AdapterError::Timeout { .. } => ExitCode::TIMEOUT,
        AdapterError::ParseError(_) => ExitCode::PARSE_ERROR,
        AdapterError::Canceled => ExitCode::CANCELED,
    }
}

fn failure_class_exit_code(class: FailureClass) -> ExitCode {
    match class {
        FailureClass::Timeout => ExitCode::TIMEOUT,
        FailureClass::ExecutionFailed { .. } => ExitCode::EXECUTION_FAILED,
        FailureClass::InvalidInput => ExitCode::INVALID_INPUT,
        FailureClass::ParseError => ExitCode::PARSE_ERROR,
        FailureClass::Canceled => ExitCode::CANCELED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_not_registered_maps_to_its_own_code() {
        let err = EngineError::ToolNotRegistered(sf_core::types::ToolId::new("semgrep"));
        assert_eq!(engine_error_exit_code(&err), ExitCode::TOOL_NOT_REGISTERED);
    }

    #[test]
    fn already_terminal_maps_to_invalid_transition() {
        let err = EngineError::AlreadyTerminal(sf_core::types::WorkflowId::new("wf-1"));
        assert_eq!(engine_error_exit_code(&err), ExitCode::INVALID_TRANSITION);
    }

    #[test]
    fn node_failed_defers_to_the_underlying_adapter_error() {
        let err = EngineError::NodeFailed {
            index: 0,
            source: sf_adapter_api::AdapterError::ToolMissing("semgrep not on PATH".to_string()),
        };
        assert_eq!(engine_error_exit_code(&err), ExitCode::TOOL_MISSING);
    }

    #[test]
    fn retries_exhausted_defers_to_the_failure_class() {
        let err = EngineError::RetriesExhausted {
            index: 0,
            class: FailureClass::Timeout,
            diagnostic: None,
        };
        assert_eq!(engine_error_exit_code(&err), ExitCode::TIMEOUT);
    }
}
