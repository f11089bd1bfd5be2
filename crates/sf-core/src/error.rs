//! Core error taxonomy.
//!
//! This crate's own failures (lock contention, atomic-write failures, config
//! parsing) live here as `CoreError`. The adapter/scheduler/engine/broker
//! error taxonomy (`InvalidInput`, `ToolMissing`, `ExecutionFailed`,
//! `Timeout`, `ParseError`, `Canceled`) is defined per-crate at the boundary
//! that produces it (`sf-adapter-api::AdapterError`, `sf-engine::EngineError`,
//! ...) following the same `thiserror` style as this one, so each subsystem's
//! error enum only carries variants it can actually produce.

use crate::exit_codes::ExitCode;
use crate::lock::LockError;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Library-level error type for `sf-core` operations.
///
/// Library code returns `CoreError` and never calls `std::process::exit`;
/// only the CLI binary maps a terminal error to an [`ExitCode`] and exits.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("atomic write to {path} failed: {reason}")]
    AtomicWrite { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CoreError {
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Lock(LockError::ConcurrentExecution { .. } | LockError::StaleLock { .. }) => {
                ExitCode::LOCK_HELD
            }
            Self::Config(_) => ExitCode::CLI_ARGS,
            Self::Io(_) | Self::Lock(_) | Self::AtomicWrite { .. } => ExitCode::INTERNAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_maps_to_cli_args() {
        let err = CoreError::Config("bad toml".to_string());
        assert_eq!(err.to_exit_code(), ExitCode::CLI_ARGS);
    }
}
