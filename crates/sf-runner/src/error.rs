//! Errors raised while spawning or supervising an adapter's subprocess.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn process: {reason}")]
    SpawnFailed { reason: String },

    #[error("execution timed out after {timeout_seconds}s")]
    Timeout { timeout_seconds: u64 },

    #[error("execution was canceled")]
    Canceled,

    #[error("i/o error while supervising process: {0}")]
    Io(#[from] std::io::Error),
}
