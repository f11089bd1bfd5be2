//! Adapter error taxonomy: exactly one of these five.

use thiserror::Error;

use crate::context::NativeOutput;

#[derive(Debug, Error, Clone)]
#[error("invalid input at {field_path}: {reason}")]
pub struct ValidationError {
    pub reason: String,
    pub field_path: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field_path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid input at {field_path}: {reason}")]
    InvalidInput { reason: String, field_path: String },

    #[error("tool binary or service not found: {0}")]
    ToolMissing(String),

    #[error("execution failed (exit {exit_code:?}): {stderr_tail}")]
    ExecutionFailed { exit_code: Option<i32>, stderr_tail: String },

    /// Carries partial output when the tool supports streaming and some was
    /// captured before the deadline.
    #[error("execution timed out")]
    Timeout { partial: Option<NativeOutput> },

    #[error("failed to parse native output: {0}")]
    ParseError(String),

    #[error("execution was canceled")]
    Canceled,
}

impl From<ValidationError> for AdapterError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidInput {
            reason: value.reason,
            field_path: value.field_path,
        }
    }
}

impl AdapterError {
    /// Whether the scheduler's default retry policy considers this class
    /// retryable: `Timeout` always is; `ExecutionFailed` is
    /// retryable only if its exit code is in the configured whitelist
    /// (decided by the caller, not here); everything else never is.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    #[must_use]
    pub fn execution_failed_exit_code(&self) -> Option<i32> {
        match self {
            Self::ExecutionFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_converts_into_invalid_input() {
        let validation = ValidationError::new("target.kind", "unsupported target kind");
        let adapter_error: AdapterError = validation.into();
        assert!(matches!(adapter_error, AdapterError::InvalidInput { .. }));
    }

    #[test]
    fn timeout_is_recognized() {
        let err = AdapterError::Timeout { partial: None };
        assert!(err.is_timeout());
        let err = AdapterError::ParseError("bad json".into());
        assert!(!err.is_timeout());
    }
}
