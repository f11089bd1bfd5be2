//! Broker session state machine: `UNINITIALIZED -> INITIALIZED -> SERVING ->
//! CLOSING -> CLOSED`. A session advances strictly forward; there is no
//! path back to an earlier state.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Uninitialized = 0,
    Initialized = 1,
    Serving = 2,
    Closing = 3,
    Closed = 4,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::Initialized,
            2 => Self::Serving,
            3 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Atomic holder so the state can be read from the dispatch path and
/// advanced from the serve loop without a lock.
pub struct SessionStateCell(AtomicU8);

impl Default for SessionStateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateCell {
    #[must_use]
    pub fn new() -> Self {
        Self(AtomicU8::new(SessionState::Uninitialized as u8))
    }

    #[must_use]
    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Whether a request for `method` is admissible in the current state.
    /// `initialize` is the only method accepted before `Initialized`;
    /// everything is rejected once `Closing` or `Closed`.
    #[must_use]
    pub fn admits(&self, method: &str) -> Result<(), SessionAdmissionError> {
        match self.get() {
            SessionState::Uninitialized if method != "initialize" => {
                Err(SessionAdmissionError::NotInitialized)
            }
            SessionState::Closing | SessionState::Closed => Err(SessionAdmissionError::ShuttingDown),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionAdmissionError {
    #[error("session is not initialized")]
    NotInitialized,
    #[error("session is shutting down")]
    ShuttingDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_initialize_is_admitted_before_initialized() {
        let cell = SessionStateCell::new();
        assert!(cell.admits("initialize").is_ok());
        assert_eq!(
            cell.admits("tools/list").unwrap_err(),
            SessionAdmissionError::NotInitialized
        );
    }

    #[test]
    fn closing_rejects_everything() {
        let cell = SessionStateCell::new();
        cell.set(SessionState::Closing);
        assert_eq!(
            cell.admits("tools/list").unwrap_err(),
            SessionAdmissionError::ShuttingDown
        );
        assert_eq!(
            cell.admits("initialize").unwrap_err(),
            SessionAdmissionError::ShuttingDown
        );
    }

    #[test]
    fn serving_admits_any_method() {
        let cell = SessionStateCell::new();
        cell.set(SessionState::Serving);
        assert!(cell.admits("tools/call").is_ok());
    }
}
