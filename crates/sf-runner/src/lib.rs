//! Cross-platform process execution for adapters that shell out to a binary.
//!
//! All execution goes through [`CommandSpec`] — argv-style only, never a
//! shell string — and [`AsyncProcessRunner::run`] enforces the deadline and
//! the cooperative-cancellation grace period (terminate, then kill after 5s)
//! that every adapter and the scheduler rely on.

pub mod command_spec;
pub mod error;
pub mod process;

pub use command_spec::CommandSpec;
pub use error::RunnerError;
pub use process::{AsyncProcessRunner, ProcessOutput, TokioProcessRunner};
