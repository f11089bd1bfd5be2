//! Bounded-concurrency task dispatch for tool-run tasks: a cooperative
//! dispatcher holds up to `max_parallel` tasks running at once, retries
//! retryable failures with exponential backoff under a per-task deadline,
//! and reports completion only through events — never a callback into the
//! caller's own state.

pub mod config;
pub mod dispatcher;
pub mod task;

pub use config::{FailureClass, RetryPolicy, SchedulerConfig};
pub use dispatcher::{Scheduler, SchedulerEvent, SchedulerOutcomeError};
pub use task::{BoxFuture, Task};
