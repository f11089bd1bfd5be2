//! Drives a scenario's node plan from `PENDING` to a terminal phase (or a
//! `PAUSED` stop at `human_review`), checkpointing after every node so any
//! run can resume from the last persisted state.
//!
//! This crate owns orchestration only: tool execution lives in
//! `sf-adapter-api`/`sf-adapters`, scheduling/retry in `sf-scheduler`,
//! plan shapes in `sf-templates`, and durable state in `sf-checkpoint`.

pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod node;
pub mod request;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::{EngineContext, DEFAULT_NODE_BUDGET};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use events::{EventSink, InMemoryEventLog, NullEventSink};
pub use node::{kind_name, NodeOutcome};
pub use request::WorkflowOptions;
