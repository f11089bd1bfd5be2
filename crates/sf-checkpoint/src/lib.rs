//! Checkpoint persistence: the interface the engine drives and a file-backed
//! reference implementation of it.
//!
//! The engine treats the store as an external service with idempotent writes
//! keyed by `(workflow_id, checkpoint_seq)`; this crate owns only the
//! interface and the reference implementation, not engine policy.

mod error;
mod file_store;
mod store;

pub use error::{CheckpointError, CheckpointResult};
pub use file_store::FileStore;
pub use store::{CheckpointStore, WorkflowMetadata};
