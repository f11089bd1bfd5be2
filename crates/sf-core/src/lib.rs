//! scanforge-core - foundation types, error taxonomy, and filesystem primitives
//!
//! Shared by every other `sf-*` crate: stable id newtypes, the workspace-wide
//! error taxonomy and exit code mapping, atomic file writes, structured
//! logging setup, and the advisory workflow lock.

pub mod atomic_write;
pub mod error;
pub mod exit_codes;
pub mod lock;
pub mod logging;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use exit_codes::ExitCode;
pub use types::{CvssScore, FindingId, ScanId, WorkflowId};
