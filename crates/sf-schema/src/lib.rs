//! Shared data model for scanforge: capability descriptors,
//! scan requests, unified findings, and workflow state, plus the severity/CWE
//! normalization table that every adapter output is pushed through before it
//! becomes a [`finding::UnifiedFinding`].
//!
//! This crate is pure data + pure functions: no process execution, no I/O.
//! Adapters live in `sf-adapters`; the DAG that drives a workflow lives in
//! `sf-engine`. Keeping the schema crate free of both lets every other crate
//! depend on it without pulling in tokio or a process-execution stack.

pub mod capability;
pub mod cwe;
pub mod finding;
pub mod request;
pub mod severity;
pub mod workflow;

pub use capability::{CapabilityDescriptor, Category, ExecutionProfile, InputRequirements, TargetKind};
pub use cwe::extract_cwe;
pub use finding::{
    Confidence, Description, Location, Severity, SourceToolRef, UnifiedFinding, VerificationStatus,
    VulnerabilityType,
};
pub use request::{ScanContext, ScanLimits, ScanOptions, ScanRequest, ScanType, Target};
pub use severity::{Exploitability, SeverityLevel};
pub use workflow::{
    CheckpointId, NodeKind, NodeResult, NodeSpec, NodeStatus, WorkflowEvent, WorkflowPhase,
    WorkflowState,
};
