//! The three stage events `Adapter::run`'s default implementation emits.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub enum AdapterEvent {
    Validated,
    Executed { duration: Duration, partial: bool },
    Parsed { finding_count: usize },
}
