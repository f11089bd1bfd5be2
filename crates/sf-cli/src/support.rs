//! Shared plumbing every subcommand needs: building an `Engine` from
//! effective configuration, and printing a result as text or JSON.

use std::str::FromStr;
use std::sync::Arc;

use sf_checkpoint::FileStore;
use sf_core::ExitCode;
use sf_engine::{Engine, EngineContext};
use sf_schema::severity::SeverityLevel;
use serde::Serialize;

use crate::config::Config;
use crate::exit_codes::engine_error_exit_code;

/// Parses a `--severity-floor`-style flag value; shared by `run` (via
/// effective configuration) and `gate` (which takes its own flag).
pub fn parse_severity(raw: &str) -> Result<SeverityLevel, ExitCode> {
    SeverityLevel::from_str(&raw.to_uppercase()).map_err(|_| {
        tracing::error!(severity = %raw, "unrecognized severity level");
        ExitCode::CLI_ARGS
    })
}

/// Builds the process-scope handle every run/resume/cancel/status command
/// constructs fresh from effective configuration, per the explicit-handle
/// pattern `EngineContext` replaces a global singleton with.
#[must_use]
pub fn build_engine(config: &Config) -> Engine {
    let registry = Arc::new(sf_adapters::default_registry());
    let store = Arc::new(FileStore::new(config.checkpoint_dir.clone()));
    let ctx = EngineContext::new(registry, store).with_scheduler_config((&config.scheduler).into());
    Engine::new(ctx)
}

pub fn build_store(config: &Config) -> Arc<FileStore> {
    Arc::new(FileStore::new(config.checkpoint_dir.clone()))
}

pub fn map_engine_error(err: sf_engine::EngineError) -> ExitCode {
    tracing::error!(error = %err, "engine error");
    engine_error_exit_code(&err)
}

pub fn map_checkpoint_error(err: sf_checkpoint::CheckpointError) -> ExitCode {
    tracing::error!(error = %err, "checkpoint store error");
    ExitCode::CHECKPOINT_IO
}

/// Prints `value` as pretty JSON when `json` is set, otherwise runs
/// `text` to print the human-readable form.
pub fn emit<T: Serialize>(value: &T, json: bool, text: impl FnOnce(&T)) {
    if json {
        println!("{}", serde_json::to_string_pretty(value).expect("value always serializes"));
    } else {
        text(value);
    }
}
