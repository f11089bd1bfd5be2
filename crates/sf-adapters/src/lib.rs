//! Built-in tool adapters and the process-wide registry.
//!
//! Every adapter here follows the same shape: `describe()` is a static
//! descriptor, `validate()` checks the request against it, `execute()`
//! shells out through `sf-runner`, and `parse()` maps the tool's native JSON
//! into `sf-schema::UnifiedFinding`. IAST and Fuzzing are valid
//! [`sf_schema::Category`] values with no built-in adapter here — the
//! `Adapter` trait is general enough for a third party to add them without
//! engine changes.

pub mod common;
pub mod gitleaks;
pub mod osv_scanner;
pub mod registry;
pub mod semgrep;
pub mod trivy;
pub mod zap_baseline;

pub use registry::{Registry, RegistryError};

use std::sync::Arc;

use sf_adapter_api::Adapter;

/// Construct a registry with every built-in adapter already registered via
/// explicit registration calls at startup, the shape the CLI's
/// `doctor`/`run` commands start from.
#[must_use]
pub fn default_registry() -> Registry {
    let registry = Registry::new();
    let adapters: Vec<Arc<dyn Adapter>> = vec![
        Arc::new(semgrep::SemgrepAdapter::default()),
        Arc::new(trivy::TrivyAdapter::default()),
        Arc::new(osv_scanner::OsvScannerAdapter::default()),
        Arc::new(zap_baseline::ZapBaselineAdapter::default()),
        Arc::new(gitleaks::GitleaksAdapter::default()),
    ];
    for adapter in adapters {
        registry
            .register(adapter)
            .expect("built-in tool_ids are distinct by construction");
    }
    registry
}
