//! Resource lookup behind `resources/list` and `resources/read`.
//!
//! The broker owns no workflow state itself — `sf-engine` does — so this is
//! a small seam the engine (or a test double) implements, rather than a
//! direct dependency on `sf-checkpoint`/`sf-engine` from this crate.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;

#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// `scan://results/{scan_id}`. `None` if no such scan is known.
    async fn scan_result(&self, scan_id: &str) -> Option<Value>;

    /// `scan://history`.
    async fn history(&self) -> Value;
}

/// Reference in-memory provider: enough for a broker run standalone (e.g.
/// under the CLI's `broker` subcommand) or in tests, backed by whatever
/// results the caller records as scans complete.
#[derive(Default)]
pub struct InMemoryResourceProvider {
    results: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryResourceProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, scan_id: impl Into<String>, result: Value) {
        self.results
            .write()
            .expect("resource provider lock poisoned")
            .insert(scan_id.into(), result);
    }
}

#[async_trait]
impl ResourceProvider for InMemoryResourceProvider {
    async fn scan_result(&self, scan_id: &str) -> Option<Value> {
        self.results
            .read()
            .expect("resource provider lock poisoned")
            .get(scan_id)
            .cloned()
    }

    async fn history(&self) -> Value {
        let results = self.results.read().expect("resource provider lock poisoned");
        Value::Array(
            results
                .keys()
                .map(|scan_id| Value::String(scan_id.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unknown_scan_id_returns_none() {
        let provider = InMemoryResourceProvider::new();
        assert!(provider.scan_result("nope").await.is_none());
    }

    #[tokio::test]
    async fn recorded_scan_is_retrievable() {
        let provider = InMemoryResourceProvider::new();
        provider.record("scan-1", json!({"success": true}));
        let result = provider.scan_result("scan-1").await.unwrap();
        assert_eq!(result["success"], true);
        let history = provider.history().await;
        assert_eq!(history, json!(["scan-1"]));
    }
}
