//! Process-wide tool registry.
//!
//! Read-mostly: lookup/list/filter happen on every scheduled task, so they
//! take a read lock; register/deregister are startup/shutdown-time
//! operations and take a write lock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use sf_adapter_api::Adapter;
use sf_core::types::ToolId;
use sf_schema::capability::Category;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool_id {0} is already registered")]
    DuplicateToolId(String),
    #[error("tool_id {0} is not registered")]
    NotFound(String),
    #[error("tool_id {0} has {in_flight} in-flight execution(s); cannot deregister")]
    InFlight { tool_id: String, in_flight: usize },
}

struct Entry {
    adapter: Arc<dyn Adapter>,
    in_flight: Arc<AtomicUsize>,
}

/// Releases its tool's in-flight counter on drop, so a panicking or
/// early-returning task never leaves the registry thinking a tool is
/// permanently busy.
pub struct ExecutionGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct Registry {
    entries: RwLock<BTreeMap<ToolId, Entry>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent in the sense of being safe to call repeatedly with
    /// different adapters; rejects a second registration under the same
    /// `tool_id` rather than silently overwriting it.
    pub fn register(&self, adapter: Arc<dyn Adapter>) -> Result<(), RegistryError> {
        let tool_id = adapter.describe().tool_id;
        let mut entries = self.entries.write().expect("registry lock poisoned");
        if entries.contains_key(&tool_id) {
            return Err(RegistryError::DuplicateToolId(tool_id.into_string()));
        }
        entries.insert(
            tool_id,
            Entry {
                adapter,
                in_flight: Arc::new(AtomicUsize::new(0)),
            },
        );
        Ok(())
    }

    /// Requires zero in-flight executions for `tool_id`.
    pub fn deregister(&self, tool_id: &ToolId) -> Result<(), RegistryError> {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        let Some(entry) = entries.get(tool_id) else {
            return Err(RegistryError::NotFound(tool_id.as_str().to_string()));
        };
        let in_flight = entry.in_flight.load(Ordering::SeqCst);
        if in_flight > 0 {
            return Err(RegistryError::InFlight {
                tool_id: tool_id.as_str().to_string(),
                in_flight,
            });
        }
        entries.remove(tool_id);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, tool_id: &ToolId) -> Option<Arc<dyn Adapter>> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(tool_id)
            .map(|entry| Arc::clone(&entry.adapter))
    }

    /// Mark one execution as started against `tool_id`; the returned guard
    /// decrements the counter when dropped. Returns `None` if the tool isn't
    /// registered.
    #[must_use]
    pub fn begin_execution(&self, tool_id: &ToolId) -> Option<ExecutionGuard> {
        let entries = self.entries.read().expect("registry lock poisoned");
        let entry = entries.get(tool_id)?;
        entry.in_flight.fetch_add(1, Ordering::SeqCst);
        Some(ExecutionGuard {
            in_flight: Arc::clone(&entry.in_flight),
        })
    }

    #[must_use]
    pub fn list(&self) -> Vec<Arc<dyn Adapter>> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .values()
            .map(|entry| Arc::clone(&entry.adapter))
            .collect()
    }

    #[must_use]
    pub fn filter_by_category(&self, category: Category) -> Vec<Arc<dyn Adapter>> {
        self.list()
            .into_iter()
            .filter(|adapter| adapter.describe().category == category)
            .collect()
    }

    #[must_use]
    pub fn filter_by_language(&self, language: &str) -> Vec<Arc<dyn Adapter>> {
        self.list()
            .into_iter()
            .filter(|adapter| adapter.describe().supported_languages.contains(language))
            .collect()
    }

    #[must_use]
    pub fn filter_by_detection_type(&self, detection_type: &str) -> Vec<Arc<dyn Adapter>> {
        self.list()
            .into_iter()
            .filter(|adapter| adapter.describe().detection_types.contains(detection_type))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semgrep::SemgrepAdapter;
    use crate::trivy::TrivyAdapter;

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = Registry::new();
        registry.register(Arc::new(SemgrepAdapter::default())).unwrap();
        let err = registry.register(Arc::new(SemgrepAdapter::default())).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateToolId(_)));
    }

    #[test]
    fn deregister_with_in_flight_execution_is_rejected() {
        let registry = Registry::new();
        let adapter = Arc::new(SemgrepAdapter::default());
        let tool_id = adapter.describe().tool_id;
        registry.register(adapter).unwrap();
        let guard = registry.begin_execution(&tool_id).unwrap();
        let err = registry.deregister(&tool_id).unwrap_err();
        assert!(matches!(err, RegistryError::InFlight { .. }));
        drop(guard);
        registry.deregister(&tool_id).unwrap();
    }

    #[test]
    fn filter_by_category_returns_only_matching_adapters() {
        let registry = Registry::new();
        registry.register(Arc::new(SemgrepAdapter::default())).unwrap();
        registry.register(Arc::new(TrivyAdapter::default())).unwrap();
        let sast = registry.filter_by_category(Category::Sast);
        assert_eq!(sast.len(), 1);
        assert_eq!(sast[0].describe().tool_id.as_str(), "semgrep");
    }
}
