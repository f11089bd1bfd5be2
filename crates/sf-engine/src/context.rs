//! Process-scope handle the engine is constructed with: the tool registry,
//! the scheduler, the checkpoint store, and the event sink. Replaces the
//! global-singleton pattern with an explicit handle passed in at startup;
//! tests substitute a fresh one per test.

use std::sync::Arc;
use std::time::Duration;

use sf_adapters::Registry;
use sf_checkpoint::CheckpointStore;
use sf_scheduler::{Scheduler, SchedulerConfig};

use crate::events::{EventSink, NullEventSink};

/// Per-node time budget: one of the three deadlines a scan task's
/// `min(node budget, adapter timeout, request limit)` is drawn from.
pub const DEFAULT_NODE_BUDGET: Duration = Duration::from_secs(600);

pub struct EngineContext {
    pub registry: Arc<Registry>,
    pub scheduler: Arc<Scheduler>,
    pub store: Arc<dyn CheckpointStore>,
    pub events: Arc<dyn EventSink>,
    pub node_budget: Duration,
}

impl EngineContext {
    #[must_use]
    pub fn new(registry: Arc<Registry>, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            registry,
            scheduler: Arc::new(Scheduler::new(SchedulerConfig::default())),
            store,
            events: Arc::new(NullEventSink),
            node_budget: DEFAULT_NODE_BUDGET,
        }
    }

    #[must_use]
    pub fn with_scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = Arc::new(Scheduler::new(config));
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn with_node_budget(mut self, budget: Duration) -> Self {
        self.node_budget = budget;
        self
    }
}
