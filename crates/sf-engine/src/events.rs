//! Event stream: the engine emits a totally-ordered, idempotent-keyed
//! `(workflow_id, seq)` sequence of [`WorkflowEvent`]s as it drives a
//! workflow. Subscribers attach through an [`EventSink`]; this crate ships
//! an in-memory reference sink good enough to back the CLI's `status --watch`
//! and the broker's progress surface within one process lifetime.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use sf_core::types::WorkflowId;
use sf_schema::workflow::{TimestampedEvent, WorkflowEvent};

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, workflow_id: &WorkflowId, event: TimestampedEvent);
}

/// Discards every event. Used where only the checkpointed state matters
/// (batch CLI runs, most tests).
#[derive(Default)]
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn emit(&self, _workflow_id: &WorkflowId, _event: TimestampedEvent) {}
}

/// Keeps every event emitted for each workflow this process has driven.
/// `events_since` lets a reconnecting subscriber ask for only what it
/// missed; a subscriber reconnecting after a process restart (with no
/// in-memory log) instead replays from the most recent checkpoint via
/// [`sf_checkpoint::CheckpointStore`], per spec — this sink only covers the
/// in-process case.
#[derive(Default)]
pub struct InMemoryEventLog {
    events: RwLock<BTreeMap<WorkflowId, Vec<TimestampedEvent>>>,
}

impl InMemoryEventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events_since(&self, workflow_id: &WorkflowId, last_seen_seq: Option<u64>) -> Vec<TimestampedEvent> {
        let log = self.events.read().expect("event log lock poisoned");
        let Some(events) = log.get(workflow_id) else {
            return Vec::new();
        };
        match last_seen_seq {
            Some(seq) => events.iter().filter(|e| e.seq > seq).cloned().collect(),
            None => events.clone(),
        }
    }
}

#[async_trait]
impl EventSink for InMemoryEventLog {
    async fn emit(&self, workflow_id: &WorkflowId, event: TimestampedEvent) {
        let mut log = self.events.write().expect("event log lock poisoned");
        log.entry(workflow_id.clone()).or_default().push(event);
    }
}

/// Helper the engine uses to mint the next `(seq, event)` pair and push it
/// through a sink in one call.
pub(crate) struct EventEmitter<'a> {
    pub sink: &'a dyn EventSink,
}

impl<'a> EventEmitter<'a> {
    pub async fn emit(&self, workflow_id: &WorkflowId, seq: &mut u64, event: WorkflowEvent) {
        let timestamped = TimestampedEvent {
            seq: *seq,
            at: Utc::now(),
            event,
        };
        *seq += 1;
        self.sink.emit(workflow_id, timestamped).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_since_filters_already_seen() {
        let log = InMemoryEventLog::new();
        let workflow_id = WorkflowId::new("wf-1");
        let emitter = EventEmitter { sink: &log };
        let mut seq = 0;
        emitter.emit(&workflow_id, &mut seq, WorkflowEvent::WorkflowStarted).await;
        emitter.emit(&workflow_id, &mut seq, WorkflowEvent::Progress { value: 0.5 }).await;
        emitter
            .emit(&workflow_id, &mut seq, WorkflowEvent::Progress { value: 1.0 })
            .await;

        let all = log.events_since(&workflow_id, None);
        assert_eq!(all.len(), 3);

        let since_first = log.events_since(&workflow_id, Some(0));
        assert_eq!(since_first.len(), 2);
        assert_eq!(since_first[0].seq, 1);
    }

    #[tokio::test]
    async fn unknown_workflow_has_no_events() {
        let log = InMemoryEventLog::new();
        assert!(log.events_since(&WorkflowId::new("ghost"), None).is_empty());
    }
}
