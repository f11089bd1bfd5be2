//! Bounded-concurrency dispatcher: up to `max_parallel` tasks run at once;
//! each task is retried under its own deadline and the configured backoff.
//! Completion is reported only through [`SchedulerEvent`]s — the scheduler
//! never calls back into whatever drives it, breaking the cyclic
//! engine/scheduler reference with a pure message interface.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use sf_adapter_api::CancellationToken;

use crate::config::{FailureClass, SchedulerConfig};
use crate::task::Task;

#[derive(Debug, Clone)]
pub enum SchedulerEvent<K> {
    AttemptStarted { id: K, attempt: u32 },
    AttemptFailed { id: K, attempt: u32, class: FailureClass },
    TaskSucceeded { id: K },
    TaskFailed { id: K, class: FailureClass },
    TaskCanceled { id: K },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerOutcomeError {
    /// Retries were exhausted (or the failure was never retryable) on this
    /// class of failure.
    Exhausted(FailureClass),
    Canceled,
}

pub struct Scheduler {
    config: SchedulerConfig,
    semaphore: Arc<Semaphore>,
}

impl Scheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_parallel.max(1)));
        Self { config, semaphore }
    }

    /// Run every task to completion (success, exhausted retries, or
    /// cancellation), bounded at `max_parallel` concurrently. Tasks still
    /// queued when `cancellation` fires never start.
    pub async fn run_all<K, T>(
        &self,
        tasks: Vec<(K, Arc<dyn Task<T>>)>,
        cancellation: CancellationToken,
        events: Option<mpsc::UnboundedSender<SchedulerEvent<K>>>,
    ) -> Vec<(K, Result<T, SchedulerOutcomeError>)>
    where
        K: Clone + Send + 'static,
        T: Send + 'static,
    {
        let mut joins = JoinSet::new();
        for (id, task) in tasks {
            let semaphore = Arc::clone(&self.semaphore);
            let cancellation = cancellation.clone();
            let retry = self.config.retry.clone();
            let timeout = self.config.per_task_timeout;
            let events = events.clone();
            joins.spawn(async move {
                let result = run_one(id.clone(), &*task, &semaphore, &cancellation, &retry, timeout, &events).await;
                (id, result)
            });
        }

        let mut results = Vec::with_capacity(joins.len());
        while let Some(joined) = joins.join_next().await {
            match joined {
                Ok(pair) => results.push(pair),
                Err(e) => warn!(error = %e, "scheduled task panicked"),
            }
        }
        results
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_one<K, T>(
    id: K,
    task: &dyn Task<T>,
    semaphore: &Semaphore,
    cancellation: &CancellationToken,
    retry: &crate::config::RetryPolicy,
    timeout: Duration,
    events: &Option<mpsc::UnboundedSender<SchedulerEvent<K>>>,
) -> Result<T, SchedulerOutcomeError>
where
    K: Clone,
{
    for attempt in 0..=retry.max_retries {
        if cancellation.is_canceled() {
            emit(events, SchedulerEvent::TaskCanceled { id: id.clone() });
            return Err(SchedulerOutcomeError::Canceled);
        }

        let permit = tokio::select! {
            permit = semaphore.acquire() => permit.expect("semaphore is never closed"),
            () = cancellation.canceled() => {
                emit(events, SchedulerEvent::TaskCanceled { id: id.clone() });
                return Err(SchedulerOutcomeError::Canceled);
            }
        };

        emit(events, SchedulerEvent::AttemptStarted { id: id.clone(), attempt });
        let outcome = tokio::time::timeout(timeout, task.attempt(cancellation.clone())).await;
        drop(permit);

        let class = match outcome {
            Ok(Ok(value)) => {
                emit(events, SchedulerEvent::TaskSucceeded { id: id.clone() });
                return Ok(value);
            }
            Ok(Err(class)) => class,
            Err(_elapsed) => FailureClass::Timeout,
        };

        let is_last_attempt = attempt == retry.max_retries;
        if is_last_attempt || !retry.should_retry(class) {
            emit(events, SchedulerEvent::TaskFailed { id: id.clone(), class });
            return Err(SchedulerOutcomeError::Exhausted(class));
        }

        emit(events, SchedulerEvent::AttemptFailed { id: id.clone(), attempt, class });
        let backoff = retry.backoff_for_attempt(attempt);
        debug!(attempt, ?backoff, "retrying after backoff");
        tokio::select! {
            () = tokio::time::sleep(backoff) => {}
            () = cancellation.canceled() => {
                emit(events, SchedulerEvent::TaskCanceled { id: id.clone() });
                return Err(SchedulerOutcomeError::Canceled);
            }
        }
    }

    unreachable!("loop always returns before exhausting 0..=max_retries")
}

fn emit<K>(events: &Option<mpsc::UnboundedSender<SchedulerEvent<K>>>, event: SchedulerEvent<K>) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
