//! The unit of dispatch: a factory that produces a fresh future per attempt
//! (retries need a new future each time, since a `Future` is single-use),
//! resolving to either a success value or a taxonomized failure.

use std::future::Future;
use std::pin::Pin;

use sf_adapter_api::CancellationToken;

use crate::config::FailureClass;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A task that can be attempted (and retried) independently of every other
/// task the scheduler is running. Called once per attempt with a fresh
/// clone of the shared cancellation token.
pub trait Task<T>: Send + Sync {
    fn attempt(&self, cancellation: CancellationToken) -> BoxFuture<Result<T, FailureClass>>;
}

impl<T, F, Fut> Task<T> for F
where
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, FailureClass>> + Send + 'static,
{
    fn attempt(&self, cancellation: CancellationToken) -> BoxFuture<Result<T, FailureClass>> {
        Box::pin(self(cancellation))
    }
}
