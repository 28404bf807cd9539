//! Concurrent, fire-and-forget function dispatch.
//!
//! Every matched target gets its own tokio task. Tasks are not ordered
//! relative to each other or to the listener, are never cancelled, and are
//! not retried. Each task re-reads the record, so two dispatches for the
//! same key may observe different snapshots.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use evrouter_core::DispatchEnvelope;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::invoke::{FunctionInvoker, InvocationOutput};
use crate::lifecycle::RouterLifecycle;
use crate::store::RecordStore;

/// Fetches record snapshots and invokes target functions.
pub struct Dispatcher {
    store: Arc<dyn RecordStore>,
    invoker: Arc<dyn FunctionInvoker>,
    lifecycle: Arc<RouterLifecycle>,
    limiter: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    /// Creates a dispatcher.
    ///
    /// `max_concurrent` of 0 leaves fan-out unbounded; any other value caps
    /// how many invocations run at once (excess tasks wait for a permit).
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        invoker: Arc<dyn FunctionInvoker>,
        lifecycle: Arc<RouterLifecycle>,
        max_concurrent: usize,
    ) -> Self {
        let limiter = (max_concurrent > 0).then(|| Arc::new(Semaphore::new(max_concurrent)));
        Self {
            store,
            invoker,
            lifecycle,
            limiter,
        }
    }

    /// Reads `object_key`, wraps it in a [`DispatchEnvelope`], and invokes `target`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if the fetch, the encoding, or the
    /// invocation fails.
    pub async fn dispatch(
        &self,
        object_key: &str,
        target: &str,
    ) -> Result<InvocationOutput, DispatchError> {
        let fields = self.store.fetch_fields(object_key).await?;
        let envelope = DispatchEnvelope::from_record(object_key, &fields).map_err(|source| {
            DispatchError::Encode {
                key: object_key.to_string(),
                source,
            }
        })?;
        let payload = envelope.to_bytes().map_err(|source| DispatchError::Encode {
            key: object_key.to_string(),
            source,
        })?;

        let output = self.invoker.invoke(target, Bytes::from(payload)).await?;
        Ok(output)
    }

    /// Spawns one independent dispatch task per target and returns immediately.
    ///
    /// Duplicated targets are dispatched once per occurrence. Errors are
    /// logged inside the task and never reach the caller; the handles exist
    /// only so callers may observe completion.
    pub fn spawn_all(self: &Arc<Self>, object_key: &str, targets: Vec<String>) -> Vec<JoinHandle<()>> {
        targets
            .into_iter()
            .map(|target| self.spawn_one(object_key.to_string(), target))
            .collect()
    }

    fn spawn_one(self: &Arc<Self>, object_key: String, target: String) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        // Counted before spawning so the dispatch is visible immediately.
        let guard = self.lifecycle.in_flight_guard();
        let dispatch_id = Uuid::new_v4();

        let span = info_span!(
            "dispatch",
            %dispatch_id,
            key = %object_key,
            target = %target,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        tokio::spawn(
            async move {
                let _guard = guard;
                let _permit = match &dispatcher.limiter {
                    // The semaphore is never closed.
                    Some(limiter) => Arc::clone(limiter).acquire_owned().await.ok(),
                    None => None,
                };

                let start = Instant::now();
                let result = dispatcher.dispatch(&object_key, &target).await;

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = start.elapsed().as_millis() as u64;
                let outcome = if result.is_ok() { "ok" } else { "error" };
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                match result {
                    Ok(output) => {
                        tracing::info!(status = output.status, duration_ms, "dispatch complete");
                        debug!(
                            response = %String::from_utf8_lossy(&output.payload),
                            "function response"
                        );
                    }
                    Err(e) => warn!(error = %e, duration_ms, "dispatch failed"),
                }
                dispatcher.lifecycle.record_completed();
            }
            .instrument(span),
        )
    }
}
