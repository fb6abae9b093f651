//! Correlation registry for acknowledged calls.
//!
//! Every acknowledged outbound call registers a pending record keyed by its
//! call id. Three paths race to finish a record: the matching reply arrives,
//! the per-call timeout fires, or the session scope is torn down. The
//! [`DashMap::remove`] on the shared map is the single arbiter — whichever
//! path removes the entry owns the callback, so it is invoked exactly once.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Callback invoked with `(event_name, error, data)` when a pending call
/// resolves.
///
/// `Sync` is required because records live in the shared map and the timeout
/// watchers run on other tasks.
pub type AckCallback =
    Box<dyn FnOnce(&str, Option<Value>, Option<Value>) + Send + Sync + 'static>;

struct PendingAck {
    event_name: String,
    callback: AckCallback,
    timer: CancellationToken,
}

/// Concurrent map of call id → pending acknowledgment record.
pub struct AckRegistry {
    pending: Arc<DashMap<u64, PendingAck>>,
}

impl AckRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Store a pending record and start its timeout watcher. Returns whether
    /// the record was accepted.
    ///
    /// The watcher is bounded by `scope`: cancelling the scope resolves the
    /// record with a cancellation error instead of waiting out the timeout.
    /// A scope that is already cancelled refuses the record outright — the
    /// watcher would fire the cancellation error immediately, racing whatever
    /// the caller does with the send, and the callback must resolve through
    /// exactly one path. The caller guarantees `id` is fresh (monotonic
    /// counter). Must run inside a tokio runtime.
    pub fn register(
        &self,
        id: u64,
        event_name: &str,
        timeout: Duration,
        scope: &CancellationToken,
        callback: AckCallback,
    ) -> bool {
        if scope.is_cancelled() {
            debug!(cid = id, event = event_name, "scope closed; ack not registered");
            return false;
        }
        let timer = scope.child_token();
        let previous = self.pending.insert(
            id,
            PendingAck {
                event_name: event_name.into(),
                callback,
                timer: timer.clone(),
            },
        );
        if previous.is_some() {
            warn!(cid = id, "pending ack overwritten; call ids must be fresh");
        }

        let pending = Arc::clone(&self.pending);
        drop(tokio::spawn(async move {
            let timed_out = tokio::select! {
                () = timer.cancelled() => false,
                () = tokio::time::sleep(timeout) => true,
            };
            // Remove-if-present decides the race against `resolve`.
            if let Some((_, record)) = pending.remove(&id) {
                let error = if timed_out {
                    debug!(cid = id, event = %record.event_name, "ack timed out");
                    timeout_error(&record.event_name)
                } else {
                    debug!(cid = id, event = %record.event_name, "ack cancelled by teardown");
                    cancel_error(&record.event_name)
                };
                (record.callback)(&record.event_name, Some(error), None);
            }
        }));
        true
    }

    /// Resolve the record for `id` with a reply's error/data.
    ///
    /// A miss is a logged no-op: late replies after timeout are expected
    /// under network delay.
    pub fn resolve(&self, id: u64, error: Option<Value>, data: Option<Value>) {
        match self.pending.remove(&id) {
            Some((_, record)) => {
                record.timer.cancel();
                (record.callback)(&record.event_name, error, data);
            }
            None => debug!(rid = id, "no pending ack for reply"),
        }
    }

    /// Drop the record for `id` without invoking its callback.
    ///
    /// Used when the send itself failed: the caller already holds the error
    /// synchronously, so the callback must never fire.
    pub fn discard(&self, id: u64) -> bool {
        match self.pending.remove(&id) {
            Some((_, record)) => {
                record.timer.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of still-pending records.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for AckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn timeout_error(event_name: &str) -> Value {
    json!({
        "name": "TimeoutError",
        "message": format!("acknowledgment for '{event_name}' timed out"),
    })
}

fn cancel_error(event_name: &str) -> Value {
    json!({
        "name": "AbortError",
        "message": format!("session closed before acknowledgment for '{event_name}'"),
    })
}
