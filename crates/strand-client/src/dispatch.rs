//! Event dispatch tables and the acknowledgment sink.
//!
//! Two tables keyed by event/channel name: fire-and-forget handlers and
//! ack-capable handlers. Registration overwrites; dispatch misses are silent
//! no-ops. Entries belong to the client, not the connection, so they survive
//! reconnects.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use strand_proto::Envelope;

use crate::error::ClientError;
use crate::transport::Transport;

/// Fire-and-forget handler: `(event_name, data)`.
pub type PlainHandler = Arc<dyn Fn(&str, &Value) + Send + Sync>;
/// Ack-capable handler: `(event_name, data, sink)`.
pub type AckHandler = Arc<dyn Fn(&str, &Value, AckSink) + Send + Sync>;

/// One-shot reply channel for an inbound event that carried a call id.
///
/// The handler may call [`send`](AckSink::send) synchronously or hand the
/// sink to another task; either way the reply envelope carries the original
/// call id.
pub struct AckSink {
    transport: Arc<dyn Transport>,
    cid: u64,
}

impl AckSink {
    pub(crate) fn new(transport: Arc<dyn Transport>, cid: u64) -> Self {
        Self { transport, cid }
    }

    /// Call id this sink replies to.
    pub fn cid(&self) -> u64 {
        self.cid
    }

    /// Send the acknowledgment reply, consuming the sink.
    pub fn send(self, error: Option<Value>, data: Option<Value>) -> Result<(), ClientError> {
        let frame = Envelope::ack_reply(self.cid, error, data).encode()?;
        self.transport.send_text(&frame)
    }
}

/// Dual dispatch tables.
#[derive(Default)]
pub struct DispatchTable {
    plain: DashMap<String, PlainHandler>,
    ack: DashMap<String, AckHandler>,
}

impl DispatchTable {
    /// Empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the plain handler for `name`.
    pub fn register_plain(&self, name: &str, handler: PlainHandler) {
        drop(self.plain.insert(name.into(), handler));
    }

    /// Register (or replace) the ack-capable handler for `name`.
    pub fn register_ack(&self, name: &str, handler: AckHandler) {
        drop(self.ack.insert(name.into(), handler));
    }

    /// Whether an ack-capable handler exists for `name`.
    pub fn has_ack_handler(&self, name: &str) -> bool {
        self.ack.contains_key(name)
    }

    /// Invoke the plain handler for `name`, if any. Returns whether one ran.
    pub fn dispatch_plain(&self, name: &str, data: &Value) -> bool {
        // Clone the Arc out so no shard lock is held across the handler.
        let handler = self.plain.get(name).map(|h| Arc::clone(h.value()));
        match handler {
            Some(handler) => {
                handler(name, data);
                true
            }
            None => false,
        }
    }

    /// Invoke the ack-capable handler for `name`, if any. Returns whether one
    /// ran; when it did not, the sink is dropped and the peer's requested
    /// acknowledgment is never sent.
    pub fn dispatch_ack(&self, name: &str, data: &Value, sink: AckSink) -> bool {
        let handler = self.ack.get(name).map(|h| Arc::clone(h.value()));
        match handler {
            Some(handler) => {
                handler(name, data, sink);
                true
            }
            None => false,
        }
    }
}
