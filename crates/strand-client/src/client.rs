//! Protocol engine façade.
//!
//! Owns the session state, correlation registry, and dispatch tables; wires
//! inbound text through the keepalive filter, wire codec, and classifier to
//! the appropriate handler; builds and sends outbound envelopes.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use strand_proto::{Envelope, Intent, PublishPayload, classify, keepalive_reply};

use crate::config::ClientConfig;
use crate::dispatch::{AckHandler, AckSink, DispatchTable, PlainHandler};
use crate::error::ClientError;
use crate::listeners::Listeners;
use crate::registry::{AckCallback, AckRegistry};
use crate::session::Session;
use crate::transport::Transport;

/// Connection/authentication state of the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnState {
    /// No live connection.
    Disconnected,
    /// Transport open, handshake sent, auth status unknown.
    Connected,
    /// Server reported unauthenticated; login call in flight.
    Authenticating,
    /// Session is authenticated.
    Authenticated,
}

/// The protocol engine.
///
/// Cheap to clone; all clones share the same session, registry, and tables.
/// Public calls may be issued concurrently from any task; inbound frames are
/// expected to arrive serially per connection (one `handle_text` at a time),
/// which is what a websocket read loop gives naturally.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    session: Session,
    registry: AckRegistry,
    dispatch: DispatchTable,
    listeners: Mutex<Listeners>,
    state: Mutex<ConnState>,
    config: ClientConfig,
}

impl Client {
    /// Engine over the given transport.
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                session: Session::new(),
                registry: AckRegistry::new(),
                dispatch: DispatchTable::new(),
                listeners: Mutex::new(Listeners::default()),
                state: Mutex::new(ConnState::Disconnected),
                config,
            }),
        }
    }

    // ── Listener registration ────────────────────────────────────────

    /// Register connect / connect-error / disconnect listeners.
    pub fn set_basic_listener(
        &self,
        on_connect: impl Fn() + Send + Sync + 'static,
        on_connect_error: impl Fn(&ClientError) + Send + Sync + 'static,
        on_disconnect: impl Fn(Option<&ClientError>) + Send + Sync + 'static,
    ) {
        let mut listeners = self.inner.listeners.lock();
        listeners.on_connect = Some(Arc::new(on_connect));
        listeners.on_connect_error = Some(Arc::new(on_connect_error));
        listeners.on_disconnect = Some(Arc::new(on_disconnect));
    }

    /// Register set-auth-token / authenticated listeners.
    pub fn set_auth_listener(
        &self,
        on_set_auth_token: impl Fn(&str) + Send + Sync + 'static,
        on_authenticated: impl Fn(bool) + Send + Sync + 'static,
    ) {
        let mut listeners = self.inner.listeners.lock();
        listeners.on_set_auth_token = Some(Arc::new(on_set_auth_token));
        listeners.on_authenticated = Some(Arc::new(on_authenticated));
    }

    // ── State & token accessors ──────────────────────────────────────

    /// Current engine state.
    pub fn state(&self) -> ConnState {
        *self.inner.state.lock()
    }

    /// Whether the transport is open and the engine is not disconnected.
    pub fn is_connected(&self) -> bool {
        self.inner.transport.is_connected() && self.state() != ConnState::Disconnected
    }

    /// Store the auth token to be carried by the next handshake.
    pub fn set_auth_token(&self, token: &str) {
        self.inner.session.set_token(token);
    }

    /// Current auth token, if any.
    pub fn auth_token(&self) -> Option<String> {
        self.inner.session.token()
    }

    /// Number of calls still awaiting acknowledgment.
    pub fn pending_acks(&self) -> usize {
        self.inner.registry.pending_count()
    }

    // ── Messaging ────────────────────────────────────────────────────

    /// Fire-and-forget event emission.
    pub fn emit(&self, event: &str, data: Value) -> Result<(), ClientError> {
        let cid = self.inner.session.next_cid();
        self.send(&Envelope::emit(event, data, cid))
    }

    /// Acknowledged event emission. `callback` receives
    /// `(event_name, error, data)` exactly once: on reply, timeout, or
    /// session teardown.
    pub fn emit_with_ack(
        &self,
        event: &str,
        data: Value,
        timeout: Duration,
        callback: impl FnOnce(&str, Option<Value>, Option<Value>) + Send + Sync + 'static,
    ) -> Result<(), ClientError> {
        let cid = self.inner.session.next_cid();
        let envelope = Envelope::emit(event, data, cid);
        self.send_with_ack(event, &envelope, cid, timeout, Box::new(callback))
    }

    /// Subscribe to a channel, fire-and-forget.
    pub fn subscribe(&self, channel: &str) -> Result<(), ClientError> {
        let cid = self.inner.session.next_cid();
        self.send(&Envelope::subscribe(channel, cid))
    }

    /// Subscribe with acknowledgment.
    pub fn subscribe_with_ack(
        &self,
        channel: &str,
        timeout: Duration,
        callback: impl FnOnce(&str, Option<Value>, Option<Value>) + Send + Sync + 'static,
    ) -> Result<(), ClientError> {
        let cid = self.inner.session.next_cid();
        let envelope = Envelope::subscribe(channel, cid);
        self.send_with_ack(channel, &envelope, cid, timeout, Box::new(callback))
    }

    /// Unsubscribe from a channel, fire-and-forget.
    pub fn unsubscribe(&self, channel: &str) -> Result<(), ClientError> {
        let cid = self.inner.session.next_cid();
        self.send(&Envelope::unsubscribe(channel, cid))
    }

    /// Unsubscribe with acknowledgment.
    pub fn unsubscribe_with_ack(
        &self,
        channel: &str,
        timeout: Duration,
        callback: impl FnOnce(&str, Option<Value>, Option<Value>) + Send + Sync + 'static,
    ) -> Result<(), ClientError> {
        let cid = self.inner.session.next_cid();
        let envelope = Envelope::unsubscribe(channel, cid);
        self.send_with_ack(channel, &envelope, cid, timeout, Box::new(callback))
    }

    /// Publish on a channel, fire-and-forget.
    pub fn publish(&self, channel: &str, data: Value) -> Result<(), ClientError> {
        let cid = self.inner.session.next_cid();
        self.send(&Envelope::publish(channel, data, cid))
    }

    /// Publish with acknowledgment.
    pub fn publish_with_ack(
        &self,
        channel: &str,
        data: Value,
        timeout: Duration,
        callback: impl FnOnce(&str, Option<Value>, Option<Value>) + Send + Sync + 'static,
    ) -> Result<(), ClientError> {
        let cid = self.inner.session.next_cid();
        let envelope = Envelope::publish(channel, data, cid);
        self.send_with_ack(channel, &envelope, cid, timeout, Box::new(callback))
    }

    // ── Event handler registration ───────────────────────────────────

    /// Register a fire-and-forget handler for an event or channel name.
    pub fn on(&self, name: &str, handler: impl Fn(&str, &Value) + Send + Sync + 'static) {
        let handler: PlainHandler = Arc::new(handler);
        self.inner.dispatch.register_plain(name, handler);
    }

    /// Register an ack-capable handler. The handler receives an [`AckSink`]
    /// to reply through, synchronously or later.
    pub fn on_with_ack(
        &self,
        name: &str,
        handler: impl Fn(&str, &Value, AckSink) + Send + Sync + 'static,
    ) {
        let handler: AckHandler = Arc::new(handler);
        self.inner.dispatch.register_ack(name, handler);
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Tear down the session scope and close the transport.
    pub fn disconnect(&self) -> Result<(), ClientError> {
        self.inner.session.shutdown();
        *self.inner.state.lock() = ConnState::Disconnected;
        self.inner.transport.close()
    }

    // ── Transport callbacks ──────────────────────────────────────────

    /// Transport established a connection: reset the call counter, send the
    /// handshake, notify the connect listener.
    pub fn handle_connected(&self) {
        let _ = self.inner.session.begin();
        *self.inner.state.lock() = ConnState::Connected;

        let cid = self.inner.session.next_cid();
        let token = self.inner.session.token();
        let handshake = Envelope::handshake(token.as_deref(), cid);
        if let Err(error) = self.send(&handshake) {
            warn!(error = %error, "handshake failed");
            self.listeners().connect_error(&error);
            let _ = self.disconnect();
            return;
        }
        self.listeners().connect();
    }

    /// Transport failed to connect.
    pub fn handle_connect_error(&self, error: ClientError) {
        self.inner.session.shutdown();
        *self.inner.state.lock() = ConnState::Disconnected;
        self.listeners().connect_error(&error);
    }

    /// Transport dropped the connection.
    pub fn handle_disconnected(&self, error: Option<ClientError>) {
        self.inner.session.shutdown();
        *self.inner.state.lock() = ConnState::Disconnected;
        self.listeners().disconnect(error.as_ref());
    }

    /// One inbound text frame.
    pub fn handle_text(&self, text: &str) {
        if let Some(reply) = keepalive_reply(text) {
            if let Err(error) = self.inner.transport.send_text(reply) {
                warn!(error = %error, "failed to answer keepalive");
            }
            return;
        }

        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(error = %error, "dropping undecodable frame");
                return;
            }
        };
        self.handle_envelope(envelope);
    }

    // ── Inbound dispatch ─────────────────────────────────────────────

    fn handle_envelope(&self, envelope: Envelope) {
        match classify(&envelope) {
            Intent::IsAuthenticated => self.on_auth_status(envelope.is_authenticated()),
            Intent::SetToken => match envelope.auth_token() {
                Some(token) => {
                    self.inner.session.set_token(token);
                    self.listeners().set_auth_token(token);
                }
                None => warn!("set-auth-token event without a token"),
            },
            Intent::RemoveToken => {
                debug!("auth token removed by server");
                self.inner.session.clear_token();
            }
            Intent::Event => self.on_event(&envelope),
            Intent::AckReceive => {
                if let Some(rid) = envelope.rid {
                    self.inner.registry.resolve(rid, envelope.error, envelope.data);
                }
            }
            Intent::Publish => match PublishPayload::from_data(envelope.data.as_ref()) {
                Ok(payload) => {
                    debug!(channel = %payload.channel, "publish received");
                    let _ = self.inner.dispatch.dispatch_plain(&payload.channel, &payload.data);
                }
                Err(error) => warn!(error = %error, "dropping malformed publish"),
            },
            Intent::Unrecognized => warn!("dropping unrecognized frame"),
        }
    }

    fn on_event(&self, envelope: &Envelope) {
        let Some(name) = envelope.event.as_deref() else {
            return;
        };
        let data = envelope.data.clone().unwrap_or(Value::Null);
        match envelope.cid {
            Some(cid) if self.inner.dispatch.has_ack_handler(name) => {
                let sink = AckSink::new(Arc::clone(&self.inner.transport), cid);
                let _ = self.inner.dispatch.dispatch_ack(name, &data, sink);
            }
            Some(cid) => {
                // The peer's requested ack is never sent; it times out there.
                warn!(event = name, cid, "ack requested but no ack handler registered");
                let _ = self.inner.dispatch.dispatch_plain(name, &data);
            }
            None => {
                let _ = self.inner.dispatch.dispatch_plain(name, &data);
            }
        }
    }

    fn on_auth_status(&self, is_authenticated: bool) {
        if is_authenticated {
            *self.inner.state.lock() = ConnState::Authenticated;
            self.listeners().authenticated(true);
            return;
        }

        *self.inner.state.lock() = ConnState::Authenticating;
        if !self.inner.config.auto_login {
            self.listeners().authenticated(false);
            return;
        }

        let engine = self.clone();
        let login_event = self.inner.config.login_event.clone();
        let login_data = self.inner.config.login_data.clone();
        let timeout = self.inner.config.default_ack_timeout();
        let result = self.emit_with_ack(&login_event, login_data, timeout, move |_, error, _| {
            match error {
                Some(error) => {
                    let error = ClientError::LoginRejected(login_error_message(&error));
                    warn!(error = %error, "login failed");
                    engine.listeners().connect_error(&error);
                    let _ = engine.disconnect();
                }
                None => {
                    *engine.inner.state.lock() = ConnState::Authenticated;
                    engine.listeners().authenticated(true);
                }
            }
        });
        if let Err(error) = result {
            warn!(error = %error, "could not send login call");
            self.listeners().connect_error(&error);
            let _ = self.disconnect();
        }
    }

    // ── Outbound plumbing ────────────────────────────────────────────

    fn send(&self, envelope: &Envelope) -> Result<(), ClientError> {
        let frame = envelope.encode()?;
        self.inner.transport.send_text(&frame)
    }

    /// Register the pending record, then send. On send failure the record is
    /// discarded without invoking its callback — the caller gets the error
    /// synchronously and resolution stays single-pathed. A torn-down session
    /// scope refuses the registration for the same reason, before anything is
    /// sent.
    fn send_with_ack(
        &self,
        ack_name: &str,
        envelope: &Envelope,
        cid: u64,
        timeout: Duration,
        callback: AckCallback,
    ) -> Result<(), ClientError> {
        let scope = self.inner.session.scope();
        if !self
            .inner
            .registry
            .register(cid, ack_name, timeout, &scope, callback)
        {
            return Err(ClientError::NotConnected);
        }
        match self.send(envelope) {
            Ok(()) => Ok(()),
            Err(error) => {
                let _ = self.inner.registry.discard(cid);
                Err(error)
            }
        }
    }

    fn listeners(&self) -> Listeners {
        self.inner.listeners.lock().clone()
    }
}

fn login_error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .map_or_else(|| error.to_string(), str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;
    use serde_json::json;

    fn make_client() -> (Client, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let client = Client::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            ClientConfig::default(),
        );
        (client, transport)
    }

    #[tokio::test]
    async fn connect_sends_handshake_with_cid_one() {
        let (client, transport) = make_client();
        client.handle_connected();

        let frame = transport.last().unwrap();
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["event"], "#handshake");
        assert_eq!(v["cid"], 1);
        assert_eq!(client.state(), ConnState::Connected);
    }

    #[tokio::test]
    async fn handshake_carries_stored_token() {
        let (client, transport) = make_client();
        client.set_auth_token("tok-1");
        client.handle_connected();

        let v: Value = serde_json::from_str(&transport.last().unwrap()).unwrap();
        assert_eq!(v["data"]["authToken"], "tok-1");
    }

    #[tokio::test]
    async fn reconnect_resets_call_ids() {
        let (client, transport) = make_client();
        client.handle_connected();
        client.emit("a", json!(1)).unwrap();
        client.emit("b", json!(2)).unwrap();

        client.handle_connected();
        let v: Value = serde_json::from_str(&transport.last().unwrap()).unwrap();
        assert_eq!(v["cid"], 1);
    }

    #[tokio::test]
    async fn keepalive_answered_before_classifier() {
        let (client, transport) = make_client();
        client.handle_text("");
        assert_eq!(transport.last().as_deref(), Some(""));
        client.handle_text("#1");
        assert_eq!(transport.last().as_deref(), Some("#2"));
    }

    #[tokio::test]
    async fn undecodable_frame_is_dropped() {
        let (client, transport) = make_client();
        client.handle_text("{broken");
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn emit_assigns_increasing_cids() {
        let (client, transport) = make_client();
        client.emit("a", json!(null)).unwrap();
        client.emit("b", json!(null)).unwrap();
        let frames = transport.sent();
        let first: Value = serde_json::from_str(&frames[0]).unwrap();
        let second: Value = serde_json::from_str(&frames[1]).unwrap();
        assert_eq!(first["cid"], 1);
        assert_eq!(second["cid"], 2);
    }

    #[tokio::test]
    async fn send_failure_discards_pending_record() {
        let (client, transport) = make_client();
        transport.fail_sends(true);
        let result = client.emit_with_ack("test", json!(null), Duration::from_secs(1), |_, _, _| {
            panic!("callback must not fire on send failure");
        });
        assert!(result.is_err());
        assert_eq!(client.pending_acks(), 0);
    }

    #[test]
    fn client_is_shareable_across_tasks() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Client>();
    }

    #[tokio::test(start_paused = true)]
    async fn ack_call_after_teardown_fails_without_callback() {
        let (client, transport) = make_client();
        client.handle_connected();
        client.handle_disconnected(None);
        transport.fail_sends(true);

        let result = client.emit_with_ack("test", json!(null), Duration::from_secs(1), |_, _, _| {
            panic!("callback must not fire when the call is refused");
        });
        assert!(matches!(result, Err(ClientError::NotConnected)));
        assert_eq!(client.pending_acks(), 0);

        // Nothing was registered, so no watcher can fire later either.
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn disconnect_closes_transport_and_state() {
        let (client, transport) = make_client();
        client.handle_connected();
        client.disconnect().unwrap();
        assert_eq!(client.state(), ConnState::Disconnected);
        assert!(!transport.is_connected());
        assert!(!client.is_connected());
    }
}
