//! Reserved protocol event names and frame literals.
//!
//! These are wire constants of the server dialect — remote peers match on the
//! exact strings, so none of them may change independently of the server.

/// First envelope after connection; carries the auth token (if any).
pub const HANDSHAKE: &str = "#handshake";
/// Server pushes a new auth token to the client.
pub const SET_AUTH_TOKEN: &str = "#setAuthToken";
/// Server revokes the client's auth token.
pub const REMOVE_AUTH_TOKEN: &str = "#removeAuthToken";
/// Server delivers a channel publication.
pub const PUBLISH: &str = "#publish";
/// Client subscribes to a channel.
pub const SUBSCRIBE: &str = "#subscribe";
/// Client unsubscribes from a channel.
pub const UNSUBSCRIBE: &str = "#unsubscribe";

/// Keepalive ping frame (and its reply).
pub const PING: &str = "";
/// Liveness probe frame sent by the server.
pub const PROBE: &str = "#1";
/// Reply to [`PROBE`].
pub const PROBE_REPLY: &str = "#2";

/// Call id of the handshake envelope.
///
/// The call counter is reset on every connect and the handshake is the first
/// send, so the reply carrying this id is always the auth-status notification.
pub const HANDSHAKE_CID: u64 = 1;
