//! Engine error taxonomy.
//!
//! Engine-internal failures never panic; they surface either synchronously
//! from the public call that caused them or through the listener associated
//! with the failing lifecycle edge. The outer driver decides what is fatal.

use strand_proto::ProtocolError;

/// Errors surfaced by the protocol engine.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The transport refused or failed a send.
    #[error("transport send failed: {0}")]
    Send(String),
    /// The transport is closed or was never opened.
    #[error("transport is not connected")]
    NotConnected,
    /// Envelope encode/decode failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// The server rejected the login call.
    #[error("login rejected: {0}")]
    LoginRejected(String),
}
