//! Inbound message classification.
//!
//! A pure function of the envelope's own fields: no registry or table state
//! is consulted, so classification can run before any lock is taken and its
//! result is independent of concurrently issued outbound calls.

use crate::envelope::Envelope;
use crate::reserved;

/// Protocol intent of an inbound envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Post-handshake authentication-status notification.
    IsAuthenticated,
    /// Server pushed a new auth token.
    SetToken,
    /// Server revoked the auth token.
    RemoveToken,
    /// Server-pushed event, possibly expecting an acknowledgment (`cid`).
    Event,
    /// Reply to a previously issued acknowledged call.
    AckReceive,
    /// Channel publication delivery.
    Publish,
    /// Not a recognizable frame of this dialect; logged and dropped upstream.
    Unrecognized,
}

/// Classify a decoded envelope.
///
/// Reserved event names win over everything; any other event name is a plain
/// [`Intent::Event`]. A reply with the handshake call id is the auth-status
/// notification, any other reply resolves a pending call.
pub fn classify(envelope: &Envelope) -> Intent {
    if let Some(event) = envelope.event.as_deref() {
        return match event {
            reserved::SET_AUTH_TOKEN => Intent::SetToken,
            reserved::REMOVE_AUTH_TOKEN => Intent::RemoveToken,
            reserved::PUBLISH => Intent::Publish,
            _ => Intent::Event,
        };
    }
    match envelope.rid {
        Some(reserved::HANDSHAKE_CID) => Intent::IsAuthenticated,
        Some(_) => Intent::AckReceive,
        None => Intent::Unrecognized,
    }
}
