//! Protocol-level errors.

/// Failure to move between text frames and envelopes.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A frame could not be decoded into an envelope.
    #[error("failed to decode envelope: {0}")]
    Decode(#[source] serde_json::Error),
    /// An envelope could not be serialized.
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
    /// A `#publish` event arrived without its channel/data payload.
    #[error("publish event carried no payload")]
    MissingPublishPayload,
}
