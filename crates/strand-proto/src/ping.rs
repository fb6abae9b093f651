//! Keepalive filter.
//!
//! Ping and probe frames are not valid envelopes, so this runs on the raw
//! text before any decode.

use crate::reserved;

/// Answer for a keepalive frame, or `None` if the frame is a real envelope.
///
/// The empty frame is the dialect's ping and is answered in kind; the
/// two-character probe gets the two-character pong.
pub fn keepalive_reply(text: &str) -> Option<&'static str> {
    match text {
        reserved::PING => Some(reserved::PING),
        reserved::PROBE => Some(reserved::PROBE_REPLY),
        _ => None,
    }
}
