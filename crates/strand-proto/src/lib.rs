//! Wire-level model for the real-time pub/sub + RPC dialect.
//!
//! This crate knows nothing about transports or concurrency. It defines the
//! [`Envelope`] exchanged over a text-frame connection, the reserved protocol
//! event names, a pure [`classify`] step that maps a decoded envelope onto a
//! protocol [`Intent`], and the pre-decode keepalive filter.
//!
//! [`Envelope`]: envelope::Envelope
//! [`classify`]: classify::classify
//! [`Intent`]: classify::Intent

pub mod classify;
pub mod envelope;
pub mod error;
pub mod ping;
pub mod reserved;

pub use classify::{Intent, classify};
pub use envelope::{Envelope, PublishPayload};
pub use error::ProtocolError;
pub use ping::keepalive_reply;
