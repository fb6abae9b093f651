//! Client-side protocol engine for the real-time pub/sub + RPC dialect.
//!
//! The engine sits between an application and a duplex text-frame transport.
//! It owns the session state (auth token, call-id counter, lifetime scope),
//! the correlation registry for acknowledged calls, and the event dispatch
//! tables; the transport itself (connection establishment, reconnection,
//! TLS) is a collaborator behind the [`Transport`] trait.
//!
//! Inbound flow: raw text → keepalive filter → envelope decode → classify →
//! {auth transition, token set/clear, event dispatch, ack resolution,
//! channel publish}. Outbound flow: public call → call-id allocation →
//! envelope build → encode → `Transport::send_text`.
//!
//! [`Transport`]: transport::Transport

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod listeners;
pub mod registry;
pub mod session;
pub mod transport;

pub use client::{Client, ConnState};
pub use config::ClientConfig;
pub use dispatch::{AckSink, DispatchTable};
pub use error::ClientError;
pub use registry::AckRegistry;
pub use session::Session;
pub use transport::{RecordingTransport, Transport};
