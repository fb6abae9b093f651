//! WebSocket transport adapter for the protocol engine.
//!
//! Drives a [`strand_client::Client`] over a tokio-tungstenite connection:
//! a writer task drains the outbound frame channel, a reader task feeds
//! inbound text frames and lifecycle edges back into the engine. Reconnect
//! policy stays with the application; [`ConnectionHandle::closed`] resolves
//! when a connection ends so an outer loop can decide what to do next.

pub mod logging;
pub mod transport;

pub use logging::init_logging;
pub use transport::{ConnectionHandle, WsError, WsTransport, connect};

// The driver hands tungstenite frames around; re-export so applications
// match on the same version.
pub use tokio_tungstenite::tungstenite;
