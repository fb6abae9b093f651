//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Configuration for a [`Client`](crate::Client).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Default acknowledgment timeout in seconds, used for the engine-driven
    /// login call (default `60`).
    pub default_ack_timeout_secs: u64,
    /// Event name of the login call (default `"login"`).
    pub login_event: String,
    /// Payload sent with the login call (default `null`).
    pub login_data: Value,
    /// Whether the engine sends the login call itself when the server reports
    /// the session unauthenticated. With `false` the auth listener is invoked
    /// with `false` instead and the application logs in on its own.
    pub auto_login: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_ack_timeout_secs: 60,
            login_event: "login".into(),
            login_data: Value::Null,
            auto_login: true,
        }
    }
}

impl ClientConfig {
    /// Default ack timeout as a [`Duration`].
    pub fn default_ack_timeout(&self) -> Duration {
        Duration::from_secs(self.default_ack_timeout_secs)
    }
}
