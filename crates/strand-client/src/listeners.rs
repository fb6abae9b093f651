//! Lifecycle and authentication listeners.
//!
//! Each listener is an optional capability; calling an unset one is a no-op,
//! never an error.

use std::sync::Arc;

use crate::error::ClientError;

/// Optional listener set held by the engine.
#[derive(Clone, Default)]
pub struct Listeners {
    pub(crate) on_connect: Option<Arc<dyn Fn() + Send + Sync>>,
    pub(crate) on_connect_error: Option<Arc<dyn Fn(&ClientError) + Send + Sync>>,
    pub(crate) on_disconnect: Option<Arc<dyn Fn(Option<&ClientError>) + Send + Sync>>,
    pub(crate) on_set_auth_token: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    pub(crate) on_authenticated: Option<Arc<dyn Fn(bool) + Send + Sync>>,
}

impl Listeners {
    pub(crate) fn connect(&self) {
        if let Some(listener) = &self.on_connect {
            listener();
        }
    }

    pub(crate) fn connect_error(&self, error: &ClientError) {
        if let Some(listener) = &self.on_connect_error {
            listener(error);
        }
    }

    pub(crate) fn disconnect(&self, error: Option<&ClientError>) {
        if let Some(listener) = &self.on_disconnect {
            listener(error);
        }
    }

    pub(crate) fn set_auth_token(&self, token: &str) {
        if let Some(listener) = &self.on_set_auth_token {
            listener(token);
        }
    }

    pub(crate) fn authenticated(&self, is_authenticated: bool) {
        if let Some(listener) = &self.on_authenticated {
            listener(is_authenticated);
        }
    }
}
