//! Transport seam.
//!
//! The engine only needs to push text frames and close; everything else about
//! the connection (establishment, reconnection policy, TLS) lives behind this
//! trait. The transport driver feeds inbound frames and lifecycle edges back
//! through the engine's `handle_*` methods.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::ClientError;

/// Duplex text-frame transport as seen by the engine.
pub trait Transport: Send + Sync {
    /// Send one text frame. Failures surface synchronously to the caller.
    fn send_text(&self, text: &str) -> Result<(), ClientError>;
    /// Close the connection.
    fn close(&self) -> Result<(), ClientError>;
    /// Whether the connection is currently open.
    fn is_connected(&self) -> bool;
}

/// In-memory transport double that records every sent frame.
///
/// Used by the engine test suites; sends can be made to fail to exercise the
/// synchronous error paths.
#[derive(Default)]
pub struct RecordingTransport {
    frames: Mutex<Vec<String>>,
    connected: AtomicBool,
    fail_sends: AtomicBool,
}

impl RecordingTransport {
    /// Connected recording transport with no frames sent.
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            fail_sends: AtomicBool::new(false),
        }
    }

    /// Every frame sent so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.frames.lock().clone()
    }

    /// The most recent frame.
    pub fn last(&self) -> Option<String> {
        self.frames.lock().last().cloned()
    }

    /// Drop all recorded frames.
    pub fn clear(&self) {
        self.frames.lock().clear();
    }

    /// Make subsequent sends fail (or succeed again).
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

impl Transport for RecordingTransport {
    fn send_text(&self, text: &str) -> Result<(), ClientError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ClientError::Send("injected send failure".into()));
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }
        self.frames.lock().push(text.to_owned());
        Ok(())
    }

    fn close(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
