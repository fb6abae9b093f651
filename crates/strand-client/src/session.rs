//! Per-session state: auth token, call-id counter, lifetime scope.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Session-scoped engine state.
///
/// The counter is the sole source of call ids for the session; ids start at 1
/// and are never reused until the next [`begin`](Session::begin). The scope
/// token bounds every per-call timeout watcher, so cancelling it drains the
/// correlation registry in bounded time.
pub struct Session {
    token: RwLock<Option<String>>,
    counter: AtomicU64,
    scope: Mutex<CancellationToken>,
}

impl Session {
    /// Fresh session with no token and the counter at zero.
    pub fn new() -> Self {
        Self {
            token: RwLock::new(None),
            counter: AtomicU64::new(0),
            scope: Mutex::new(CancellationToken::new()),
        }
    }

    /// Allocate the next call id. Safe to call from any task.
    pub fn next_cid(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Start a new connection epoch: reset the counter and replace the
    /// lifetime scope. Returns the new scope token.
    ///
    /// The auth token survives — it belongs to the client, not the
    /// connection.
    pub fn begin(&self) -> CancellationToken {
        let fresh = CancellationToken::new();
        *self.scope.lock() = fresh.clone();
        self.counter.store(0, Ordering::SeqCst);
        fresh
    }

    /// Cancel the current lifetime scope.
    pub fn shutdown(&self) {
        self.scope.lock().cancel();
    }

    /// The current lifetime scope token.
    pub fn scope(&self) -> CancellationToken {
        self.scope.lock().clone()
    }

    /// Store the auth token.
    pub fn set_token(&self, token: &str) {
        *self.token.write() = Some(token.into());
    }

    /// Drop the auth token.
    pub fn clear_token(&self) {
        *self.token.write() = None;
    }

    /// Current auth token, if any.
    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn cids_start_at_one_and_increase() {
        let session = Session::new();
        assert_eq!(session.next_cid(), 1);
        assert_eq!(session.next_cid(), 2);
        assert_eq!(session.next_cid(), 3);
    }

    #[test]
    fn begin_resets_counter() {
        let session = Session::new();
        let _ = session.next_cid();
        let _ = session.next_cid();
        let _ = session.begin();
        assert_eq!(session.next_cid(), 1);
    }

    #[test]
    fn cids_unique_under_concurrent_callers() {
        let session = Arc::new(Session::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let session = Arc::clone(&session);
            handles.push(std::thread::spawn(move || {
                (0..500).map(|_| session.next_cid()).collect::<Vec<_>>()
            }));
        }
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        let len = all.len();
        all.dedup();
        assert_eq!(all.len(), len);
        assert_eq!(len, 8 * 500);
    }

    #[test]
    fn token_set_and_clear() {
        let session = Session::new();
        assert_eq!(session.token(), None);
        session.set_token("abc");
        assert_eq!(session.token().as_deref(), Some("abc"));
        session.clear_token();
        assert_eq!(session.token(), None);
    }

    #[test]
    fn token_survives_begin() {
        let session = Session::new();
        session.set_token("abc");
        let _ = session.begin();
        assert_eq!(session.token().as_deref(), Some("abc"));
    }

    #[test]
    fn shutdown_cancels_current_scope_only() {
        let session = Session::new();
        let first = session.scope();
        session.shutdown();
        assert!(first.is_cancelled());

        let second = session.begin();
        assert!(!second.is_cancelled());
        assert!(first.is_cancelled());
    }
}
