//! Per-session in-flight guard.
//!
//! The bus guarantees at-least-once delivery of `user-messages`, and a
//! session's owning Generator instance may receive the same `chatMessageId`
//! twice in quick succession (redelivery racing the original worker).
//! `SessionGuard` is a cheap compare-and-swap check the Generator consults
//! before starting work, in addition to (not instead of) the `Conversation`
//! idempotency check: a session already in flight is rejected immediately,
//! without a round trip to the hot cache or document store.
use dashmap::DashMap;

/// Tracks which session ids currently have a Generator worker in flight.
pub struct SessionGuard {
    in_flight: DashMap<String, ()>,
}

impl SessionGuard {
    pub fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
        }
    }

    /// Attempt to claim `session_id`. Returns `true` if the claim succeeded
    /// (no worker was already in flight for this session), `false` if
    /// another worker holds it.
    pub fn try_lock(&self, session_id: &str) -> bool {
        self.in_flight.insert(session_id.to_string(), ()).is_none()
    }

    /// Release a previously claimed session. A no-op if it wasn't held.
    pub fn unlock(&self, session_id: &str) {
        self.in_flight.remove(session_id);
    }

    pub fn is_locked(&self, session_id: &str) -> bool {
        self.in_flight.contains_key(session_id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

impl Default for SessionGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_lock_succeeds() {
        let guard = SessionGuard::new();
        assert!(guard.try_lock("s1"));
    }

    #[test]
    fn second_lock_before_unlock_fails() {
        let guard = SessionGuard::new();
        assert!(guard.try_lock("s1"));
        assert!(!guard.try_lock("s1"));
    }

    #[test]
    fn unlock_allows_relock() {
        let guard = SessionGuard::new();
        assert!(guard.try_lock("s1"));
        guard.unlock("s1");
        assert!(guard.try_lock("s1"));
    }

    #[test]
    fn unrelated_sessions_do_not_contend() {
        let guard = SessionGuard::new();
        assert!(guard.try_lock("s1"));
        assert!(guard.try_lock("s2"));
    }

    #[test]
    fn unlock_of_unheld_session_is_a_no_op() {
        let guard = SessionGuard::new();
        guard.unlock("never-locked");
        assert!(guard.try_lock("never-locked"));
    }

    #[test]
    fn is_locked_reflects_state() {
        let guard = SessionGuard::new();
        assert!(!guard.is_locked("s1"));
        guard.try_lock("s1");
        assert!(guard.is_locked("s1"));
        guard.unlock("s1");
        assert!(!guard.is_locked("s1"));
    }

    #[test]
    fn debug_impl_reports_in_flight_count() {
        let guard = SessionGuard::new();
        guard.try_lock("s1");
        guard.try_lock("s2");
        let debug = format!("{guard:?}");
        assert!(debug.contains("SessionGuard"));
        assert_eq!(guard.in_flight_count(), 2);
    }
}
