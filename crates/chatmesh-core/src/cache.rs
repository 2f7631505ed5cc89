//! The `HotCache` trait: the single piece of mutable shared state for
//! in-flight conversations.
//!
//! Only the Generator writes `session:{sessionId}` entries; Writers and
//! Egress only read. The same trait also carries the per-session in-flight
//! CAS flag (hardening `user-messages` against overlapping submissions for
//! one session) and the Egress replay buffer (covering the connect-after-
//! complete race on `token-streams`, keyed by `(sessionId, chatMessageId)`).
//!
//! Grounded on the same RPITIT port style as [`crate::conversation::store`]:
//! a trait implemented once per backing technology (in-memory for the
//! reference adapter, a real cache client in production) with no generic
//! parameters leaking into callers.

use std::time::Duration;

use chatmesh_types::error::CacheError;
use chatmesh_types::Conversation;
use std::future::Future;

pub trait HotCache: Send + Sync {
    /// Look up `session:{sessionId}`. A miss is `Ok(None)`, not an error.
    fn get_conversation(&self, session_id: &str) -> impl Future<Output = Result<Option<Conversation>, CacheError>> + Send;

    /// Write the full conversation back, refreshing the TTL to `ttl`.
    fn put_conversation(&self, conversation: &Conversation, ttl: Duration) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Refresh a cache hit's TTL without rewriting the value (step 1 of the
    /// Generator's load-history algorithm: "on hit or fetched, refresh TTL").
    fn touch_conversation(&self, session_id: &str, ttl: Duration) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Compare-and-swap an in-flight lock for `session_id`. Returns `true`
    /// if this call acquired the lock, `false` if it was already held.
    fn try_lock(&self, session_id: &str) -> impl Future<Output = Result<bool, CacheError>> + Send;

    /// Release a lock acquired via `try_lock`. A no-op if not held.
    fn unlock(&self, session_id: &str) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Record the final answer for `(session_id, chat_message_id)` in the
    /// replay buffer, for a short `ttl` (default 30s).
    fn put_replay(&self, session_id: &str, chat_message_id: &str, answer: &str, ttl: Duration) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Read back a replayed answer, for an Egress stream that connected
    /// after the Generator already finished and published `__END__`.
    fn get_replay(&self, session_id: &str, chat_message_id: &str) -> impl Future<Output = Result<Option<String>, CacheError>> + Send;
}

#[cfg(test)]
mod tests {
    //! Exercises the trait's documented contract against a minimal
    //! in-process double, independent of any concrete adapter.
    use super::*;
    use dashmap::DashMap;
    use std::sync::Mutex;

    struct FakeCache {
        conversations: DashMap<String, Conversation>,
        locks: DashMap<String, ()>,
        replay: Mutex<Vec<(String, String, String)>>,
    }

    impl FakeCache {
        fn new() -> Self {
            Self { conversations: DashMap::new(), locks: DashMap::new(), replay: Mutex::new(Vec::new()) }
        }
    }

    impl HotCache for FakeCache {
        async fn get_conversation(&self, session_id: &str) -> Result<Option<Conversation>, CacheError> {
            Ok(self.conversations.get(session_id).map(|c| c.clone()))
        }
        async fn put_conversation(&self, conversation: &Conversation, _ttl: Duration) -> Result<(), CacheError> {
            self.conversations.insert(conversation.session_id.clone(), conversation.clone());
            Ok(())
        }
        async fn touch_conversation(&self, _session_id: &str, _ttl: Duration) -> Result<(), CacheError> {
            Ok(())
        }
        async fn try_lock(&self, session_id: &str) -> Result<bool, CacheError> {
            Ok(self.locks.insert(session_id.to_string(), ()).is_none())
        }
        async fn unlock(&self, session_id: &str) -> Result<(), CacheError> {
            self.locks.remove(session_id);
            Ok(())
        }
        async fn put_replay(&self, session_id: &str, chat_message_id: &str, answer: &str, _ttl: Duration) -> Result<(), CacheError> {
            self.replay.lock().unwrap().push((session_id.to_string(), chat_message_id.to_string(), answer.to_string()));
            Ok(())
        }
        async fn get_replay(&self, session_id: &str, chat_message_id: &str) -> Result<Option<String>, CacheError> {
            Ok(self
                .replay
                .lock()
                .unwrap()
                .iter()
                .find(|(s, m, _)| s == session_id && m == chat_message_id)
                .map(|(_, _, a)| a.clone()))
        }
    }

    #[tokio::test]
    async fn miss_then_put_then_hit() {
        let cache = FakeCache::new();
        assert!(cache.get_conversation("s1").await.unwrap().is_none());
        cache.put_conversation(&Conversation::new("s1", "u1"), Duration::from_secs(60)).await.unwrap();
        assert!(cache.get_conversation("s1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn try_lock_is_exclusive_until_unlocked() {
        let cache = FakeCache::new();
        assert!(cache.try_lock("s1").await.unwrap());
        assert!(!cache.try_lock("s1").await.unwrap());
        cache.unlock("s1").await.unwrap();
        assert!(cache.try_lock("s1").await.unwrap());
    }

    #[tokio::test]
    async fn replay_buffer_roundtrips_by_key() {
        let cache = FakeCache::new();
        assert!(cache.get_replay("s1", "m1").await.unwrap().is_none());
        cache.put_replay("s1", "m1", "hello", Duration::from_secs(30)).await.unwrap();
        assert_eq!(cache.get_replay("s1", "m1").await.unwrap().as_deref(), Some("hello"));
        assert!(cache.get_replay("s1", "m2").await.unwrap().is_none());
    }
}
