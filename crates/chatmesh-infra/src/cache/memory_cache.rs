use std::time::{Duration, Instant};

use chatmesh_core::cache::HotCache;
use chatmesh_types::error::CacheError;
use chatmesh_types::Conversation;
use dashmap::DashMap;

struct Entry<T> {
    value: T,
    expires_at: Instant,
}

/// In-process hot cache: a `DashMap` per concern (conversations, in-flight
/// locks, the replay buffer), each entry carrying its own expiry instant
/// and checked lazily on read. Each binary builds its own instance, so this
/// only provides intra-process semantics; cooperation across the seven
/// binaries' separate processes is out of scope for this reference
/// topology (see `DESIGN.md`). A production deployment swaps this for a
/// real cache client (Redis, Memcached) behind the same trait, with no
/// changes needed above it.
pub struct InMemoryHotCache {
    conversations: DashMap<String, Entry<Conversation>>,
    locks: DashMap<String, ()>,
    replay: DashMap<(String, String), Entry<String>>,
}

impl InMemoryHotCache {
    pub fn new() -> Self {
        Self {
            conversations: DashMap::new(),
            locks: DashMap::new(),
            replay: DashMap::new(),
        }
    }
}

impl Default for InMemoryHotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HotCache for InMemoryHotCache {
    async fn get_conversation(&self, session_id: &str) -> Result<Option<Conversation>, CacheError> {
        match self.conversations.get(session_id) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                self.conversations.remove(session_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put_conversation(&self, conversation: &Conversation, ttl: Duration) -> Result<(), CacheError> {
        self.conversations.insert(
            conversation.session_id.clone(),
            Entry { value: conversation.clone(), expires_at: Instant::now() + ttl },
        );
        Ok(())
    }

    async fn touch_conversation(&self, session_id: &str, ttl: Duration) -> Result<(), CacheError> {
        if let Some(mut entry) = self.conversations.get_mut(session_id) {
            entry.expires_at = Instant::now() + ttl;
        }
        Ok(())
    }

    async fn try_lock(&self, session_id: &str) -> Result<bool, CacheError> {
        Ok(self.locks.insert(session_id.to_string(), ()).is_none())
    }

    async fn unlock(&self, session_id: &str) -> Result<(), CacheError> {
        self.locks.remove(session_id);
        Ok(())
    }

    async fn put_replay(&self, session_id: &str, chat_message_id: &str, answer: &str, ttl: Duration) -> Result<(), CacheError> {
        self.replay.insert(
            (session_id.to_string(), chat_message_id.to_string()),
            Entry { value: answer.to_string(), expires_at: Instant::now() + ttl },
        );
        Ok(())
    }

    async fn get_replay(&self, session_id: &str, chat_message_id: &str) -> Result<Option<String>, CacheError> {
        let key = (session_id.to_string(), chat_message_id.to_string());
        match self.replay.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                self.replay.remove(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn conversation_expires_after_ttl() {
        let cache = InMemoryHotCache::new();
        cache.put_conversation(&Conversation::new("s1", "u1"), Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(cache.get_conversation("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn touch_extends_ttl_past_original_expiry() {
        let cache = InMemoryHotCache::new();
        cache.put_conversation(&Conversation::new("s1", "u1"), Duration::from_millis(5)).await.unwrap();
        cache.touch_conversation("s1", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cache.get_conversation("s1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn replay_entry_expires_after_ttl() {
        let cache = InMemoryHotCache::new();
        cache.put_replay("s1", "m1", "hi", Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(cache.get_replay("s1", "m1").await.unwrap().is_none());
    }
}
