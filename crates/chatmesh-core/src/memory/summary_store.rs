//! `ConversationSummaryStore` trait: semantic search over a user's prior
//! conversation summaries, backing both the Memory Reader HTTP surface and
//! the Generator's `search_conversation_history` tool.
//!
//! Implementations (e.g. LanceDB) live in `chatmesh-infra`.

use chatmesh_types::error::StoreError;
use chatmesh_types::memory::{ConversationSummary, RankedSummary};

/// Trait for vector-indexed conversation summary storage with semantic
/// search, partitioned by `user_id`.
pub trait ConversationSummaryStore: Send + Sync {
    /// Search a user's summaries for those semantically similar to the
    /// query embedding. `limit` is capped by the caller to the configured
    /// `max_search_limit` before reaching this trait.
    fn search(
        &self,
        user_id: &str,
        query_embedding: &[f32],
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<RankedSummary>, StoreError>> + Send;

    /// Upsert a summary, keyed by `(user_id, session_id)`. Idempotent: a
    /// redelivered completion event overwrites rather than duplicates.
    fn upsert(&self, summary: &ConversationSummary) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Fetch a single summary by its owning session, if one exists.
    fn get_by_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ConversationSummary>, StoreError>> + Send;

    /// Delete every summary for a user.
    fn delete_all(&self, user_id: &str) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;
}
