//! `ConversationStore` trait definition.
//!
//! Persists conversations partitioned by `user_id`. Implementations live in
//! `chatmesh-infra` (the document-store adapter). Uses native async fn in
//! traits (RPITIT, Rust 2024 edition), the same shape the teacher's
//! repository traits use.

use chatmesh_types::error::StoreError;
use chatmesh_types::{Conversation, ConversationListing, Message};
use std::future::Future;

/// Repository trait for conversation and message persistence.
pub trait ConversationStore: Send + Sync {
    /// Fetch a conversation by `session_id`, creating and persisting an
    /// empty one owned by `user_id` if none exists yet.
    fn get_or_create(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<Conversation, StoreError>> + Send;

    /// Fetch a conversation by `session_id` only, without creating one.
    fn get(&self, session_id: &str) -> impl Future<Output = Result<Option<Conversation>, StoreError>> + Send;

    /// Whether an assistant reply already exists for `chat_message_id` --
    /// the document-store fallback idempotency check, consulted when the
    /// hot cache has no record of this turn.
    fn has_assistant_reply(
        &self,
        session_id: &str,
        chat_message_id: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Durably append one user/assistant turn and bump `last_activity`.
    fn append_turn(
        &self,
        session_id: &str,
        user_message: Message,
        assistant_message: Message,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Set (or overwrite) the conversation's title.
    fn set_title(&self, session_id: &str, title: String) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// List a user's conversations, most recently active first.
    fn list_for_user(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> impl Future<Output = Result<Vec<ConversationListing>, StoreError>> + Send;

    /// Fetch the full message history for one conversation.
    fn get_messages(&self, session_id: &str) -> impl Future<Output = Result<Vec<Message>, StoreError>> + Send;
}
