//! History Writer: consumes `message-completed` on its own subscription,
//! reads the finalized conversation from the hot cache (authoritative at
//! this instant), and upserts the new turn into the document store --
//! titling the conversation on its first persist.
//!
//! Idempotent under redelivery: [`ConversationStore::has_assistant_reply`]
//! is checked before appending, so a repeated event for an already-persisted
//! `chatMessageId` is a no-op.

use std::sync::Arc;

use chatmesh_core::bus::Delivery;
use chatmesh_core::conversation::ConversationStore;
use chatmesh_core::cache::HotCache;
use chatmesh_types::error::DomainError;
use chatmesh_types::{CompletionEvent, Message, MessageRole};

use crate::wiring::Collaborators;

pub async fn process_completion(collaborators: Arc<Collaborators>, delivery: Delivery<CompletionEvent>) {
    let event = delivery.payload().clone();
    match handle(&collaborators, &event).await {
        Ok(()) => delivery.complete(),
        Err(err) if err.is_retryable() => {
            tracing::warn!(session_id = %event.session_id, %err, "transient failure persisting history, abandoning for redelivery");
            delivery.abandon();
        }
        Err(err) => {
            tracing::error!(session_id = %event.session_id, %err, "failed to persist history");
            delivery.abandon();
        }
    }
}

async fn handle(collaborators: &Collaborators, event: &CompletionEvent) -> Result<(), DomainError> {
    let session_id = &event.session_id;
    let chat_message_id = &event.chat_message_id;

    if collaborators.conversations.has_assistant_reply(session_id, chat_message_id).await.map_err(DomainError::from)? {
        tracing::debug!(%session_id, %chat_message_id, "turn already persisted, skipping");
        return Ok(());
    }

    let cached = collaborators
        .cache
        .get_conversation(session_id)
        .await
        .map_err(DomainError::from)?
        .ok_or_else(|| DomainError::NotFound(format!("conversation {session_id} missing from hot cache")))?;

    let user_message_id = Message::derive_id(chat_message_id, MessageRole::User);
    let assistant_message_id = Message::derive_id(chat_message_id, MessageRole::Assistant);

    let user_message = cached
        .messages
        .iter()
        .find(|m| m.message_id == user_message_id)
        .cloned()
        .ok_or_else(|| DomainError::NotFound(format!("user message {user_message_id} missing from cached conversation")))?;
    let assistant_message = cached
        .messages
        .iter()
        .find(|m| m.message_id == assistant_message_id)
        .cloned()
        .ok_or_else(|| DomainError::NotFound(format!("assistant message {assistant_message_id} missing from cached conversation")))?;

    collaborators.conversations.get_or_create(session_id, &event.user_id).await.map_err(DomainError::from)?;
    collaborators.conversations.append_turn(session_id, user_message, assistant_message).await.map_err(DomainError::from)?;

    let persisted = collaborators
        .conversations
        .get(session_id)
        .await
        .map_err(DomainError::from)?
        .ok_or_else(|| DomainError::NotFound(format!("conversation {session_id} vanished after append")))?;

    if persisted.title.is_none() {
        let messages = collaborators.conversations.get_messages(session_id).await.map_err(DomainError::from)?;
        let title = chatmesh_core::title::generate_title(collaborators.provider.as_ref(), &messages, &collaborators.config.model).await;
        collaborators.conversations.set_title(session_id, title).await.map_err(DomainError::from)?;
    }

    Ok(())
}
