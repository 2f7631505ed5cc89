//! Generator: turns one `user-messages` delivery into a streamed answer.
//!
//! Ties together the algorithm in `chatmesh_core::generator` with the
//! concrete collaborators: load history (hot cache, falling back to the
//! document store), personalize new conversations only, resolve the turn
//! against the LLM (with the conversation-search tool wired in), stream the
//! answer onto `token-streams`, then record it into the hot cache
//! synchronously before publishing completion. The document store itself is
//! written downstream by the History Writer, which reads the hot cache's
//! copy once it observes the completion event -- the Generator never
//! touches the document store except to seed history on a cache miss.
//!
//! Idempotency has two layers: [`chatmesh_core::bus::SessionGuard`] rejects
//! a redelivery already in flight in this process without a round trip, and
//! a hot-cache check for an existing assistant message under this
//! `chatMessageId` catches a redelivery of a turn that already completed
//! (the Generator crashed after publishing completion but before acking)
//! by republishing the end sentinel and returning early.

use std::sync::Arc;
use std::time::Duration;

use chatmesh_core::bus::{Delivery, MessageBus};
use chatmesh_core::cache::HotCache;
use chatmesh_core::conversation::ConversationStore;
use chatmesh_core::generator as core_generator;
use chatmesh_types::error::DomainError;
use chatmesh_types::{CompletionEvent, Conversation, Message, MessageRole, TokenFragment, UserMessageEnvelope, UserProfile};

use crate::wiring::Collaborators;

/// Cosmetic chunk size for the finished answer pushed onto `token-streams`.
const TOKEN_CHUNK_SIZE: usize = 40;

/// Process one delivery end to end, acknowledging it according to outcome:
/// complete on success, abandon (quietly) on a same-process or cross-process
/// in-flight conflict, abandon (with a user-visible error fragment first) on
/// a non-retryable failure, abandon (for redelivery) on a retryable one.
pub async fn process_message(collaborators: Arc<Collaborators>, delivery: Delivery<UserMessageEnvelope>) {
    let envelope = delivery.payload().clone();
    let session_id = envelope.session_id.clone();

    if !collaborators.session_guard.try_lock(&session_id) {
        tracing::debug!(%session_id, "session already in flight in this process, abandoning for redelivery");
        delivery.abandon();
        return;
    }

    let outcome = run_guarded(&collaborators, &envelope).await;
    collaborators.session_guard.unlock(&session_id);

    match outcome {
        Ok(()) => delivery.complete(),
        Err(DomainError::Conflict(reason)) => {
            tracing::debug!(%session_id, %reason, "duplicate in-flight elsewhere, abandoning without surfacing an error");
            delivery.abandon();
        }
        Err(err) if err.is_retryable() => {
            tracing::warn!(%session_id, %err, "transient failure, abandoning for redelivery");
            delivery.abandon();
        }
        Err(err) => {
            tracing::error!(%session_id, %err, "turn failed, emitting error fragment");
            let _ = collaborators
                .bus
                .publish_token(TokenFragment::error(&session_id, &envelope.chat_message_id, "Something went wrong processing your message."))
                .await;
            delivery.abandon();
        }
    }
}

/// Claim the cross-process hot-cache lock, run the turn, release it
/// regardless of outcome.
async fn run_guarded(collaborators: &Collaborators, envelope: &UserMessageEnvelope) -> Result<(), DomainError> {
    let session_id = &envelope.session_id;

    let acquired = collaborators.cache.try_lock(session_id).await.map_err(DomainError::from)?;
    if !acquired {
        return Err(DomainError::Conflict(format!("session {session_id} already in flight on another instance")));
    }

    let result = run_turn(collaborators, envelope).await;
    let _ = collaborators.cache.unlock(session_id).await;
    result
}

async fn run_turn(collaborators: &Collaborators, envelope: &UserMessageEnvelope) -> Result<(), DomainError> {
    let config = &collaborators.config;
    let session_id = &envelope.session_id;
    let chat_message_id = &envelope.chat_message_id;

    let cache_ttl = Duration::from_secs(config.hot_cache_ttl_secs);
    let (mut conversation, is_new) = load_or_create_conversation(collaborators, session_id, &envelope.user_id, cache_ttl).await?;

    let assistant_message_id = Message::derive_id(chat_message_id, MessageRole::Assistant);
    if conversation.messages.iter().any(|m| m.message_id == assistant_message_id) {
        tracing::info!(%session_id, %chat_message_id, "turn already recorded in hot cache, republishing end sentinel");
        collaborators.bus.publish_token(TokenFragment::end(session_id, chat_message_id)).await.map_err(DomainError::from)?;
        return Ok(());
    }

    let system_prompt = match conversation.messages.first() {
        Some(m) if m.role == MessageRole::System => m.content.clone(),
        _ if is_new => {
            let timeout = Duration::from_secs_f64(config.memory_api_timeout_secs);
            let profile = core_generator::personalize(collaborators.profiles.as_ref(), &envelope.user_id, timeout).await;
            core_generator::build_system_prompt(&profile)
        }
        _ => core_generator::build_system_prompt(&UserProfile::empty(&envelope.user_id)),
    };

    let history: Vec<Message> = conversation.messages.iter().filter(|m| m.role != MessageRole::System).cloned().collect();

    let answer = core_generator::resolve_turn(
        collaborators.provider.as_ref(),
        collaborators.embedder.as_ref(),
        collaborators.summaries.as_ref(),
        &config.model,
        &system_prompt,
        &history,
        &envelope.text,
        &envelope.user_id,
        config.max_tool_calls_per_turn,
        config.max_search_limit,
    )
    .await?;

    core_generator::publish_answer(collaborators.bus.as_ref(), session_id, chat_message_id, &answer, TOKEN_CHUNK_SIZE)
        .await
        .map_err(DomainError::from)?;

    if is_new {
        conversation.messages.insert(0, Message::system(system_prompt));
    }
    conversation.messages.push(Message::user(chat_message_id, &envelope.text));
    conversation.messages.push(Message::assistant(chat_message_id, &answer));
    conversation.last_activity = chrono::Utc::now();

    collaborators.cache.put_conversation(&conversation, cache_ttl).await.map_err(DomainError::from)?;

    let replay_ttl = Duration::from_secs(config.replay_buffer_ttl_secs);
    collaborators.cache.put_replay(session_id, chat_message_id, &answer, replay_ttl).await.map_err(DomainError::from)?;

    collaborators
        .bus
        .publish_completion(CompletionEvent::new(session_id.clone(), envelope.user_id.clone(), chat_message_id.clone()))
        .await
        .map_err(DomainError::from)?;

    Ok(())
}

/// Load a conversation for `session_id`: hot cache, refreshing its TTL on
/// hit; else the document store, repopulating the cache; else a brand new
/// conversation. Returns whether this is the conversation's first turn
/// (no messages yet), which gates personalization.
async fn load_or_create_conversation(
    collaborators: &Collaborators,
    session_id: &str,
    user_id: &str,
    ttl: Duration,
) -> Result<(Conversation, bool), DomainError> {
    if let Some(conversation) = collaborators.cache.get_conversation(session_id).await.map_err(DomainError::from)? {
        collaborators.cache.touch_conversation(session_id, ttl).await.map_err(DomainError::from)?;
        let is_new = conversation.messages.is_empty();
        return Ok((conversation, is_new));
    }

    match collaborators.conversations.get(session_id).await.map_err(DomainError::from)? {
        Some(conversation) => {
            collaborators.cache.put_conversation(&conversation, ttl).await.map_err(DomainError::from)?;
            let is_new = conversation.messages.is_empty();
            Ok((conversation, is_new))
        }
        None => {
            let conversation = collaborators.conversations.get_or_create(session_id, user_id).await.map_err(DomainError::from)?;
            Ok((conversation, true))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_chunk_size_is_positive() {
        assert!(TOKEN_CHUNK_SIZE > 0);
    }
}
