//! Memory Writer: consumes `message-completed` on its own subscription
//! (independent of the History Writer's), extracts a conversation summary
//! and profile updates via one LLM call, and merges them into durable
//! storage. A failed extraction still writes a defaulted summary record so
//! the document exists for search, rather than silently dropping the event.

use std::sync::Arc;

use chatmesh_core::bus::Delivery;
use chatmesh_core::cache::HotCache;
use chatmesh_core::conversation::ConversationStore;
use chatmesh_core::memory::extractor::MemoryExtractor;
use chatmesh_core::memory::profile_store::UserProfileStore;
use chatmesh_core::memory::summary_store::ConversationSummaryStore;
use chatmesh_types::error::DomainError;
use chatmesh_types::memory::{ConversationSummary, ProfileUpdates, Sentiment};
use chatmesh_types::{CompletionEvent, Message};

use crate::wiring::Collaborators;

pub async fn process_completion(collaborators: Arc<Collaborators>, delivery: Delivery<CompletionEvent>) {
    let event = delivery.payload().clone();
    match handle(&collaborators, &event).await {
        Ok(()) => delivery.complete(),
        Err(err) if err.is_retryable() => {
            tracing::warn!(session_id = %event.session_id, %err, "transient failure extracting memory, abandoning for redelivery");
            delivery.abandon();
        }
        Err(err) => {
            tracing::error!(session_id = %event.session_id, %err, "failed to extract memory");
            delivery.abandon();
        }
    }
}

async fn handle(collaborators: &Collaborators, event: &CompletionEvent) -> Result<(), DomainError> {
    let session_id = &event.session_id;
    let user_id = &event.user_id;

    let messages = load_messages(collaborators, session_id).await?;

    let (summary, updates) = match MemoryExtractor::extract(collaborators.provider.as_ref(), collaborators.embedder.as_ref(), &messages, user_id, session_id).await {
        Ok(pair) => pair,
        Err(err) => {
            tracing::warn!(%session_id, %user_id, %err, "memory extraction failed, writing a defaulted record");
            (default_summary(user_id, session_id), ProfileUpdates::default())
        }
    };

    collaborators.summaries.upsert(&summary).await.map_err(DomainError::from)?;

    let profile = collaborators.profiles.get(user_id).await.map_err(DomainError::from)?;
    let merged = chatmesh_core::profile::merge_profile(profile, updates);
    collaborators.profiles.upsert(&merged).await.map_err(DomainError::from)?;

    Ok(())
}

/// Prefer the hot cache's copy (authoritative at completion time); fall
/// back to the document store if it has already been evicted.
async fn load_messages(collaborators: &Collaborators, session_id: &str) -> Result<Vec<Message>, DomainError> {
    if let Some(conversation) = collaborators.cache.get_conversation(session_id).await.map_err(DomainError::from)? {
        return Ok(conversation.messages);
    }
    collaborators.conversations.get_messages(session_id).await.map_err(DomainError::from)
}

fn default_summary(user_id: &str, session_id: &str) -> ConversationSummary {
    ConversationSummary {
        user_id: user_id.to_string(),
        session_id: session_id.to_string(),
        summary: String::new(),
        themes: Vec::new(),
        persons: Vec::new(),
        places: Vec::new(),
        user_sentiment: Sentiment::Neutral,
        vector_embedding: Vec::new(),
        timestamp: chrono::Utc::now(),
    }
}
