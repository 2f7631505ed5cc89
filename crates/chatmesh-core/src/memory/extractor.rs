//! Conversation memory extraction via LLM.
//!
//! `MemoryExtractor` uses one LLM call to produce both a `ConversationSummary`
//! (themes, persons, places, sentiment) and `ProfileUpdates` (the
//! semi-structured facts merged into the user's long-term profile) from a
//! completed conversation's messages, then embeds the summary text for
//! later semantic search.
//!
//! Failed JSON parsing logs a warning and returns `DomainError::Upstream` --
//! the caller (the Memory Writer) abandons the bus delivery so the broker
//! retries, rather than silently dropping the extraction.

use chatmesh_types::error::DomainError;
use chatmesh_types::llm::{CompletionRequest, Message as LlmMessage, MessageRole as LlmMessageRole};
use chatmesh_types::memory::{ConversationSummary, ProfileUpdates, Sentiment};
use chatmesh_types::Message;
use chrono::Utc;
use serde::Deserialize;

use crate::llm::box_provider::BoxLlmProvider;
use crate::memory::box_embedder::BoxEmbedder;

/// System prompt for the memory extraction LLM call.
const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a memory extraction assistant. Given a completed conversation, produce a JSON object with exactly these fields:

- "summary": string, a single paragraph summarizing what was discussed
- "themes": array of up to 5 short topic strings
- "persons": array of person names mentioned
- "places": array of place names mentioned
- "user_sentiment": one of "positive", "neutral", "negative"
- "profile_updates": object with these array-of-string fields, each optional
  and defaulting to empty: "output_preferences", "personal_preferences",
  "assistant_preferences", "knowledge", "interests", "dislikes",
  "family_and_friends", "work_profile", "goals"

Only include facts worth remembering across future conversations. Do not
include greetings or pleasantries. If nothing is worth extracting, still
return the object with empty arrays and a brief summary.

Respond with the JSON object only, no surrounding text."#;

#[derive(Debug, Deserialize)]
struct RawExtraction {
    summary: String,
    #[serde(default)]
    themes: Vec<String>,
    #[serde(default)]
    persons: Vec<String>,
    #[serde(default)]
    places: Vec<String>,
    #[serde(default)]
    user_sentiment: Sentiment,
    #[serde(default)]
    profile_updates: ProfileUpdates,
}

/// Stateless utility for extracting a summary and profile updates from a
/// conversation's messages.
pub struct MemoryExtractor;

impl MemoryExtractor {
    #[tracing::instrument(name = "extract_memory", skip(provider, embedder, messages), fields(user_id = %user_id, session_id = %session_id, message_count = messages.len()))]
    pub async fn extract(
        provider: &BoxLlmProvider,
        embedder: &BoxEmbedder,
        messages: &[Message],
        user_id: &str,
        session_id: &str,
    ) -> Result<(ConversationSummary, ProfileUpdates), DomainError> {
        let llm_messages: Vec<LlmMessage> = messages
            .iter()
            .map(|m| LlmMessage {
                role: match m.role {
                    chatmesh_types::MessageRole::System => LlmMessageRole::System,
                    chatmesh_types::MessageRole::User => LlmMessageRole::User,
                    chatmesh_types::MessageRole::Assistant => LlmMessageRole::Assistant,
                },
                content: m.content.clone(),
            })
            .collect();

        let request = CompletionRequest {
            model: String::new(),
            messages: llm_messages,
            system: Some(EXTRACTION_SYSTEM_PROMPT.to_string()),
            max_tokens: 2048,
            temperature: Some(0.0),
            stream: false,
            stop_sequences: None,
            tools: Vec::new(),
            tool_results: Vec::new(),
        };

        let response = provider.complete(&request).await.map_err(DomainError::from)?;
        let raw_content = response.content.trim();

        let raw: RawExtraction = serde_json::from_str(raw_content).map_err(|e| {
            tracing::warn!(
                error = %e,
                content_preview = &raw_content[..raw_content.len().min(200)],
                "failed to parse memory extraction JSON"
            );
            DomainError::Upstream(format!("unparseable extraction response: {e}"))
        })?;

        let mut themes = raw.themes;
        themes.truncate(ConversationSummary::MAX_THEMES);

        let embeddings = embedder
            .embed(&[raw.summary.clone()])
            .await
            .map_err(DomainError::from)?;
        let vector_embedding = embeddings.into_iter().next().unwrap_or_default();

        let summary = ConversationSummary {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            summary: raw.summary,
            themes,
            persons: raw.persons,
            places: raw.places,
            user_sentiment: raw.user_sentiment,
            vector_embedding,
            timestamp: Utc::now(),
        };

        Ok((summary, raw.profile_updates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_extraction_deserializes_with_defaults() {
        let json = r#"{"summary": "Discussed vacation plans"}"#;
        let raw: RawExtraction = serde_json::from_str(json).unwrap();
        assert_eq!(raw.summary, "Discussed vacation plans");
        assert!(raw.themes.is_empty());
        assert_eq!(raw.user_sentiment, Sentiment::Neutral);
    }

    #[test]
    fn raw_extraction_parses_full_payload() {
        let json = r#"{
            "summary": "User planned a trip to Japan",
            "themes": ["travel", "Japan", "budget"],
            "persons": ["Alex"],
            "places": ["Tokyo"],
            "user_sentiment": "positive",
            "profile_updates": {"interests": ["travel"], "goals": ["visit Japan"]}
        }"#;
        let raw: RawExtraction = serde_json::from_str(json).unwrap();
        assert_eq!(raw.themes.len(), 3);
        assert_eq!(raw.user_sentiment, Sentiment::Positive);
        assert_eq!(raw.profile_updates.interests, vec!["travel".to_string()]);
    }

    #[test]
    fn extraction_system_prompt_names_all_profile_fields() {
        for field in [
            "output_preferences",
            "personal_preferences",
            "assistant_preferences",
            "knowledge",
            "interests",
            "dislikes",
            "family_and_friends",
            "work_profile",
            "goals",
        ] {
            assert!(EXTRACTION_SYSTEM_PROMPT.contains(field));
        }
    }
}
