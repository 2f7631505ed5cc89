//! Conversation title generation via LLM.
//!
//! `generate_title` creates a short, descriptive title from the first
//! exchange of a conversation, capped to the first 6 messages. Any failure
//! (provider error, empty response) falls back to a fixed default rather
//! than leaving the conversation untitled or retrying indefinitely.

use chatmesh_types::llm::{CompletionRequest, Message as LlmMessage, MessageRole as LlmMessageRole};
use chatmesh_types::Message;

use crate::llm::box_provider::BoxLlmProvider;

const TITLE_SYSTEM_PROMPT: &str = r#"Generate a short, descriptive title (3-6 words) for this conversation based on the exchange so far. The title should capture the main topic or intent. Return ONLY the title text, nothing else.

Examples:
- "Debugging Rust lifetime errors"
- "Planning a weekend trip to Tokyo"
- "Understanding quantum computing basics"
- "Recipe ideas for dinner party""#;

pub const FALLBACK_TITLE: &str = "New Conversation";

const MAX_MESSAGES_FOR_TITLE: usize = 6;

/// Generate a conversation title from up to the first 6 messages. Falls
/// back to [`FALLBACK_TITLE`] on any provider error or an empty response
/// after trimming, rather than surfacing the failure to the caller.
#[tracing::instrument(name = "generate_title", skip(provider, messages), fields(model = %model))]
pub async fn generate_title(provider: &BoxLlmProvider, messages: &[Message], model: &str) -> String {
    if messages.is_empty() {
        return FALLBACK_TITLE.to_string();
    }

    let mut llm_messages: Vec<LlmMessage> = messages
        .iter()
        .filter(|m| m.role != chatmesh_types::MessageRole::System)
        .take(MAX_MESSAGES_FOR_TITLE)
        .map(|m| LlmMessage {
            role: match m.role {
                chatmesh_types::MessageRole::System => LlmMessageRole::System,
                chatmesh_types::MessageRole::User => LlmMessageRole::User,
                chatmesh_types::MessageRole::Assistant => LlmMessageRole::Assistant,
            },
            content: m.content.clone(),
        })
        .collect();

    llm_messages.push(LlmMessage {
        role: LlmMessageRole::User,
        content: "Based on our exchange above, generate a title.".to_string(),
    });

    let request = CompletionRequest {
        model: model.to_string(),
        messages: llm_messages,
        system: Some(TITLE_SYSTEM_PROMPT.to_string()),
        max_tokens: 50,
        temperature: Some(0.3),
        stream: false,
        stop_sequences: None,
        tools: Vec::new(),
        tool_results: Vec::new(),
    };

    let response = match provider.complete(&request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "title generation failed, using fallback title");
            return FALLBACK_TITLE.to_string();
        }
    };

    let title = response.content.trim().trim_matches('"').trim_matches('\'').trim().to_string();

    if title.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_trimming_strips_surrounding_double_quotes() {
        let raw = "  \"Debugging Rust Lifetimes\"  ";
        let title = raw.trim().trim_matches('"').trim_matches('\'').trim();
        assert_eq!(title, "Debugging Rust Lifetimes");
    }

    #[test]
    fn title_trimming_strips_surrounding_single_quotes() {
        let raw = "'Planning a Trip'";
        let title = raw.trim().trim_matches('"').trim_matches('\'').trim();
        assert_eq!(title, "Planning a Trip");
    }

    #[test]
    fn system_prompt_caps_title_length() {
        assert!(TITLE_SYSTEM_PROMPT.contains("3-6 words"));
        assert!(TITLE_SYSTEM_PROMPT.contains("ONLY the title text"));
    }

    #[tokio::test]
    async fn empty_message_list_returns_fallback_without_calling_provider() {
        struct PanicsIfCalled;
        impl crate::llm::provider::LlmProvider for PanicsIfCalled {
            fn name(&self) -> &str {
                "panics"
            }
            fn capabilities(&self) -> &chatmesh_types::llm::ProviderCapabilities {
                unreachable!()
            }
            async fn complete(
                &self,
                _request: &CompletionRequest,
            ) -> Result<chatmesh_types::llm::CompletionResponse, chatmesh_types::error::LlmError> {
                panic!("should not be called")
            }
            fn stream(
                &self,
                _request: CompletionRequest,
            ) -> std::pin::Pin<
                Box<dyn futures_util::Stream<Item = Result<chatmesh_types::llm::StreamEvent, chatmesh_types::error::LlmError>> + Send>,
            > {
                unreachable!()
            }
            async fn count_tokens(
                &self,
                _request: &CompletionRequest,
            ) -> Result<chatmesh_types::llm::TokenCount, chatmesh_types::error::LlmError> {
                unreachable!()
            }
        }

        let provider = BoxLlmProvider::new(PanicsIfCalled);
        let title = generate_title(&provider, &[], "claude-sonnet-4-5").await;
        assert_eq!(title, FALLBACK_TITLE);
    }
}
