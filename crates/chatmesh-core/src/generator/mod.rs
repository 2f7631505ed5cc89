//! The Generator's turn-processing orchestration: load history, run the
//! tool-calling loop against the LLM provider, stream tokens onto the bus,
//! then durably record the completed turn.
//!
//! `chatmesh-core` owns the algorithm; the binary in `chatmesh-service`
//! supplies the concrete bus/store/provider and wires in collaborator
//! timeouts (the personalization memory fetch) that are themselves
//! HTTP calls, not something this crate reaches for directly.

pub mod tool_loop;

use std::time::Duration;

use chatmesh_types::error::{BusError, DomainError};
use chatmesh_types::llm::{CompletionRequest, Message as LlmMessage, MessageRole as LlmMessageRole, SearchConversationHistoryArgs, ToolDefinition, ToolResult, SEARCH_CONVERSATION_HISTORY_TOOL};
use chatmesh_types::{Message, TokenFragment, UserProfile};

use crate::bus::MessageBus;
use crate::conversation::ConversationStore;
use crate::llm::box_provider::BoxLlmProvider;
use crate::memory::profile_store::UserProfileStore;
use crate::memory::summary_store::ConversationSummaryStore;
use crate::memory::BoxEmbedder;

pub use tool_loop::{GeneratorState, ToolCallLoop, ToolCallOutcome};

/// Fetch a user's profile for personalization, bounded by `timeout`. New
/// conversations only -- an existing conversation's system prompt is fixed
/// at its first turn. A timeout or store error both fall back to an empty
/// profile (the base prompt, no personalization section) rather than
/// failing the turn: personalization is an enhancement, not a dependency.
pub async fn personalize(profiles: &impl UserProfileStore, user_id: &str, timeout: Duration) -> UserProfile {
    match tokio::time::timeout(timeout, profiles.get(user_id)).await {
        Ok(Ok(profile)) => profile,
        Ok(Err(err)) => {
            tracing::warn!(%user_id, %err, "profile fetch failed, falling back to base prompt");
            UserProfile::empty(user_id)
        }
        Err(_) => {
            tracing::warn!(%user_id, "profile fetch timed out, falling back to base prompt");
            UserProfile::empty(user_id)
        }
    }
}

/// Assemble the personalized system prompt from a user's accumulated
/// profile. An empty profile yields a plain assistant prompt with no
/// personalization section.
pub fn build_system_prompt(profile: &UserProfile) -> String {
    const BASE: &str = "You are a helpful, friendly assistant having an ongoing conversation with this user.";

    if profile.is_empty() {
        return BASE.to_string();
    }

    let mut sections = Vec::new();
    let mut push = |label: &str, items: &[String]| {
        if !items.is_empty() {
            sections.push(format!("{label}: {}", items.join("; ")));
        }
    };
    push("Known interests", &profile.interests);
    push("Known dislikes", &profile.dislikes);
    push("Personal preferences", &profile.personal_preferences);
    push("Output preferences", &profile.output_preferences);
    push("Assistant preferences", &profile.assistant_preferences);
    push("Known facts", &profile.knowledge);
    push("Family and friends", &profile.family_and_friends);
    push("Work profile", &profile.work_profile);
    push("Goals", &profile.goals);

    if sections.is_empty() {
        BASE.to_string()
    } else {
        format!("{BASE}\n\nWhat you know about this user:\n- {}", sections.join("\n- "))
    }
}

/// Execute the `search_conversation_history` tool against a user's prior
/// conversation summaries. The query text is embedded and searched for
/// matches; `limit` is clamped to `max_search_limit` before reaching the
/// summary store.
pub async fn search_conversation_history(
    embedder: &BoxEmbedder,
    summaries: &impl ConversationSummaryStore,
    user_id: &str,
    args: &SearchConversationHistoryArgs,
    max_search_limit: u32,
) -> Result<String, DomainError> {
    let limit = args.limit.min(max_search_limit).max(1) as usize;
    let embeddings = embedder.embed(&[args.search_query.clone()]).await.map_err(DomainError::from)?;
    let query_embedding = embeddings.into_iter().next().unwrap_or_default();

    let results = summaries
        .search(user_id, &query_embedding, limit)
        .await
        .map_err(DomainError::from)?;

    if results.is_empty() {
        return Ok("No relevant prior conversations found.".to_string());
    }

    let rendered: Vec<String> = results
        .iter()
        .map(|r| format!("- ({:.2} relevance) {}", r.relevance_score, r.summary.summary))
        .collect();
    Ok(rendered.join("\n"))
}

pub fn search_conversation_history_tool() -> ToolDefinition {
    ToolDefinition::from_schema::<SearchConversationHistoryArgs>(
        SEARCH_CONVERSATION_HISTORY_TOOL,
        "Search this user's prior conversation summaries for relevant context",
    )
}

fn to_llm_message(message: &Message) -> LlmMessage {
    LlmMessage {
        role: match message.role {
            chatmesh_types::MessageRole::System => LlmMessageRole::System,
            chatmesh_types::MessageRole::User => LlmMessageRole::User,
            chatmesh_types::MessageRole::Assistant => LlmMessageRole::Assistant,
        },
        content: message.content.clone(),
    }
}

/// Run one turn: resolve any tool calls (capped at `max_tool_calls`), then
/// return the model's final text answer. Does not stream -- the caller
/// streams the final answer separately once the tool loop has settled,
/// since intermediate tool-use turns should never reach the client.
pub async fn resolve_turn(
    provider: &BoxLlmProvider,
    embedder: &BoxEmbedder,
    summaries: &impl ConversationSummaryStore,
    model: &str,
    system_prompt: &str,
    history: &[Message],
    user_message: &str,
    user_id: &str,
    max_tool_calls: u32,
    max_search_limit: u32,
) -> Result<String, DomainError> {
    let mut messages: Vec<LlmMessage> = history.iter().map(to_llm_message).collect();
    messages.push(LlmMessage { role: LlmMessageRole::User, content: user_message.to_string() });

    let mut loop_guard = ToolCallLoop::new(max_tool_calls);
    let mut tool_results: Vec<ToolResult> = Vec::new();
    let mut state = GeneratorState::Streaming;

    loop {
        tracing::trace!(?state, "generator turn step");

        let request = CompletionRequest {
            model: model.to_string(),
            messages: messages.clone(),
            system: Some(system_prompt.to_string()),
            max_tokens: 4096,
            temperature: Some(0.7),
            stream: false,
            stop_sequences: None,
            tools: vec![search_conversation_history_tool()],
            tool_results: std::mem::take(&mut tool_results),
        };

        let response = provider.complete(&request).await.map_err(DomainError::from)?;

        if response.tool_calls.is_empty() {
            // state -> Closed: a final answer, nothing left to resolve.
            return Ok(response.content);
        }

        state = GeneratorState::AwaitingToolResult;

        if loop_guard.register(response.tool_calls.len()) == ToolCallOutcome::CapExceeded {
            // state -> Closed: cap reached, settle for the last response.
            return Ok(response.content);
        }

        for call in &response.tool_calls {
            let result = if call.name == SEARCH_CONVERSATION_HISTORY_TOOL {
                match serde_json::from_value::<SearchConversationHistoryArgs>(call.arguments.clone()) {
                    Ok(args) => match search_conversation_history(embedder, summaries, user_id, &args, max_search_limit).await {
                        Ok(content) => ToolResult { tool_call_id: call.id.clone(), content, is_error: false },
                        Err(err) => ToolResult { tool_call_id: call.id.clone(), content: err.to_string(), is_error: true },
                    },
                    Err(err) => ToolResult {
                        tool_call_id: call.id.clone(),
                        content: format!("invalid arguments: {err}"),
                        is_error: true,
                    },
                }
            } else {
                ToolResult {
                    tool_call_id: call.id.clone(),
                    content: format!("unknown tool: {}", call.name),
                    is_error: true,
                }
            };
            tool_results.push(result);
        }

        state = GeneratorState::Streaming;
    }
}

/// Stream a finished answer onto `token-streams` as a sequence of chunked
/// deltas followed by an end sentinel. Chunking is purely cosmetic here
/// (the real streaming path talks to the provider's `stream` directly);
/// this is used for the tail end of a resolved tool-calling turn, where
/// the text is already final.
pub async fn publish_answer(
    bus: &impl MessageBus,
    session_id: &str,
    chat_message_id: &str,
    answer: &str,
    chunk_size: usize,
) -> Result<(), BusError> {
    for chunk in chunk_text(answer, chunk_size.max(1)) {
        bus.publish_token(TokenFragment::delta(session_id, chat_message_id, chunk)).await?;
    }
    bus.publish_token(TokenFragment::end(session_id, chat_message_id)).await
}

fn chunk_text(text: &str, chunk_size: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let boundary = rest.char_indices().nth(chunk_size).map(|(i, _)| i).unwrap_or(rest.len());
        let (chunk, remainder) = rest.split_at(boundary);
        chunks.push(chunk);
        rest = remainder;
    }
    chunks
}

/// Durably apply one turn once the bus delivery still checks out: persist
/// the user/assistant messages and return whether a title should now be
/// generated (first turn only).
pub async fn record_turn(
    store: &impl ConversationStore,
    session_id: &str,
    chat_message_id: &str,
    user_text: &str,
    answer: &str,
) -> Result<bool, DomainError> {
    let was_first_turn = store.get(session_id).await.map_err(DomainError::from)?.map(|c| c.message_count() == 0).unwrap_or(true);

    store
        .append_turn(session_id, Message::user(chat_message_id, user_text), Message::assistant(chat_message_id, answer))
        .await
        .map_err(DomainError::from)?;

    Ok(was_first_turn)
}

/// Finish a turn: record it, and on the first turn of a conversation,
/// generate and persist a title. Title generation never fails this call --
/// `title::generate_title` already falls back to a fixed default.
pub async fn finalize_turn(
    store: &impl ConversationStore,
    provider: &BoxLlmProvider,
    title_model: &str,
    session_id: &str,
    chat_message_id: &str,
    user_text: &str,
    answer: &str,
) -> Result<(), DomainError> {
    let was_first_turn = record_turn(store, session_id, chat_message_id, user_text, answer).await?;

    if was_first_turn {
        let messages = store.get_messages(session_id).await.map_err(DomainError::from)?;
        let title = crate::title::generate_title(provider, &messages, title_model).await;
        store.set_title(session_id, title).await.map_err(DomainError::from)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_system_prompt_is_plain_for_empty_profile() {
        let prompt = build_system_prompt(&UserProfile::empty("u1"));
        assert!(!prompt.contains("Known interests"));
    }

    #[test]
    fn build_system_prompt_includes_known_sections() {
        let mut profile = UserProfile::empty("u1");
        profile.interests.push("hiking".to_string());
        profile.goals.push("learn rust".to_string());
        let prompt = build_system_prompt(&profile);
        assert!(prompt.contains("Known interests: hiking"));
        assert!(prompt.contains("Goals: learn rust"));
    }

    #[test]
    fn chunk_text_splits_on_char_boundaries() {
        let chunks = chunk_text("hello world", 5);
        assert_eq!(chunks, vec!["hello", " worl", "d"]);
    }

    #[test]
    fn chunk_text_handles_empty_input() {
        assert!(chunk_text("", 5).is_empty());
    }

    use crate::llm::provider::LlmProvider;
    use crate::memory::embedder::Embedder;
    use chatmesh_types::error::{EmbedderError, LlmError, StoreError};
    use chatmesh_types::llm::{CompletionResponse, StopReason, ToolCall, Usage};
    use chatmesh_types::memory::RankedSummary;
    use std::sync::Mutex;

    struct StubEmbedder;
    impl Embedder for StubEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
            Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
        }
        fn model_name(&self) -> &str {
            "stub"
        }
        fn dimension(&self) -> usize {
            3
        }
    }

    struct EmptySummaryStore;
    impl ConversationSummaryStore for EmptySummaryStore {
        async fn search(&self, _user_id: &str, _query_embedding: &[f32], _limit: usize) -> Result<Vec<RankedSummary>, StoreError> {
            Ok(Vec::new())
        }
        async fn upsert(&self, _summary: &chatmesh_types::ConversationSummary) -> Result<(), StoreError> {
            unreachable!()
        }
        async fn get_by_session(&self, _user_id: &str, _session_id: &str) -> Result<Option<chatmesh_types::ConversationSummary>, StoreError> {
            unreachable!()
        }
        async fn delete_all(&self, _user_id: &str) -> Result<u64, StoreError> {
            unreachable!()
        }
    }

    /// Answers directly on the first call, with no tool calls.
    struct DirectAnswerProvider;
    impl LlmProvider for DirectAnswerProvider {
        fn name(&self) -> &str {
            "direct"
        }
        fn capabilities(&self) -> &chatmesh_types::llm::ProviderCapabilities {
            unreachable!()
        }
        async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                id: "resp1".into(),
                content: "The sky is blue.".into(),
                model: "stub-model".into(),
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
                tool_calls: Vec::new(),
            })
        }
        fn stream(
            &self,
            _request: CompletionRequest,
        ) -> std::pin::Pin<Box<dyn futures_util::Stream<Item = Result<chatmesh_types::llm::StreamEvent, LlmError>> + Send>> {
            unreachable!()
        }
        async fn count_tokens(&self, _request: &CompletionRequest) -> Result<chatmesh_types::llm::TokenCount, LlmError> {
            unreachable!()
        }
    }

    /// Always requests the search tool, forever -- used to prove the
    /// tool-call cap terminates the loop instead of spinning indefinitely.
    struct AlwaysToolCallProvider {
        calls: Mutex<u32>,
    }
    impl LlmProvider for AlwaysToolCallProvider {
        fn name(&self) -> &str {
            "loops"
        }
        fn capabilities(&self) -> &chatmesh_types::llm::ProviderCapabilities {
            unreachable!()
        }
        async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            Ok(CompletionResponse {
                id: format!("resp{calls}"),
                content: format!("thinking... (call {calls})"),
                model: "stub-model".into(),
                stop_reason: StopReason::ToolUse,
                usage: Usage::default(),
                tool_calls: vec![ToolCall {
                    id: format!("tool{calls}"),
                    name: SEARCH_CONVERSATION_HISTORY_TOOL.to_string(),
                    arguments: serde_json::json!({"search_query": "anything"}),
                }],
            })
        }
        fn stream(
            &self,
            _request: CompletionRequest,
        ) -> std::pin::Pin<Box<dyn futures_util::Stream<Item = Result<chatmesh_types::llm::StreamEvent, LlmError>> + Send>> {
            unreachable!()
        }
        async fn count_tokens(&self, _request: &CompletionRequest) -> Result<chatmesh_types::llm::TokenCount, LlmError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn resolve_turn_returns_direct_answer_with_no_tool_calls() {
        let provider = BoxLlmProvider::new(DirectAnswerProvider);
        let embedder = BoxEmbedder::new(StubEmbedder);
        let summaries = EmptySummaryStore;

        let answer = resolve_turn(&provider, &embedder, &summaries, "stub-model", "be helpful", &[], "what color is the sky?", "u1", 5, 20)
            .await
            .unwrap();

        assert_eq!(answer, "The sky is blue.");
    }

    #[tokio::test]
    async fn resolve_turn_stops_at_the_tool_call_cap_instead_of_looping_forever() {
        let provider = BoxLlmProvider::new(AlwaysToolCallProvider { calls: Mutex::new(0) });
        let embedder = BoxEmbedder::new(StubEmbedder);
        let summaries = EmptySummaryStore;

        let answer = resolve_turn(&provider, &embedder, &summaries, "stub-model", "be helpful", &[], "search forever", "u1", 3, 20)
            .await
            .unwrap();

        assert!(answer.starts_with("thinking..."));
    }

    use crate::conversation::ConversationStore;
    use chatmesh_types::Conversation;
    use std::sync::Mutex as StdMutex;

    struct SingleConversationStore(StdMutex<Conversation>);
    impl ConversationStore for SingleConversationStore {
        async fn get_or_create(&self, _session_id: &str, _user_id: &str) -> Result<Conversation, StoreError> {
            Ok(self.0.lock().unwrap().clone())
        }
        async fn get(&self, _session_id: &str) -> Result<Option<Conversation>, StoreError> {
            Ok(Some(self.0.lock().unwrap().clone()))
        }
        async fn has_assistant_reply(&self, _session_id: &str, chat_message_id: &str) -> Result<bool, StoreError> {
            Ok(self.0.lock().unwrap().has_assistant_reply(chat_message_id))
        }
        async fn append_turn(&self, _session_id: &str, user_message: Message, assistant_message: Message) -> Result<(), StoreError> {
            self.0.lock().unwrap().append_turn(user_message, assistant_message);
            Ok(())
        }
        async fn set_title(&self, _session_id: &str, title: String) -> Result<(), StoreError> {
            self.0.lock().unwrap().title = Some(title);
            Ok(())
        }
        async fn list_for_user(&self, _user_id: &str, _limit: u32, _offset: u32) -> Result<Vec<chatmesh_types::ConversationListing>, StoreError> {
            unreachable!()
        }
        async fn get_messages(&self, _session_id: &str) -> Result<Vec<Message>, StoreError> {
            Ok(self.0.lock().unwrap().messages.clone())
        }
    }

    #[tokio::test]
    async fn record_turn_reports_first_turn_for_a_brand_new_conversation() {
        let store = SingleConversationStore(StdMutex::new(Conversation::new("s1", "u1")));
        let was_first = record_turn(&store, "s1", "m1", "hi", "hello there").await.unwrap();
        assert!(was_first);

        let was_first_again = record_turn(&store, "s1", "m2", "how are you", "doing well").await.unwrap();
        assert!(!was_first_again);
    }

    struct SlowProfileStore;
    impl UserProfileStore for SlowProfileStore {
        async fn get(&self, user_id: &str) -> Result<UserProfile, StoreError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(UserProfile::empty(user_id))
        }
        async fn upsert(&self, _profile: &UserProfile) -> Result<(), StoreError> {
            unreachable!()
        }
        async fn delete(&self, _user_id: &str) -> Result<(), StoreError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn personalize_falls_back_to_empty_profile_on_timeout() {
        let profile = personalize(&SlowProfileStore, "u1", Duration::from_millis(1)).await;
        assert!(profile.is_empty());
    }

    #[tokio::test]
    async fn finalize_turn_titles_only_the_first_turn() {
        let store = SingleConversationStore(StdMutex::new(Conversation::new("s1", "u1")));
        let provider = BoxLlmProvider::new(DirectAnswerProvider);

        finalize_turn(&store, &provider, "stub-model", "s1", "m1", "hi", "hello there").await.unwrap();
        assert_eq!(store.0.lock().unwrap().title.as_deref(), Some("The sky is blue."));

        store.0.lock().unwrap().title = None;
        finalize_turn(&store, &provider, "stub-model", "s1", "m2", "again", "once more").await.unwrap();
        assert_eq!(store.0.lock().unwrap().title, None);
    }
}
