//! LlmProvider trait definition.
//!
//! The core abstraction every provider backend implements. Uses RPITIT for
//! `complete` and `count_tokens`, and `Pin<Box<dyn Stream>>` for `stream`
//! (streams need to be object-safe for the `BoxLlmProvider` wrapper).
//! `CompletionRequest`/`stream` both carry the tool-calling fields the
//! Generator's search tool needs -- providers that don't support tool
//! calling simply ignore an empty `tools` vector.

use std::pin::Pin;

use futures_util::Stream;

use chatmesh_types::error::LlmError;
use chatmesh_types::llm::{CompletionRequest, CompletionResponse, ProviderCapabilities, StreamEvent, TokenCount};

/// Trait for LLM provider backends (Anthropic, OpenAI-compatible, etc.).
///
/// Implementations live in `chatmesh-infra` (e.g. `AnthropicProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g. "anthropic", "openai-compat").
    fn name(&self) -> &str;

    /// What this provider supports (streaming, tool calling, etc.).
    fn capabilities(&self) -> &ProviderCapabilities;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;

    /// Send a streaming completion request. Returns a stream of events.
    ///
    /// Returns a boxed stream (not RPITIT) because streams need to be
    /// object-safe for the `BoxLlmProvider` wrapper.
    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

    /// Count the tokens in a request without sending it to the LLM.
    fn count_tokens(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<TokenCount, LlmError>> + Send;
}
