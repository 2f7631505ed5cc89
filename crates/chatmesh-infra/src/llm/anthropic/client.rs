//! AnthropicProvider -- concrete [`LlmProvider`] implementation for Anthropic Claude.
//!
//! Sends requests to the Anthropic Messages API (`/v1/messages`) with
//! proper authentication headers. Supports both non-streaming (`complete`)
//! and streaming (`stream`) modes.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use std::pin::Pin;
use std::time::Duration;

use futures_util::Stream;
use secrecy::{ExposeSecret, SecretString};

use chatmesh_core::llm::provider::LlmProvider;
use chatmesh_types::error::LlmError;
use chatmesh_types::llm::{
    CompletionRequest, CompletionResponse, ProviderCapabilities, StopReason, StreamEvent, TokenCount, ToolCall, Usage,
};

use super::streaming::create_anthropic_stream;
use super::types::{AnthropicContentBlock, AnthropicMessage, AnthropicNonStreamResponse, AnthropicRequest, AnthropicTool};

/// Anthropic Claude LLM provider.
///
/// Implements [`LlmProvider`] for the Anthropic Messages API.
///
/// # API Key Security
///
/// The API key is stored as a [`SecretString`] and is only exposed when
/// constructing HTTP request headers. It never appears in Debug output,
/// Display output, or tracing logs.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    capabilities: ProviderCapabilities,
}

impl AnthropicProvider {
    /// The Anthropic API version header value.
    const API_VERSION: &'static str = "2023-06-01";

    /// Create a new Anthropic provider.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Anthropic API key wrapped in SecretString
    /// * `model` - Model identifier (e.g., "claude-sonnet-4-20250514")
    pub fn new(api_key: SecretString, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300)) // 5 min timeout for long generations
            .build()
            .expect("failed to create reqwest client");

        let capabilities = Self::capabilities_for_model(&model);

        Self {
            client,
            api_key,
            base_url: "https://api.anthropic.com".to_string(),
            model,
            capabilities,
        }
    }

    /// The default model for this provider.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Override the base URL (useful for testing or proxies).
    #[allow(dead_code)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Determine capabilities based on model name.
    fn capabilities_for_model(model: &str) -> ProviderCapabilities {
        // Default capabilities for Claude Sonnet
        if model.contains("sonnet") {
            ProviderCapabilities {
                max_context_tokens: 200_000,
                max_output_tokens: 8_192,
                streaming: true,
                tool_calling: true,
                vision: true,
            }
        } else if model.contains("opus") {
            ProviderCapabilities {
                max_context_tokens: 200_000,
                max_output_tokens: 32_000,
                streaming: true,
                tool_calling: true,
                vision: true,
            }
        } else if model.contains("haiku") {
            ProviderCapabilities {
                max_context_tokens: 200_000,
                max_output_tokens: 8_192,
                streaming: true,
                tool_calling: true,
                vision: true,
            }
        } else {
            // Conservative defaults for unknown models
            ProviderCapabilities {
                max_context_tokens: 200_000,
                max_output_tokens: 4_096,
                streaming: true,
                tool_calling: true,
                vision: false,
            }
        }
    }

    /// Build the full API URL for a given path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Convert a generic [`CompletionRequest`] into an [`AnthropicRequest`].
    ///
    /// `tool_results` aren't carried as matching `tool_use`/`tool_result`
    /// content blocks (the caller doesn't retain the tool call's name and
    /// arguments across the loop), so a resumed turn folds them into a
    /// synthetic trailing user message instead of replaying Anthropic's
    /// native tool-use protocol exactly.
    fn to_anthropic_request(&self, request: &CompletionRequest, stream: bool) -> AnthropicRequest {
        let mut messages: Vec<AnthropicMessage> = request
            .messages
            .iter()
            .map(|m| AnthropicMessage { role: m.role.to_string(), content: m.content.clone() })
            .collect();

        if !request.tool_results.is_empty() {
            let rendered = request
                .tool_results
                .iter()
                .map(|r| format!("[tool result{}] {}", if r.is_error { " (error)" } else { "" }, r.content))
                .collect::<Vec<_>>()
                .join("\n");
            messages.push(AnthropicMessage { role: "user".to_string(), content: rendered });
        }

        let tools = (!request.tools.is_empty()).then(|| {
            request
                .tools
                .iter()
                .map(|t| AnthropicTool { name: t.name.clone(), description: t.description.clone(), input_schema: t.parameters.clone() })
                .collect()
        });

        AnthropicRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            messages,
            system: request.system.clone(),
            stream,
            temperature: request.temperature,
            stop_sequences: request.stop_sequences.clone(),
            tools,
        }
    }
}

// AnthropicProvider intentionally does NOT derive Debug to prevent
// accidental exposure of internal state. The SecretString field ensures
// the API key is never printed, but we also omit Debug entirely for defense-in-depth.

impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.to_anthropic_request(request, false);
        let url = self.url("/v1/messages");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 => LlmError::AuthenticationFailed,
                429 => LlmError::RateLimited {
                    retry_after_ms: None,
                },
                529 => LlmError::Overloaded(error_body),
                _ => LlmError::Provider {
                    message: format!("HTTP {status}: {error_body}"),
                },
            });
        }

        let anthropic_resp: AnthropicNonStreamResponse =
            response.json().await.map_err(|e| {
                LlmError::Deserialization(format!("failed to parse response: {e}"))
            })?;

        // Extract text content from the response
        let content = anthropic_resp
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        let tool_calls = anthropic_resp
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::ToolUse { id, name, input } => {
                    Some(ToolCall { id: id.clone(), name: name.clone(), arguments: input.clone() })
                }
                _ => None,
            })
            .collect();

        let stop_reason = match anthropic_resp.stop_reason.as_deref() {
            Some("end_turn") => StopReason::EndTurn,
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            Some("stop_sequence") => StopReason::StopSequence,
            Some("pause_turn") => StopReason::PauseTurn,
            _ => StopReason::EndTurn,
        };

        Ok(CompletionResponse {
            id: anthropic_resp.id,
            content,
            model: anthropic_resp.model,
            stop_reason,
            usage: Usage {
                input_tokens: anthropic_resp.usage.input_tokens,
                output_tokens: anthropic_resp.usage.output_tokens,
                cache_creation_input_tokens: anthropic_resp.usage.cache_creation_input_tokens,
                cache_read_input_tokens: anthropic_resp.usage.cache_read_input_tokens,
            },
            tool_calls,
        })
    }

    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
        let body = self.to_anthropic_request(&request, true);
        let url = self.url("/v1/messages");

        create_anthropic_stream(&self.client, &url, body, &self.api_key)
    }

    async fn count_tokens(&self, request: &CompletionRequest) -> Result<TokenCount, LlmError> {
        // TODO: Use Anthropic's /v1/messages/count_tokens API endpoint for exact counts.
        // For now, use a simple estimation: ~4 chars per token (rough average for English text).
        let mut total_chars: usize = 0;

        // Count system prompt
        if let Some(system) = &request.system {
            total_chars += system.len();
        }

        // Count messages
        for msg in &request.messages {
            total_chars += msg.content.len();
            // Add overhead for role and message structure
            total_chars += 10;
        }

        let estimated_tokens = (total_chars as f64 / 4.0).ceil() as u32;

        Ok(TokenCount {
            input_tokens: estimated_tokens,
        })
    }
}
