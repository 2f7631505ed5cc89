//! Shared domain types for the chat backend.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror,
//! schemars. Every type here is agnostic of which concrete bus, cache,
//! store, or LLM provider backs it; those are traits in `chatmesh-core`
//! implemented by `chatmesh-infra`.

pub mod bus;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod memory;

pub use bus::{CompletionEvent, TokenFragment, TokenPayload, UserMessageEnvelope};
pub use conversation::{Conversation, ConversationListing, Message, MessageRole};
pub use error::DomainError;
pub use memory::{ConversationSummary, ProfileUpdates, UserProfile};
