//! Conversation and Message types -- the `Conversation` data model.
//!
//! A `Conversation` is keyed by `session_id`, owned by exactly one
//! `user_id`, and holds an append-only ordered sequence of `Message`s. The
//! system message, when present, is always the first element and encodes
//! the personalized prompt assembled during generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// MessageRole is shared with the LLM wire types (`crate::llm`); a message
// stored in a conversation and a message sent to a provider use the same
// three roles.
pub use crate::llm::MessageRole;

/// A single message within a conversation.
///
/// `message_id` is derived as `{chatMessageId}_{role}` so that the user and
/// assistant message of one turn share a correlator back to the
/// `chatMessageId` that created them. Messages are append-only; there is no
/// update or delete path in the data model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Build a user/assistant message id: `{chat_message_id}_{role}`.
    pub fn derive_id(chat_message_id: &str, role: MessageRole) -> String {
        format!("{chat_message_id}_{role}")
    }

    pub fn user(chat_message_id: &str, content: impl Into<String>) -> Self {
        Self {
            message_id: Self::derive_id(chat_message_id, MessageRole::User),
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(chat_message_id: &str, content: impl Into<String>) -> Self {
        Self {
            message_id: Self::derive_id(chat_message_id, MessageRole::Assistant),
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            message_id: "system".to_string(),
            role: MessageRole::System,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A chat conversation, keyed by `session_id`, owned by exactly one user.
///
/// `title` is absent until the History Writer generates one on first
/// persist. `messages` is append-only and mutated only by the Generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub session_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub title: Option<String>,
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Start a brand new, empty conversation.
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            created_at: now,
            last_activity: now,
            title: None,
            messages: Vec::new(),
        }
    }

    /// The number of messages currently stored, excluding the system prompt.
    pub fn message_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .count()
    }

    /// Whether an assistant message for this `chat_message_id` already
    /// exists -- the idempotency check the Generator uses on bus redelivery.
    pub fn has_assistant_reply(&self, chat_message_id: &str) -> bool {
        let target = Message::derive_id(chat_message_id, MessageRole::Assistant);
        self.messages.iter().any(|m| m.message_id == target)
    }

    /// Append a user/assistant turn. Idempotent callers should check
    /// `has_assistant_reply` first.
    pub fn append_turn(&mut self, user: Message, assistant: Message) {
        self.messages.push(user);
        self.messages.push(assistant);
        self.last_activity = Utc::now();
    }
}

/// Metadata-only view of a `Conversation`, as returned by a conversation
/// listing -- no message bodies, just enough to render a sidebar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationListing {
    pub session_id: String,
    pub title: Option<String>,
    pub last_activity: DateTime<Utc>,
    pub message_count: usize,
}

impl From<&Conversation> for ConversationListing {
    fn from(convo: &Conversation) -> Self {
        Self {
            session_id: convo.session_id.clone(),
            title: convo.title.clone(),
            last_activity: convo.last_activity,
            message_count: convo.message_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_role_roundtrips_through_display_and_fromstr() {
        for role in [MessageRole::System, MessageRole::User, MessageRole::Assistant] {
            let s = role.to_string();
            let parsed: MessageRole = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn message_ids_share_the_chat_message_id_correlator() {
        let user = Message::user("m1", "hello");
        let assistant = Message::assistant("m1", "hi there");
        assert_eq!(user.message_id, "m1_user");
        assert_eq!(assistant.message_id, "m1_assistant");
    }

    #[test]
    fn has_assistant_reply_detects_existing_turn() {
        let mut convo = Conversation::new("s1", "u1");
        assert!(!convo.has_assistant_reply("m1"));
        convo.append_turn(Message::user("m1", "hi"), Message::assistant("m1", "hello"));
        assert!(convo.has_assistant_reply("m1"));
        assert!(!convo.has_assistant_reply("m2"));
    }

    #[test]
    fn message_count_excludes_system_prompt() {
        let mut convo = Conversation::new("s1", "u1");
        convo.messages.push(Message::system("you are helpful"));
        convo.append_turn(Message::user("m1", "hi"), Message::assistant("m1", "hello"));
        assert_eq!(convo.message_count(), 2);
    }

    #[test]
    fn listing_derives_message_count_excluding_system() {
        let mut convo = Conversation::new("s1", "u1");
        convo.messages.push(Message::system("be helpful"));
        convo.append_turn(Message::user("m1", "hi"), Message::assistant("m1", "hello"));
        let listing = ConversationListing::from(&convo);
        assert_eq!(listing.message_count, 2);
        assert_eq!(listing.session_id, "s1");
    }

    #[test]
    fn conversation_serializes_with_expected_shape() {
        let convo = Conversation::new("s1", "u1");
        let json = serde_json::to_string(&convo).unwrap();
        assert!(json.contains("\"session_id\":\"s1\""));
        assert!(json.contains("\"user_id\":\"u1\""));
    }
}
