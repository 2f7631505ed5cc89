//! Wire envelopes for the three bus topics: `user-messages`, `token-streams`,
//! and `message-completed`.
//!
//! These are the payloads the message bus abstraction (`chatmesh-core::bus`)
//! moves around; they carry only the identifiers and content needed by
//! downstream consumers, never internal collaborator identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope published by Ingress onto `user-messages`.
///
/// `session_id` is used as the bus partition key but this topic is *not* a
/// bus session -- delivery is competing-consumer and unordered across
/// sessions; per-session ordering is the Generator's job via the hot cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessageEnvelope {
    pub session_id: String,
    pub user_id: String,
    pub chat_message_id: String,
    pub text: String,
    pub submitted_at: DateTime<Utc>,
}

/// Payload of a `token-streams` fragment: either a text delta or the
/// end-of-stream sentinel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenPayload {
    Delta { text: String },
    End,
    /// Carries a user-safe error message; Egress renders this as an SSE
    /// `error` event and then closes.
    Error { message: String },
}

/// A single fragment published to `token-streams`, keyed by `session_id`
/// (the bus session) and filtered downstream by `chat_message_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenFragment {
    pub session_id: String,
    pub chat_message_id: String,
    pub payload: TokenPayload,
}

impl TokenFragment {
    pub fn delta(session_id: impl Into<String>, chat_message_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            chat_message_id: chat_message_id.into(),
            payload: TokenPayload::Delta { text: text.into() },
        }
    }

    pub fn end(session_id: impl Into<String>, chat_message_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            chat_message_id: chat_message_id.into(),
            payload: TokenPayload::End,
        }
    }

    pub fn error(session_id: impl Into<String>, chat_message_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            chat_message_id: chat_message_id.into(),
            payload: TokenPayload::Error { message: message.into() },
        }
    }
}

/// Event published on `message-completed` after a turn is fully generated
/// and synchronously written to the hot cache. Drives History Writer and
/// Memory Writer, each on its own independent subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub session_id: String,
    pub user_id: String,
    pub chat_message_id: String,
    pub completed_at: DateTime<Utc>,
    pub event_type: CompletionEventType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionEventType {
    MessageCompleted,
}

impl CompletionEvent {
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>, chat_message_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            chat_message_id: chat_message_id.into(),
            completed_at: Utc::now(),
            event_type: CompletionEventType::MessageCompleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_envelope_roundtrips() {
        let env = UserMessageEnvelope {
            session_id: "s1".into(),
            user_id: "u1".into(),
            chat_message_id: "m1".into(),
            text: "Hello".into(),
            submitted_at: Utc::now(),
        };
        let json = serde_json::to_string(&env).unwrap();
        let parsed: UserMessageEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.session_id, "s1");
        assert_eq!(parsed.text, "Hello");
    }

    #[test]
    fn token_fragment_delta_tags_correctly() {
        let frag = TokenFragment::delta("s1", "m1", "Hel");
        let json = serde_json::to_string(&frag).unwrap();
        assert!(json.contains("\"kind\":\"delta\""));
        assert!(json.contains("\"text\":\"Hel\""));
    }

    #[test]
    fn token_fragment_end_has_no_text() {
        let frag = TokenFragment::end("s1", "m1");
        assert_eq!(frag.payload, TokenPayload::End);
        let json = serde_json::to_string(&frag).unwrap();
        assert!(json.contains("\"kind\":\"end\""));
    }

    #[test]
    fn completion_event_defaults_to_message_completed() {
        let event = CompletionEvent::new("s1", "u1", "m1");
        assert_eq!(event.event_type, CompletionEventType::MessageCompleted);
    }
}
