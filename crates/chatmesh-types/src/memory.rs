//! Long-term memory types: `ConversationSummary` and `UserProfile`.
//!
//! A `ConversationSummary` is written once per `session_id` by the Memory
//! Writer; a `UserProfile` is merged across every conversation a user has
//! had, one per `user_id`. Both are partitioned by `user_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentiment the Memory Writer's LLM extraction assigns to a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Default for Sentiment {
    fn default() -> Self {
        Sentiment::Neutral
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "positive"),
            Sentiment::Neutral => write!(f, "neutral"),
            Sentiment::Negative => write!(f, "negative"),
        }
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            "negative" => Ok(Sentiment::Negative),
            other => Err(format!("invalid sentiment: '{other}'")),
        }
    }
}

/// A single-paragraph summary of one completed conversation, with
/// extracted entities/sentiment and an embedding vector for semantic
/// retrieval. One per `session_id` per `user_id`; upserted (never
/// appended) so redelivery of the triggering completion event is
/// idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub user_id: String,
    pub session_id: String,
    pub summary: String,
    /// At most 5 themes.
    pub themes: Vec<String>,
    pub persons: Vec<String>,
    pub places: Vec<String>,
    pub user_sentiment: Sentiment,
    pub vector_embedding: Vec<f32>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationSummary {
    pub const MAX_THEMES: usize = 5;
}

/// Structured updates to merge into a `UserProfile`, as produced by the
/// Memory Writer's extraction call alongside a `ConversationSummary`.
///
/// Every field is additive unless explicitly noted by the merge rules in
/// `chatmesh_core::profile`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdates {
    #[serde(default)]
    pub output_preferences: Vec<String>,
    #[serde(default)]
    pub personal_preferences: Vec<String>,
    #[serde(default)]
    pub assistant_preferences: Vec<String>,
    #[serde(default)]
    pub knowledge: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub dislikes: Vec<String>,
    #[serde(default)]
    pub family_and_friends: Vec<String>,
    #[serde(default)]
    pub work_profile: Vec<String>,
    #[serde(default)]
    pub goals: Vec<String>,
}

/// A semi-structured bag of learned facts about a user, merged across
/// every conversation they've had. One per `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub output_preferences: Vec<String>,
    pub personal_preferences: Vec<String>,
    pub assistant_preferences: Vec<String>,
    pub knowledge: Vec<String>,
    pub interests: Vec<String>,
    pub dislikes: Vec<String>,
    pub family_and_friends: Vec<String>,
    pub work_profile: Vec<String>,
    pub goals: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl UserProfile {
    /// An empty profile for a user who has no recorded history yet.
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            output_preferences: Vec::new(),
            personal_preferences: Vec::new(),
            assistant_preferences: Vec::new(),
            knowledge: Vec::new(),
            interests: Vec::new(),
            dislikes: Vec::new(),
            family_and_friends: Vec::new(),
            work_profile: Vec::new(),
            goals: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.output_preferences.is_empty()
            && self.personal_preferences.is_empty()
            && self.assistant_preferences.is_empty()
            && self.knowledge.is_empty()
            && self.interests.is_empty()
            && self.dislikes.is_empty()
            && self.family_and_friends.is_empty()
            && self.work_profile.is_empty()
            && self.goals.is_empty()
    }
}

/// A `ConversationSummary` decorated with its vector-search relevance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedSummary {
    pub summary: ConversationSummary,
    /// Cosine similarity mapped to `[0, 1]` (1 = identical).
    pub relevance_score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_roundtrips() {
        for s in [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative] {
            let str_repr = s.to_string();
            let parsed: Sentiment = str_repr.parse().unwrap();
            assert_eq!(s, parsed);
        }
    }

    #[test]
    fn sentiment_defaults_to_neutral() {
        assert_eq!(Sentiment::default(), Sentiment::Neutral);
    }

    #[test]
    fn empty_profile_has_no_fields_set() {
        let profile = UserProfile::empty("u1");
        assert!(profile.is_empty());
    }

    #[test]
    fn profile_updates_default_is_all_empty_lists() {
        let updates = ProfileUpdates::default();
        assert!(updates.interests.is_empty());
        assert!(updates.dislikes.is_empty());
    }

    #[test]
    fn profile_updates_deserializes_missing_fields_as_empty() {
        let json = r#"{"interests": ["hiking"]}"#;
        let updates: ProfileUpdates = serde_json::from_str(json).unwrap();
        assert_eq!(updates.interests, vec!["hiking".to_string()]);
        assert!(updates.dislikes.is_empty());
    }

    #[test]
    fn conversation_summary_serializes_with_embedding() {
        let summary = ConversationSummary {
            user_id: "u1".into(),
            session_id: "s1".into(),
            summary: "Discussed vacation planning".into(),
            themes: vec!["travel".into()],
            persons: vec![],
            places: vec!["Japan".into()],
            user_sentiment: Sentiment::Positive,
            vector_embedding: vec![0.1, 0.2, 0.3],
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"user_sentiment\":\"positive\""));
        assert!(json.contains("\"vector_embedding\":[0.1,0.2,0.3]"));
    }
}
