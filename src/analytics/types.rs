//! Analytics data model.
//!
//! [`Interaction`] is the append-only unit of record; everything else here
//! is a derived view: [`UserSession`] (incrementally maintained per-user
//! aggregate), the report types returned by the engine queries, and
//! [`derive_session`], the scan-based recomputation that the incremental
//! path must always agree with.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One logged user-message/assistant-response pair. Immutable once written;
/// the length fields are frozen at construction time, never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    /// Identity of the person chatting, when the caller supplied one.
    pub user_id: Option<String>,
    pub conversation_id: String,
    pub message: String,
    pub response: String,
    /// Coarse label from the topic classifier seam.
    pub topic: String,
    pub message_length: u32,
    pub response_length: u32,
    pub recorded_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

impl Interaction {
    /// Build an interaction stamped now, freezing the character counts.
    pub fn new(
        user_id: Option<String>,
        conversation_id: String,
        message: String,
        response: String,
        topic: String,
    ) -> Self {
        let message_length = message.chars().count() as u32;
        let response_length = response.chars().count() as u32;
        Self {
            user_id,
            conversation_id,
            message,
            response,
            topic,
            message_length,
            response_length,
            recorded_at: Utc::now(),
            metadata: None,
        }
    }

    /// Analytics identity for unique-user counting: the user id, or the
    /// conversation id as a documented fallback proxy when no user id was
    /// recorded.
    pub fn user_key(&self) -> &str {
        self.user_id.as_deref().unwrap_or(&self.conversation_id)
    }
}

/// Per-user aggregate, maintained incrementally as interactions are recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSession {
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub total_interactions: u64,
    /// Distinct topics seen, kept sorted for deterministic reporting.
    pub topics: BTreeSet<String>,
}

impl UserSession {
    /// Session opened by a user's first interaction.
    pub fn open(interaction: &Interaction) -> Self {
        let mut topics = BTreeSet::new();
        topics.insert(interaction.topic.clone());
        Self {
            first_seen: interaction.recorded_at,
            last_seen: interaction.recorded_at,
            total_interactions: 1,
            topics,
        }
    }

    /// Fold one more interaction into the session.
    pub fn absorb(&mut self, interaction: &Interaction) {
        self.last_seen = interaction.recorded_at;
        self.total_interactions += 1;
        self.topics.insert(interaction.topic.clone());
    }

    /// `last_seen - first_seen` in seconds; 0 for a single interaction.
    pub fn duration_seconds(&self) -> f64 {
        (self.last_seen - self.first_seen).num_milliseconds() as f64 / 1000.0
    }
}

/// Recompute a session by scanning a user's interactions in insertion order.
///
/// This is the reference semantics that the incremental `record` path is
/// property-tested against; the two must produce identical results.
pub fn derive_session<'a>(
    interactions: impl IntoIterator<Item = &'a Interaction>,
) -> Option<UserSession> {
    let mut session: Option<UserSession> = None;
    for interaction in interactions {
        match session.as_mut() {
            None => session = Some(UserSession::open(interaction)),
            Some(s) => s.absorb(interaction),
        }
    }
    session
}

/// A topic with its interaction count, as ranked by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCount {
    pub topic: String,
    pub count: u64,
}

/// Aggregate summary over a trailing window of days.
#[derive(Debug, Clone, Serialize)]
pub struct OverviewReport {
    pub total_interactions: u64,
    /// Distinct user ids; interactions without one fall back to their
    /// conversation id as a proxy.
    pub unique_users: u64,
    /// Mean message length, 0 when the window is empty.
    pub avg_message_length: f64,
    /// Top five topics, descending count, ties broken by first occurrence.
    pub top_topics: Vec<TopicCount>,
    pub period_days: u32,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

/// Per-user session summary.
#[derive(Debug, Clone, Serialize)]
pub struct UserReport {
    pub user_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub total_interactions: u64,
    pub total_messages: u64,
    pub avg_message_length: f64,
    /// Distinct topics, sorted.
    pub topics: Vec<String>,
    pub topic_preferences: HashMap<String, u64>,
    pub session_duration_seconds: f64,
}

/// Per-conversation summary derived from the interaction log.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationReport {
    pub conversation_id: String,
    /// User id of the first interaction referencing the conversation.
    pub user_id: Option<String>,
    pub total_messages: u64,
    /// Topics touched, in first-seen order.
    pub topics: Vec<String>,
    pub avg_message_length: f64,
    pub avg_response_length: f64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

/// What a retention cleanup removed.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupOutcome {
    pub removed_interactions: u64,
    pub removed_sessions: u64,
    pub cutoff: DateTime<Utc>,
}
