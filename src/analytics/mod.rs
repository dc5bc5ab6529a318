//! Analytics engine — interaction logging and derived statistics.
//!
//! [`AnalyticsEngine`] is a pure accumulate-and-query log: `record` appends
//! and incrementally maintains per-user sessions, the query methods scan a
//! bounded-retention window, and `cleanup` evicts old entries. Two backends
//! implement it: [`MemoryAnalytics`] and [`SqliteAnalytics`].
//!
//! Topic labels come from the [`TopicClassifier`] seam; the default
//! [`FixedTopic`] tags every interaction with one constant label so a real
//! classifier can be plugged in later without touching the engine contract.

pub mod memory;
pub mod sqlite;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
pub use memory::MemoryAnalytics;
pub use sqlite::SqliteAnalytics;
pub use types::{
    derive_session, CleanupOutcome, ConversationReport, Interaction, OverviewReport, TopicCount,
    UserReport, UserSession,
};

/// Number of topics included in an overview report.
pub(crate) const OVERVIEW_TOP_TOPICS: usize = 5;

/// Maps a user message to a coarse topic label.
pub trait TopicClassifier: Send + Sync {
    fn classify(&self, message: &str) -> String;
}

/// The default classifier: every message gets the same configured label.
pub struct FixedTopic(pub String);

impl TopicClassifier for FixedTopic {
    fn classify(&self, _message: &str) -> String {
        self.0.clone()
    }
}

/// Contract for the interaction log and its derived aggregates.
#[async_trait]
pub trait AnalyticsEngine: Send + Sync {
    /// Append one interaction and fold it into the owning user's session.
    /// Each call completes exactly once, fully or not at all.
    async fn record(&self, interaction: Interaction) -> Result<()>;

    /// Aggregate summary over the trailing `days`.
    async fn overview(&self, days: u32) -> Result<OverviewReport>;

    /// Topics ranked by descending count over the trailing `days`, ties
    /// broken by first occurrence, truncated to `limit`.
    async fn popular_topics(&self, days: u32, limit: usize) -> Result<Vec<TopicCount>>;

    /// Session summary for one user, or `NotFound` when the user has no
    /// recorded session.
    async fn user_report(&self, user_id: &str) -> Result<UserReport>;

    /// Summary of one conversation's interactions, or `NotFound` when no
    /// interaction references the id.
    async fn conversation_report(&self, conversation_id: &str) -> Result<ConversationReport>;

    /// Delete interactions older than `now - days`, and drop sessions whose
    /// `last_seen` predates the cutoff. Never removes anything newer; safe
    /// to call concurrently with `record`.
    async fn cleanup(&self, days: u32) -> Result<CleanupOutcome>;

    /// The name of this engine implementation.
    fn name(&self) -> &str;
}

/// Round to two decimals, the precision reported by every average field.
pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Rank topics from a scan: descending count, ties by first occurrence.
///
/// `topics` must be yielded in log insertion order for the tie-break to be
/// deterministic.
pub(crate) fn rank_topics<'a>(topics: impl IntoIterator<Item = &'a str>) -> Vec<TopicCount> {
    let mut counts: Vec<(String, u64)> = Vec::new();
    for topic in topics {
        match counts.iter_mut().find(|(t, _)| t == topic) {
            Some((_, c)) => *c += 1,
            None => counts.push((topic.to_string(), 1)),
        }
    }
    // Stable sort keeps first-occurrence order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .map(|(topic, count)| TopicCount { topic, count })
        .collect()
}
