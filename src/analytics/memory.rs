//! In-memory analytics engine.
//!
//! The interaction log is a locked vector in insertion order; per-user
//! sessions are folded incrementally in the same critical section, so a
//! reader never observes a logged interaction whose session update is
//! missing. Lock order is always log before sessions.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::types::{
    CleanupOutcome, ConversationReport, Interaction, OverviewReport, TopicCount, UserReport,
    UserSession,
};
use super::{rank_topics, round2, AnalyticsEngine, OVERVIEW_TOP_TOPICS};
use crate::error::{Error, Result};

pub struct MemoryAnalytics {
    interactions: Mutex<Vec<Interaction>>,
    sessions: Mutex<HashMap<String, UserSession>>,
}

impl MemoryAnalytics {
    pub fn new() -> Self {
        Self {
            interactions: Mutex::new(Vec::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryAnalytics {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalyticsEngine for MemoryAnalytics {
    async fn record(&self, interaction: Interaction) -> Result<()> {
        let mut log = self.interactions.lock().unwrap_or_else(|e| e.into_inner());
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(user_id) = interaction.user_id.clone() {
            sessions
                .entry(user_id)
                .and_modify(|s| s.absorb(&interaction))
                .or_insert_with(|| UserSession::open(&interaction));
        }
        log.push(interaction);
        Ok(())
    }

    async fn overview(&self, days: u32) -> Result<OverviewReport> {
        let now = Utc::now();
        let cutoff = now - Duration::days(i64::from(days));

        let log = self.interactions.lock().unwrap_or_else(|e| e.into_inner());
        let recent: Vec<&Interaction> = log
            .iter()
            .filter(|i| i.recorded_at >= cutoff)
            .collect();

        let total = recent.len() as u64;
        let unique_users = recent
            .iter()
            .map(|i| i.user_key())
            .collect::<HashSet<_>>()
            .len() as u64;
        let avg_message_length = if recent.is_empty() {
            0.0
        } else {
            let sum: u64 = recent.iter().map(|i| u64::from(i.message_length)).sum();
            round2(sum as f64 / recent.len() as f64)
        };
        let mut top_topics = rank_topics(recent.iter().map(|i| i.topic.as_str()));
        top_topics.truncate(OVERVIEW_TOP_TOPICS);

        Ok(OverviewReport {
            total_interactions: total,
            unique_users,
            avg_message_length,
            top_topics,
            period_days: days,
            period_start: cutoff,
            period_end: now,
        })
    }

    async fn popular_topics(&self, days: u32, limit: usize) -> Result<Vec<TopicCount>> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));

        let log = self.interactions.lock().unwrap_or_else(|e| e.into_inner());
        let mut ranked = rank_topics(
            log.iter()
                .filter(|i| i.recorded_at >= cutoff)
                .map(|i| i.topic.as_str()),
        );
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn user_report(&self, user_id: &str) -> Result<UserReport> {
        let session = {
            let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            sessions
                .get(user_id)
                .cloned()
                .ok_or_else(|| Error::not_found(format!("user {user_id}")))?
        };

        let log = self.interactions.lock().unwrap_or_else(|e| e.into_inner());
        let mine: Vec<&Interaction> = log
            .iter()
            .filter(|i| i.user_id.as_deref() == Some(user_id))
            .collect();

        let total_messages = mine.len() as u64;
        let avg_message_length = if mine.is_empty() {
            0.0
        } else {
            let sum: u64 = mine.iter().map(|i| u64::from(i.message_length)).sum();
            round2(sum as f64 / mine.len() as f64)
        };

        let mut topic_preferences: HashMap<String, u64> = HashMap::new();
        for interaction in &mine {
            *topic_preferences.entry(interaction.topic.clone()).or_insert(0) += 1;
        }

        Ok(UserReport {
            user_id: user_id.to_string(),
            first_seen: session.first_seen,
            last_seen: session.last_seen,
            total_interactions: session.total_interactions,
            total_messages,
            avg_message_length,
            topics: session.topics.iter().cloned().collect(),
            topic_preferences,
            session_duration_seconds: session.duration_seconds(),
        })
    }

    async fn conversation_report(&self, conversation_id: &str) -> Result<ConversationReport> {
        let log = self.interactions.lock().unwrap_or_else(|e| e.into_inner());
        let mine: Vec<&Interaction> = log
            .iter()
            .filter(|i| i.conversation_id == conversation_id)
            .collect();

        let (first, last) = match (mine.first(), mine.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return Err(Error::not_found(format!("conversation {conversation_id}"))),
        };

        let mut topics: Vec<String> = Vec::new();
        for interaction in &mine {
            if !topics.iter().any(|t| t == &interaction.topic) {
                topics.push(interaction.topic.clone());
            }
        }

        let msg_sum: u64 = mine.iter().map(|i| u64::from(i.message_length)).sum();
        let resp_sum: u64 = mine.iter().map(|i| u64::from(i.response_length)).sum();
        let n = mine.len() as f64;

        Ok(ConversationReport {
            conversation_id: conversation_id.to_string(),
            user_id: first.user_id.clone(),
            total_messages: mine.len() as u64,
            topics,
            avg_message_length: round2(msg_sum as f64 / n),
            avg_response_length: round2(resp_sum as f64 / n),
            started_at: first.recorded_at,
            ended_at: last.recorded_at,
            duration_seconds: (last.recorded_at - first.recorded_at).num_milliseconds() as f64
                / 1000.0,
        })
    }

    async fn cleanup(&self, days: u32) -> Result<CleanupOutcome> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));

        let mut log = self.interactions.lock().unwrap_or_else(|e| e.into_inner());
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());

        let before = log.len();
        log.retain(|i| i.recorded_at >= cutoff);
        let removed_interactions = (before - log.len()) as u64;

        let before_sessions = sessions.len();
        sessions.retain(|_, s| s.last_seen >= cutoff);
        let removed_sessions = (before_sessions - sessions.len()) as u64;

        tracing::info!(
            cutoff = %cutoff,
            removed_interactions,
            removed_sessions,
            remaining = log.len(),
            "analytics cleanup complete"
        );

        Ok(CleanupOutcome {
            removed_interactions,
            removed_sessions,
            cutoff,
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::derive_session;
    use chrono::{DateTime, Duration, Utc};

    fn interaction(
        user: Option<&str>,
        conversation: &str,
        topic: &str,
        at: DateTime<Utc>,
    ) -> Interaction {
        let mut i = Interaction::new(
            user.map(str::to_string),
            conversation.to_string(),
            "how much sleep do I need".to_string(),
            "seven to nine hours for most adults".to_string(),
            topic.to_string(),
        );
        i.recorded_at = at;
        i
    }

    #[tokio::test]
    async fn empty_overview_is_all_zeros() {
        let engine = MemoryAnalytics::new();
        let report = engine.overview(30).await.unwrap();
        assert_eq!(report.total_interactions, 0);
        assert_eq!(report.unique_users, 0);
        assert_eq!(report.avg_message_length, 0.0);
        assert!(report.top_topics.is_empty());
    }

    #[tokio::test]
    async fn overview_counts_users_with_conversation_fallback() {
        let engine = MemoryAnalytics::new();
        let now = Utc::now();
        engine.record(interaction(Some("u1"), "c1", "insomnia", now)).await.unwrap();
        engine.record(interaction(Some("u1"), "c2", "insomnia", now)).await.unwrap();
        // Anonymous interactions count by conversation id
        engine.record(interaction(None, "c3", "apnea", now)).await.unwrap();
        engine.record(interaction(None, "c3", "apnea", now)).await.unwrap();

        let report = engine.overview(30).await.unwrap();
        assert_eq!(report.total_interactions, 4);
        assert_eq!(report.unique_users, 2); // u1 + proxy c3
    }

    #[tokio::test]
    async fn session_duration_spans_first_to_last() {
        let engine = MemoryAnalytics::new();
        let t1 = Utc::now() - Duration::seconds(300);
        let t2 = t1 + Duration::seconds(120);
        let t3 = t1 + Duration::seconds(270);
        for at in [t1, t2, t3] {
            engine.record(interaction(Some("u1"), "c1", "sleep_science", at)).await.unwrap();
        }

        let report = engine.user_report("u1").await.unwrap();
        assert_eq!(report.total_interactions, 3);
        assert_eq!(report.total_messages, 3);
        assert!((report.session_duration_seconds - 270.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let engine = MemoryAnalytics::new();
        assert!(matches!(
            engine.user_report("nobody").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn popular_topics_rank_and_tie_break() {
        let engine = MemoryAnalytics::new();
        let now = Utc::now();
        // A:5, B:5, C:2 — A first seen before B
        for _ in 0..5 {
            engine.record(interaction(Some("u"), "c", "topic_a", now)).await.unwrap();
        }
        for _ in 0..5 {
            engine.record(interaction(Some("u"), "c", "topic_b", now)).await.unwrap();
        }
        for _ in 0..2 {
            engine.record(interaction(Some("u"), "c", "topic_c", now)).await.unwrap();
        }

        let ranked = engine.popular_topics(30, 10).await.unwrap();
        let names: Vec<&str> = ranked.iter().map(|t| t.topic.as_str()).collect();
        assert_eq!(names, ["topic_a", "topic_b", "topic_c"]);

        let limited = engine.popular_topics(30, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn conversation_report_aggregates_interactions() {
        let engine = MemoryAnalytics::new();
        let t0 = Utc::now() - Duration::seconds(60);
        engine.record(interaction(Some("u1"), "c1", "insomnia", t0)).await.unwrap();
        engine
            .record(interaction(Some("u1"), "c1", "sleep_hygiene", t0 + Duration::seconds(45)))
            .await
            .unwrap();
        engine.record(interaction(Some("u2"), "c2", "apnea", t0)).await.unwrap();

        let report = engine.conversation_report("c1").await.unwrap();
        assert_eq!(report.total_messages, 2);
        assert_eq!(report.user_id.as_deref(), Some("u1"));
        assert_eq!(report.topics, ["insomnia", "sleep_hygiene"]);
        assert!((report.duration_seconds - 45.0).abs() < 1e-9);

        assert!(matches!(
            engine.conversation_report("missing").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn cleanup_removes_only_older_than_cutoff() {
        let engine = MemoryAnalytics::new();
        let now = Utc::now();
        let stale = now - Duration::days(10);
        engine.record(interaction(Some("old_user"), "c1", "t", stale)).await.unwrap();
        engine.record(interaction(Some("new_user"), "c2", "t", now)).await.unwrap();

        let outcome = engine.cleanup(7).await.unwrap();
        assert_eq!(outcome.removed_interactions, 1);
        assert_eq!(outcome.removed_sessions, 1);

        let report = engine.overview(365).await.unwrap();
        assert_eq!(report.total_interactions, 1);
        assert!(engine.user_report("old_user").await.is_err());
        assert!(engine.user_report("new_user").await.is_ok());
    }

    #[tokio::test]
    async fn incremental_sessions_match_log_recomputation() {
        let engine = MemoryAnalytics::new();
        let t0 = Utc::now() - Duration::seconds(500);
        let log: Vec<Interaction> = (0..20)
            .map(|n| {
                interaction(
                    Some(if n % 3 == 0 { "u1" } else { "u2" }),
                    "c1",
                    if n % 2 == 0 { "insomnia" } else { "apnea" },
                    t0 + Duration::seconds(n * 13),
                )
            })
            .collect();
        for i in &log {
            engine.record(i.clone()).await.unwrap();
        }

        for user in ["u1", "u2"] {
            let derived =
                derive_session(log.iter().filter(|i| i.user_id.as_deref() == Some(user)))
                    .unwrap();
            let report = engine.user_report(user).await.unwrap();
            assert_eq!(report.total_interactions, derived.total_interactions);
            assert_eq!(report.first_seen, derived.first_seen);
            assert_eq!(report.last_seen, derived.last_seen);
            let derived_topics: Vec<String> = derived.topics.iter().cloned().collect();
            assert_eq!(report.topics, derived_topics);
        }
    }
}
