//! SQLite-backed analytics engine.
//!
//! Interactions land in the `interactions` table; per-user sessions are
//! upserted in the same transaction (`user_sessions` + `user_session_topics`),
//! so the log and the incremental aggregates move together. Ranking queries
//! use `ORDER BY count DESC, MIN(id) ASC` to keep the first-occurrence
//! tie-break deterministic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::types::{
    CleanupOutcome, ConversationReport, Interaction, OverviewReport, TopicCount, UserReport,
};
use super::{round2, AnalyticsEngine, OVERVIEW_TOP_TOPICS};
use crate::db::parse_timestamp;
use crate::error::{Error, Result};

pub struct SqliteAnalytics {
    db: Arc<Mutex<Connection>>,
}

impl SqliteAnalytics {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl AnalyticsEngine for SqliteAnalytics {
    async fn record(&self, interaction: Interaction) -> Result<()> {
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(Error::from)?;
            let recorded_at = interaction.recorded_at.to_rfc3339();
            let metadata = interaction
                .metadata
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| Error::Internal(e.into()))?;

            tx.execute(
                "INSERT INTO interactions \
                 (user_id, conversation_id, message, response, topic, \
                  message_length, response_length, recorded_at, metadata) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    interaction.user_id,
                    interaction.conversation_id,
                    interaction.message,
                    interaction.response,
                    interaction.topic,
                    interaction.message_length,
                    interaction.response_length,
                    recorded_at,
                    metadata,
                ],
            )?;

            if let Some(user_id) = &interaction.user_id {
                tx.execute(
                    "INSERT INTO user_sessions (user_id, first_seen, last_seen, total_interactions) \
                     VALUES (?1, ?2, ?2, 1) \
                     ON CONFLICT(user_id) DO UPDATE SET \
                       last_seen = excluded.last_seen, \
                       total_interactions = total_interactions + 1",
                    params![user_id, recorded_at],
                )?;
                tx.execute(
                    "INSERT OR IGNORE INTO user_session_topics (user_id, topic) VALUES (?1, ?2)",
                    params![user_id, interaction.topic],
                )?;
            }

            tx.commit().map_err(Error::from)
        })
        .await
    }

    async fn overview(&self, days: u32) -> Result<OverviewReport> {
        let now = Utc::now();
        let cutoff = now - Duration::days(i64::from(days));
        let cutoff_str = cutoff.to_rfc3339();

        self.with_conn(move |conn| {
            let (total, unique_users, avg): (i64, i64, Option<f64>) = conn.query_row(
                "SELECT COUNT(*), COUNT(DISTINCT COALESCE(user_id, conversation_id)), \
                        AVG(message_length) \
                 FROM interactions WHERE recorded_at >= ?1",
                params![cutoff_str],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

            let mut stmt = conn.prepare(
                "SELECT topic, COUNT(*) AS n FROM interactions WHERE recorded_at >= ?1 \
                 GROUP BY topic ORDER BY n DESC, MIN(id) ASC LIMIT ?2",
            )?;
            let top_topics = stmt
                .query_map(params![cutoff_str, OVERVIEW_TOP_TOPICS as i64], |row| {
                    Ok(TopicCount {
                        topic: row.get(0)?,
                        count: row.get::<_, i64>(1)? as u64,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(OverviewReport {
                total_interactions: total as u64,
                unique_users: unique_users as u64,
                avg_message_length: avg.map(round2).unwrap_or(0.0),
                top_topics,
                period_days: days,
                period_start: cutoff,
                period_end: now,
            })
        })
        .await
    }

    async fn popular_topics(&self, days: u32, limit: usize) -> Result<Vec<TopicCount>> {
        let cutoff_str = (Utc::now() - Duration::days(i64::from(days))).to_rfc3339();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT topic, COUNT(*) AS n FROM interactions WHERE recorded_at >= ?1 \
                 GROUP BY topic ORDER BY n DESC, MIN(id) ASC LIMIT ?2",
            )?;
            let ranked = stmt
                .query_map(params![cutoff_str, limit as i64], |row| {
                    Ok(TopicCount {
                        topic: row.get(0)?,
                        count: row.get::<_, i64>(1)? as u64,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ranked)
        })
        .await
    }

    async fn user_report(&self, user_id: &str) -> Result<UserReport> {
        let user_id = user_id.to_string();

        self.with_conn(move |conn| {
            let session: Option<(String, String, i64)> = conn
                .query_row(
                    "SELECT first_seen, last_seen, total_interactions \
                     FROM user_sessions WHERE user_id = ?1",
                    params![user_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            let (first_seen, last_seen, total_interactions) =
                session.ok_or_else(|| Error::not_found(format!("user {user_id}")))?;
            let first_seen = parse_timestamp(&first_seen)?;
            let last_seen = parse_timestamp(&last_seen)?;

            let mut stmt = conn.prepare(
                "SELECT topic FROM user_session_topics WHERE user_id = ?1 ORDER BY topic",
            )?;
            let topics = stmt
                .query_map(params![user_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let (total_messages, avg): (i64, Option<f64>) = conn.query_row(
                "SELECT COUNT(*), AVG(message_length) FROM interactions WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let mut stmt = conn.prepare(
                "SELECT topic, COUNT(*) FROM interactions WHERE user_id = ?1 GROUP BY topic",
            )?;
            let topic_preferences: HashMap<String, u64> = stmt
                .query_map(params![user_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                })?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;

            Ok(UserReport {
                user_id,
                first_seen,
                last_seen,
                total_interactions: total_interactions as u64,
                total_messages: total_messages as u64,
                avg_message_length: avg.map(round2).unwrap_or(0.0),
                topics,
                topic_preferences,
                session_duration_seconds: (last_seen - first_seen).num_milliseconds() as f64
                    / 1000.0,
            })
        })
        .await
    }

    async fn conversation_report(&self, conversation_id: &str) -> Result<ConversationReport> {
        let conversation_id = conversation_id.to_string();

        self.with_conn(move |conn| {
            let (total, avg_msg, avg_resp, start, end): (
                i64,
                Option<f64>,
                Option<f64>,
                Option<String>,
                Option<String>,
            ) = conn.query_row(
                "SELECT COUNT(*), AVG(message_length), AVG(response_length), \
                        MIN(recorded_at), MAX(recorded_at) \
                 FROM interactions WHERE conversation_id = ?1",
                params![conversation_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )?;

            if total == 0 {
                return Err(Error::not_found(format!(
                    "conversation {conversation_id}"
                )));
            }
            let started_at = parse_timestamp(&start.expect("non-empty aggregate"))?;
            let ended_at = parse_timestamp(&end.expect("non-empty aggregate"))?;

            let user_id: Option<String> = conn.query_row(
                "SELECT user_id FROM interactions WHERE conversation_id = ?1 \
                 ORDER BY id LIMIT 1",
                params![conversation_id],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(
                "SELECT topic FROM interactions WHERE conversation_id = ?1 \
                 GROUP BY topic ORDER BY MIN(id)",
            )?;
            let topics = stmt
                .query_map(params![conversation_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(ConversationReport {
                conversation_id,
                user_id,
                total_messages: total as u64,
                topics,
                avg_message_length: avg_msg.map(round2).unwrap_or(0.0),
                avg_response_length: avg_resp.map(round2).unwrap_or(0.0),
                started_at,
                ended_at,
                duration_seconds: (ended_at - started_at).num_milliseconds() as f64 / 1000.0,
            })
        })
        .await
    }

    async fn cleanup(&self, days: u32) -> Result<CleanupOutcome> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let cutoff_str = cutoff.to_rfc3339();

        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(Error::from)?;

            let removed_interactions = tx.execute(
                "DELETE FROM interactions WHERE recorded_at < ?1",
                params![cutoff_str],
            )? as u64;

            // Session topic rows cascade via the FK
            let removed_sessions = tx.execute(
                "DELETE FROM user_sessions WHERE last_seen < ?1",
                params![cutoff_str],
            )? as u64;

            tx.commit().map_err(Error::from)?;

            tracing::info!(
                cutoff = %cutoff,
                removed_interactions,
                removed_sessions,
                "analytics cleanup complete"
            );

            Ok(CleanupOutcome {
                removed_interactions,
                removed_sessions,
                cutoff,
            })
        })
        .await
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
