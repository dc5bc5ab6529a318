//! SQLite-backed conversation store.
//!
//! Conversations and messages live in the `conversations` and `messages`
//! tables (FK cascade on delete). The connection is shared behind a mutex
//! and every operation runs on the blocking pool, so the async executor is
//! never stalled by database work. The mutex is held only for the duration
//! of one statement batch, never across a model call.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::types::{Conversation, Message, Role};
use super::{mint_conversation_id, ConversationStore};
use crate::db::parse_timestamp;
use crate::error::{Error, Result};

pub struct SqliteConversationStore {
    db: Arc<Mutex<Connection>>,
    strict: bool,
}

impl SqliteConversationStore {
    pub fn new(db: Arc<Mutex<Connection>>, strict: bool) -> Self {
        Self { db, strict }
    }

    /// Run a closure against the locked connection on the blocking pool.
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
impl ConversationStore for SqliteConversationStore {
    async fn create_or_get(&self, id: Option<&str>, user_id: Option<&str>) -> Result<String> {
        let id = id.map(str::to_string);
        let user_id = user_id.map(str::to_string);
        let strict = self.strict;

        self.with_conn(move |conn| match id {
            None => {
                let id = mint_conversation_id();
                insert_conversation(conn, &id, user_id.as_deref())?;
                Ok(id)
            }
            Some(id) => {
                if conversation_exists(conn, &id)? {
                    return Ok(id);
                }
                if strict {
                    return Err(Error::not_found(format!("conversation {id}")));
                }
                insert_conversation(conn, &id, user_id.as_deref())?;
                Ok(id)
            }
        })
        .await
    }

    async fn append_message(&self, id: &str, role: Role, content: &str) -> Result<()> {
        let id = id.to_string();
        let content = content.to_string();

        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction().map_err(Error::from)?;

            let updated = tx.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            if updated == 0 {
                return Err(Error::not_found(format!("conversation {id}")));
            }

            tx.execute(
                "INSERT INTO messages (conversation_id, role, content, created_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, role.as_str(), content, now],
            )?;

            tx.commit().map_err(Error::from)
        })
        .await
    }

    async fn history(&self, id: &str) -> Result<Conversation> {
        let id = id.to_string();

        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT user_id, created_at, updated_at FROM conversations WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok((
                            row.get::<_, Option<String>>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;

            let (user_id, created_at, updated_at) =
                row.ok_or_else(|| Error::not_found(format!("conversation {id}")))?;

            let mut stmt = conn.prepare(
                "SELECT role, content, created_at FROM messages \
                 WHERE conversation_id = ?1 ORDER BY id",
            )?;
            let messages = stmt
                .query_map(params![id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?
                .into_iter()
                .map(|(role, content, ts)| {
                    Ok(Message {
                        role: role
                            .parse::<Role>()
                            .map_err(|e| Error::Internal(anyhow::anyhow!(e)))?,
                        content,
                        created_at: parse_timestamp(&ts)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(Conversation {
                id,
                user_id,
                created_at: parse_timestamp(&created_at)?,
                updated_at: parse_timestamp(&updated_at)?,
                messages,
            })
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();

        self.with_conn(move |conn| {
            // Messages cascade via the FK
            let deleted = conn.execute(
                "DELETE FROM conversations WHERE id = ?1",
                params![id],
            )?;
            if deleted == 0 {
                return Err(Error::not_found(format!("conversation {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn recent_messages(&self, id: &str, limit: usize) -> Result<Vec<Message>> {
        let id = id.to_string();

        self.with_conn(move |conn| {
            if !conversation_exists(conn, &id)? {
                return Err(Error::not_found(format!("conversation {id}")));
            }

            let mut stmt = conn.prepare(
                "SELECT role, content, created_at FROM messages \
                 WHERE conversation_id = ?1 ORDER BY id DESC LIMIT ?2",
            )?;
            let mut messages = stmt
                .query_map(params![id, limit as i64], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?
                .into_iter()
                .map(|(role, content, ts)| {
                    Ok(Message {
                        role: role
                            .parse::<Role>()
                            .map_err(|e| Error::Internal(anyhow::anyhow!(e)))?,
                        content,
                        created_at: parse_timestamp(&ts)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            // Query returned newest-first; the model wants oldest-first.
            messages.reverse();
            Ok(messages)
        })
        .await
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

/// Insert a fresh conversation row stamped with the current time.
fn insert_conversation(conn: &Connection, id: &str, user_id: Option<&str>) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR IGNORE INTO conversations (id, user_id, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?3)",
        params![id, user_id, now],
    )?;
    Ok(())
}

fn conversation_exists(conn: &Connection, id: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM conversations WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_store(strict: bool) -> SqliteConversationStore {
        let conn = db::open_memory_database().unwrap();
        SqliteConversationStore::new(Arc::new(Mutex::new(conn)), strict)
    }

    #[tokio::test]
    async fn create_append_and_read_back() {
        let store = test_store(false);
        let id = store.create_or_get(None, Some("u1")).await.unwrap();

        store.append_message(&id, Role::User, "What is REM sleep?").await.unwrap();
        store
            .append_message(&id, Role::Assistant, "REM is the dreaming stage.")
            .await
            .unwrap();

        let conv = store.history(&id).await.unwrap();
        assert_eq!(conv.user_id.as_deref(), Some("u1"));
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0].role, Role::User);
        assert_eq!(conv.messages[1].role, Role::Assistant);
        assert!(conv.updated_at >= conv.created_at);
    }

    #[tokio::test]
    async fn strict_mode_rejects_unknown_id() {
        let store = test_store(true);
        let err = store.create_or_get(Some("ghost"), None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn lenient_mode_creates_under_supplied_id() {
        let store = test_store(false);
        let id = store.create_or_get(Some("chosen-id"), None).await.unwrap();
        assert_eq!(id, "chosen-id");
        assert!(store.history("chosen-id").await.is_ok());
    }

    #[tokio::test]
    async fn delete_cascades_messages() {
        let store = test_store(false);
        let id = store.create_or_get(None, None).await.unwrap();
        store.append_message(&id, Role::User, "hello").await.unwrap();

        store.delete(&id).await.unwrap();
        assert!(matches!(
            store.history(&id).await.unwrap_err(),
            Error::NotFound(_)
        ));

        // Verify no orphaned message rows survive the cascade
        let db = Arc::clone(&store.db);
        let count: i64 = tokio::task::spawn_blocking(move || {
            let conn = db.lock().unwrap();
            conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
                .unwrap()
        })
        .await
        .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn recent_messages_windows_oldest_first() {
        let store = test_store(false);
        let id = store.create_or_get(None, None).await.unwrap();
        for i in 0..6 {
            store
                .append_message(&id, Role::User, &format!("m{i}"))
                .await
                .unwrap();
        }

        let window = store.recent_messages(&id, 4).await.unwrap();
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m2", "m3", "m4", "m5"]);
    }

    #[tokio::test]
    async fn append_to_unknown_conversation_fails() {
        let store = test_store(false);
        let err = store
            .append_message("missing", Role::User, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
