//! In-memory conversation store.
//!
//! Conversations live in a shared map guarded by an `RwLock`; each
//! conversation carries its own `Mutex`, so appends to one conversation are
//! serialized while appends to different conversations never contend. The
//! map lock is held only long enough to resolve an entry, never across an
//! append or a snapshot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use super::types::{Conversation, Message, Role};
use super::{mint_conversation_id, ConversationStore};
use crate::error::{Error, Result};

pub struct MemoryConversationStore {
    strict: bool,
    conversations: RwLock<HashMap<String, Arc<Mutex<Conversation>>>>,
}

impl MemoryConversationStore {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the per-conversation handle, or `NotFound`.
    fn entry(&self, id: &str) -> Result<Arc<Mutex<Conversation>>> {
        let map = self
            .conversations
            .read()
            .unwrap_or_else(|e| e.into_inner());
        map.get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("conversation {id}")))
    }
}

impl Default for MemoryConversationStore {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn create_or_get(&self, id: Option<&str>, user_id: Option<&str>) -> Result<String> {
        match id {
            None => {
                let id = mint_conversation_id();
                let conv = Conversation::new(id.clone(), user_id.map(str::to_string));
                let mut map = self
                    .conversations
                    .write()
                    .unwrap_or_else(|e| e.into_inner());
                map.insert(id.clone(), Arc::new(Mutex::new(conv)));
                Ok(id)
            }
            Some(id) => {
                {
                    let map = self
                        .conversations
                        .read()
                        .unwrap_or_else(|e| e.into_inner());
                    if map.contains_key(id) {
                        return Ok(id.to_string());
                    }
                }
                if self.strict {
                    return Err(Error::not_found(format!("conversation {id}")));
                }
                // Lenient mode: an unknown id starts a fresh conversation under it.
                let mut map = self
                    .conversations
                    .write()
                    .unwrap_or_else(|e| e.into_inner());
                map.entry(id.to_string()).or_insert_with(|| {
                    Arc::new(Mutex::new(Conversation::new(
                        id.to_string(),
                        user_id.map(str::to_string),
                    )))
                });
                Ok(id.to_string())
            }
        }
    }

    async fn append_message(&self, id: &str, role: Role, content: &str) -> Result<()> {
        let entry = self.entry(id)?;
        let mut conv = entry.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();
        conv.messages.push(Message {
            role,
            content: content.to_string(),
            created_at: now,
        });
        conv.updated_at = now;
        Ok(())
    }

    async fn history(&self, id: &str) -> Result<Conversation> {
        let entry = self.entry(id)?;
        let conv = entry.lock().unwrap_or_else(|e| e.into_inner());
        Ok(conv.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut map = self
            .conversations
            .write()
            .unwrap_or_else(|e| e.into_inner());
        map.remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("conversation {id}")))
    }

    async fn recent_messages(&self, id: &str, limit: usize) -> Result<Vec<Message>> {
        let entry = self.entry(id)?;
        let conv = entry.lock().unwrap_or_else(|e| e.into_inner());
        let skip = conv.messages.len().saturating_sub(limit);
        Ok(conv.messages[skip..].to_vec())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
