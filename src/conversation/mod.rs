//! Conversation store — lifecycle and ordered message sequences.
//!
//! [`ConversationStore`] is the storage-agnostic contract consumed by the
//! chat orchestrator. Two backends implement it: [`MemoryConversationStore`]
//! (process-local map with per-conversation locks, matching the reference
//! in-memory semantics) and [`SqliteConversationStore`] (durable tables
//! behind the same interface).

pub mod memory;
pub mod sqlite;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
pub use memory::MemoryConversationStore;
pub use sqlite::SqliteConversationStore;
pub use types::{Conversation, Message, Role};

/// Storage contract for conversations and their messages.
///
/// Appends to a given conversation id are serialized by the backend;
/// appends to different conversations proceed independently.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Resolve a conversation id, minting a fresh one when `id` is `None`.
    ///
    /// An unknown id is accepted and creates a fresh conversation under that
    /// id (idempotent creation), unless the store was built in strict mode,
    /// in which case it fails with `NotFound`.
    async fn create_or_get(&self, id: Option<&str>, user_id: Option<&str>) -> Result<String>;

    /// Append a message, stamping it with the current time and refreshing
    /// the conversation's `updated_at`. Fails with `NotFound` on unknown id.
    async fn append_message(&self, id: &str, role: Role, content: &str) -> Result<()>;

    /// Full conversation snapshot, or `NotFound`.
    async fn history(&self, id: &str) -> Result<Conversation>;

    /// Remove the conversation and all its messages atomically, or `NotFound`.
    /// The interaction log is unaffected by conversation deletion.
    async fn delete(&self, id: &str) -> Result<()>;

    /// The most recent `limit` messages, oldest-first. Used to build the
    /// model context window.
    async fn recent_messages(&self, id: &str, limit: usize) -> Result<Vec<Message>>;

    /// The name of this store implementation.
    fn name(&self) -> &str;
}

/// Mint a new globally-unique conversation id (UUID v7, time-sortable).
pub fn mint_conversation_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
