//! Conversation data model.
//!
//! Defines [`Role`] (message sender), [`Message`] (one turn of a
//! conversation), and [`Conversation`] (an ordered message sequence sharing
//! one identifier).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The sender of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A message typed by the person talking to the bot.
    User,
    /// A reply produced by the language model.
    Assistant,
}

impl Role {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// One turn of a conversation, owned exclusively by its [`Conversation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// An ordered, append-only sequence of messages sharing one identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// UUID v7 (time-sortable), minted on first message when absent.
    pub id: String,
    /// Owning user, when the caller identified one.
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Strictly ordered by insertion; `updated_at` is refreshed on every append.
    pub messages: Vec<Message>,
}

impl Conversation {
    /// A fresh, empty conversation under the given id.
    pub fn new(id: String, user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }
}
