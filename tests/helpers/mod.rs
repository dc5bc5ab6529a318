#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use somnus::analytics::{
    AnalyticsEngine, FixedTopic, Interaction, MemoryAnalytics, SqliteAnalytics,
};
use somnus::chat::ChatOrchestrator;
use somnus::conversation::{
    ConversationStore, MemoryConversationStore, Message, SqliteConversationStore,
};
use somnus::db;
use somnus::model::{ModelError, ModelProvider, ModelReply};

/// Both conversation-store backends, for running the same scenario twice.
pub fn conversation_stores() -> Vec<(&'static str, Arc<dyn ConversationStore>)> {
    vec![
        ("memory", Arc::new(MemoryConversationStore::new(false))),
        ("sqlite", sqlite_conversation_store(false)),
    ]
}

pub fn sqlite_conversation_store(strict: bool) -> Arc<dyn ConversationStore> {
    let conn = db::open_memory_database().unwrap();
    Arc::new(SqliteConversationStore::new(
        Arc::new(Mutex::new(conn)),
        strict,
    ))
}

/// Both analytics backends.
pub fn analytics_engines() -> Vec<(&'static str, Arc<dyn AnalyticsEngine>)> {
    vec![
        ("memory", Arc::new(MemoryAnalytics::new())),
        ("sqlite", sqlite_analytics()),
    ]
}

pub fn sqlite_analytics() -> Arc<dyn AnalyticsEngine> {
    let conn = db::open_memory_database().unwrap();
    Arc::new(SqliteAnalytics::new(Arc::new(Mutex::new(conn))))
}

/// An interaction with a controlled timestamp.
pub fn interaction_at(
    user: Option<&str>,
    conversation: &str,
    topic: &str,
    at: DateTime<Utc>,
) -> Interaction {
    let mut i = Interaction::new(
        user.map(str::to_string),
        conversation.to_string(),
        "how do naps affect night sleep".to_string(),
        "short naps before mid-afternoon rarely do".to_string(),
        topic.to_string(),
    );
    i.recorded_at = at;
    i
}

fn reply(text: &str) -> ModelReply {
    ModelReply {
        text: text.to_string(),
        sources: Vec::new(),
        confidence: None,
    }
}

/// Model provider that plays back a queue of canned outcomes, then an
/// optional evergreen reply for every call after the queue drains.
pub struct ScriptedModel {
    queue: Mutex<VecDeque<Result<ModelReply, ModelError>>>,
    evergreen: Option<ModelReply>,
}

impl ScriptedModel {
    pub fn replying(texts: &[&str]) -> Self {
        Self {
            queue: Mutex::new(texts.iter().map(|t| Ok(reply(t))).collect()),
            evergreen: None,
        }
    }

    /// Every call succeeds with the same reply, forever.
    pub fn echoing(text: &str) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            evergreen: Some(reply(text)),
        }
    }

    pub fn failing(error: ModelError) -> Self {
        Self {
            queue: Mutex::new(VecDeque::from([Err(error)])),
            evergreen: None,
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedModel {
    async fn generate(
        &self,
        _system: &str,
        _history: &[Message],
    ) -> Result<ModelReply, ModelError> {
        if let Some(outcome) = self.queue.lock().unwrap().pop_front() {
            return outcome;
        }
        match &self.evergreen {
            Some(reply) => Ok(reply.clone()),
            None => Err(ModelError::Unavailable("script exhausted".into())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Orchestrator over the given stores with test-friendly defaults.
pub fn orchestrator(
    conversations: Arc<dyn ConversationStore>,
    analytics: Arc<dyn AnalyticsEngine>,
    provider: Arc<dyn ModelProvider>,
) -> ChatOrchestrator {
    ChatOrchestrator::new(
        conversations,
        analytics,
        provider,
        Arc::new(FixedTopic("sleep_science".into())),
        10,
        0.8,
        true,
    )
}
