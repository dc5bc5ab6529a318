//! HTTP server initialization.
//!
//! [`serve`] wires the configured storage backend, the model provider, and
//! the paper index into the axum router and runs it with graceful ctrl-c
//! shutdown. Backend selection happens here so the orchestrator and the
//! REST handlers stay storage-agnostic.

use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::analytics::{AnalyticsEngine, FixedTopic, MemoryAnalytics, SqliteAnalytics};
use crate::api::{self, AppState};
use crate::chat::ChatOrchestrator;
use crate::config::SomnusConfig;
use crate::conversation::{ConversationStore, MemoryConversationStore, SqliteConversationStore};
use crate::db;
use crate::model::AnthropicProvider;
use crate::papers::PaperIndex;

/// Shared setup: stores for the configured backend, provider, orchestrator.
pub fn build_state(config: &SomnusConfig) -> Result<AppState> {
    let strict = config.chat.strict_conversation_ids;

    let (conversations, analytics): (Arc<dyn ConversationStore>, Arc<dyn AnalyticsEngine>) =
        match config.storage.backend.as_str() {
            "memory" => (
                Arc::new(MemoryConversationStore::new(strict)),
                Arc::new(MemoryAnalytics::new()),
            ),
            "sqlite" => {
                let conn = db::open_database(config.resolved_db_path())?;
                let db = Arc::new(Mutex::new(conn));
                (
                    Arc::new(SqliteConversationStore::new(Arc::clone(&db), strict)),
                    Arc::new(SqliteAnalytics::new(db)),
                )
            }
            other => anyhow::bail!("unknown storage backend: {other}"),
        };
    tracing::info!(backend = conversations.name(), "storage ready");

    let api_key = config.resolved_model_api_key();
    if api_key.is_none() {
        tracing::warn!("no model API key configured — chat generation will fail");
    }
    let provider = Arc::new(AnthropicProvider::new(&config.model, api_key));

    let orchestrator = Arc::new(ChatOrchestrator::new(
        Arc::clone(&conversations),
        Arc::clone(&analytics),
        provider,
        Arc::new(FixedTopic(config.analytics.default_topic.clone())),
        config.chat.history_window,
        config.chat.default_confidence,
        config.analytics.enabled,
    ));

    let papers = Arc::new(PaperIndex::new(&config.pubmed));

    Ok(AppState {
        orchestrator,
        conversations,
        analytics,
        papers,
    })
}

/// Start the HTTP server and run until ctrl-c.
pub async fn serve(config: SomnusConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    let state = build_state(&config)?;
    let router = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "somnus listening at http://{bind_addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl-c");
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
