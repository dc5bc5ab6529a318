//! Chat endpoints.

use axum::extract::{Path, State};
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;
use crate::chat::ChatRequest;
use crate::conversation::Conversation;
use crate::error::Result;
use crate::model::Citation;

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Citation>,
    pub confidence: f64,
}

/// POST /api/v1/chat — run one exchange with the bot.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let reply = state.orchestrator.handle_message(request).await?;
    Ok(Json(ChatResponse {
        response: reply.response,
        conversation_id: reply.conversation_id,
        timestamp: Utc::now(),
        sources: reply.sources,
        confidence: reply.confidence,
    }))
}

/// GET /api/v1/chat/conversation/{conversation_id} — full message history.
pub async fn conversation_history(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Conversation>> {
    let conversation = state.conversations.history(&conversation_id).await?;
    Ok(Json(conversation))
}

/// DELETE /api/v1/chat/conversation/{conversation_id}
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.conversations.delete(&conversation_id).await?;
    tracing::info!(conversation_id = %conversation_id, "conversation deleted");
    Ok(Json(serde_json::json!({
        "message": "Conversation deleted successfully"
    })))
}

/// GET /api/v1/chat/topics — topics the bot is prepared to discuss.
pub async fn available_topics() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "topics": [
            "sleep_cycles",
            "sleep_disorders",
            "sleep_hygiene",
            "sleep_research",
            "sleep_medicine",
            "sleep_apnea",
            "insomnia",
            "circadian_rhythms",
            "sleep_quality",
            "sleep_duration",
            "sleep_environment",
            "sleep_and_health"
        ]
    }))
}
