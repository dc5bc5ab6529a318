//! REST surface wrapping the core.
//!
//! Thin axum handlers: validate query bounds, call into the orchestrator,
//! stores, or paper index, and map the crate error taxonomy onto HTTP
//! statuses. No business logic lives here.

pub mod analytics;
pub mod chat;
pub mod papers;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::analytics::AnalyticsEngine;
use crate::chat::ChatOrchestrator;
use crate::conversation::ConversationStore;
use crate::error::Error;
use crate::papers::PaperIndex;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ChatOrchestrator>,
    pub conversations: Arc<dyn ConversationStore>,
    pub analytics: Arc<dyn AnalyticsEngine>,
    pub papers: Arc<PaperIndex>,
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/chat", post(chat::chat))
        .route(
            "/chat/conversation/{conversation_id}",
            get(chat::conversation_history).delete(chat::delete_conversation),
        )
        .route("/chat/topics", get(chat::available_topics))
        .route("/analytics/overview", get(analytics::overview))
        .route("/analytics/topics", get(analytics::topics))
        .route("/analytics/users/{user_id}", get(analytics::user))
        .route(
            "/analytics/conversations/{conversation_id}",
            get(analytics::conversation),
        )
        .route("/analytics/cleanup", post(analytics::cleanup))
        .route("/papers/search", get(papers::search))
        .route("/papers/{paper_id}", get(papers::paper))
        .route("/recommendations", get(papers::recommendations))
        .route(
            "/recommendations/categories",
            get(papers::recommendation_categories),
        );

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .with_state(state)
}

/// Minimal liveness probe.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "conversation_store": state.conversations.name(),
        "analytics_engine": state.analytics.name(),
    }))
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let Error::Internal(source) = &self {
            tracing::error!(error = ?source, "internal error while handling request");
        }

        // Display never leaks internal detail; see the error taxonomy docs.
        let body = Json(serde_json::json!({"error": self.to_string()}));
        (status, body).into_response()
    }
}

/// Reject a query value outside its documented bounds.
pub(crate) fn check_range(
    name: &str,
    value: u32,
    min: u32,
    max: u32,
) -> crate::error::Result<()> {
    if value < min || value > max {
        return Err(Error::validation(format!(
            "{name} must be between {min} and {max}"
        )));
    }
    Ok(())
}
