//! Analytics endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;

use super::{check_range, AppState};
use crate::analytics::{ConversationReport, OverviewReport, TopicCount, UserReport};
use crate::error::Result;

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    #[serde(default = "default_days")]
    pub days: u32,
}

#[derive(Debug, Deserialize)]
pub struct TopicsQuery {
    #[serde(default = "default_days")]
    pub days: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct CleanupQuery {
    #[serde(default = "default_retention_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    30
}

fn default_limit() -> u32 {
    10
}

fn default_retention_days() -> u32 {
    90
}

/// GET /api/v1/analytics/overview?days=
pub async fn overview(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<OverviewReport>> {
    check_range("days", query.days, 1, 365)?;
    let report = state.analytics.overview(query.days).await?;
    Ok(Json(report))
}

/// GET /api/v1/analytics/topics?days=&limit=
pub async fn topics(
    State(state): State<AppState>,
    Query(query): Query<TopicsQuery>,
) -> Result<Json<Vec<TopicCount>>> {
    check_range("days", query.days, 1, 365)?;
    check_range("limit", query.limit, 1, 50)?;
    let ranked = state
        .analytics
        .popular_topics(query.days, query.limit as usize)
        .await?;
    Ok(Json(ranked))
}

/// GET /api/v1/analytics/users/{user_id}
pub async fn user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserReport>> {
    let report = state.analytics.user_report(&user_id).await?;
    Ok(Json(report))
}

/// GET /api/v1/analytics/conversations/{conversation_id}
pub async fn conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ConversationReport>> {
    let report = state.analytics.conversation_report(&conversation_id).await?;
    Ok(Json(report))
}

/// POST /api/v1/analytics/cleanup?days= — retention eviction.
pub async fn cleanup(
    State(state): State<AppState>,
    Query(query): Query<CleanupQuery>,
) -> Result<Json<serde_json::Value>> {
    check_range("days", query.days, 1, 365)?;
    let outcome = state.analytics.cleanup(query.days).await?;
    Ok(Json(serde_json::json!({
        "message": format!(
            "Successfully cleaned up analytics data older than {} days",
            query.days
        ),
        "removed_interactions": outcome.removed_interactions,
        "removed_sessions": outcome.removed_sessions,
    })))
}
