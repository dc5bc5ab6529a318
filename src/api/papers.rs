//! Paper and recommendation endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use chrono::Utc;
use serde::Deserialize;

use super::{check_range, AppState};
use crate::error::{Error, Result};
use crate::papers::{PaperItem, Recommendation, SearchSource};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_source")]
    pub source: String,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationsQuery {
    pub category: Option<String>,
    pub source: Option<String>,
    #[serde(default = "default_rec_max_results")]
    pub max_results: u32,
}

fn default_max_results() -> u32 {
    10
}

fn default_rec_max_results() -> u32 {
    20
}

fn default_source() -> String {
    "all".to_string()
}

/// GET /api/v1/papers/search?query=&max_results=&source=
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<serde_json::Value>> {
    if query.query.trim().is_empty() {
        return Err(Error::validation("query must not be empty"));
    }
    check_range("max_results", query.max_results, 1, 50)?;
    let source: SearchSource = query.source.parse().map_err(Error::Validation)?;

    let outcome = state
        .papers
        .search(&query.query, query.max_results as usize, source)
        .await?;

    Ok(Json(serde_json::json!({
        "papers": outcome.papers,
        "recommendations": outcome.recommendations,
        "total_count": outcome.total_count,
        "query": outcome.query,
        "search_timestamp": Utc::now(),
    })))
}

/// GET /api/v1/papers/{paper_id} — a PMID-prefixed paper or a recommendation.
pub async fn paper(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<Json<PaperItem>> {
    let item = state.papers.lookup(&paper_id).await?;
    Ok(Json(item))
}

/// GET /api/v1/recommendations?category=&source=&max_results=
pub async fn recommendations(
    State(state): State<AppState>,
    Query(query): Query<RecommendationsQuery>,
) -> Result<Json<Vec<Recommendation>>> {
    check_range("max_results", query.max_results, 1, 100)?;

    let library = state.papers.recommendations();
    let mut results = match &query.category {
        Some(category) => library.by_category(category, query.source.as_deref()),
        None => library.all(query.source.as_deref()),
    };
    results.truncate(query.max_results as usize);

    Ok(Json(results))
}

/// GET /api/v1/recommendations/categories
pub async fn recommendation_categories(
    State(state): State<AppState>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "categories": state.papers.recommendations().categories(),
    }))
}
