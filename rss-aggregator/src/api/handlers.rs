use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Serialize;
use tracing::info;

use super::{error::ApiError, AppState};
use crate::query::{ArticlePage, ArticleQueryParams, SourceSummary, Stats};
use crate::types::IngestReport;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub sources: Vec<SourceSummary>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub message: &'static str,
    pub report: IngestReport,
}

pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Tech News Aggregator API",
    })
}

pub async fn list_articles(
    State(state): State<AppState>,
    params: Result<Query<ArticleQueryParams>, QueryRejection>,
) -> Result<Json<ArticlePage>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::Validation(e.body_text()))?;
    let query = params.validate()?;

    let page = state.queries.list_articles(&query).await?;
    Ok(Json(page))
}

pub async fn list_sources(State(state): State<AppState>) -> Result<Json<SourcesResponse>, ApiError> {
    let sources = state
        .queries
        .sources()
        .await
        .map_err(|e| ApiError::internal("Error fetching sources", e))?;
    Ok(Json(SourcesResponse { sources }))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<Stats>, ApiError> {
    let stats = state
        .queries
        .stats()
        .await
        .map_err(|e| ApiError::internal("Error fetching stats", e))?;
    Ok(Json(stats))
}

/// Runs one ingestion cycle before answering.
pub async fn refresh(State(state): State<AppState>) -> Result<Json<RefreshResponse>, ApiError> {
    info!("Manual refresh requested");
    let report = state
        .aggregator
        .run_cycle()
        .await
        .map_err(|e| ApiError::internal("Error refreshing feeds", e))?;

    Ok(Json(RefreshResponse {
        message: "Feed refresh completed successfully",
        report,
    }))
}
