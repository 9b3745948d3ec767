//! HTTP routes. Handlers stay thin: boundary validation here, everything
//! else in the service layer.

use super::state::ServerState;
use crate::search::{SearchRequest, DEFAULT_REGION, DEFAULT_TAKE, MAX_TAKE};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": message })),
            )
                .into_response(),
            ApiError::Internal(e) => {
                error!("Request failed: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    pub release_take: Option<usize>,
    pub track_take: Option<usize>,
    pub region: Option<String>,
    #[serde(default)]
    pub personalized: bool,
    pub user_id: Option<String>,
}

fn validated_take(value: Option<usize>, name: &str) -> Result<usize, ApiError> {
    let take = value.unwrap_or(DEFAULT_TAKE);
    if take > MAX_TAKE {
        return Err(ApiError::InvalidRequest(format!(
            "{} must be <= {}",
            name, MAX_TAKE
        )));
    }
    Ok(take)
}

pub async fn search(
    State(state): State<ServerState>,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let request = SearchRequest {
        query: params.query,
        release_take: validated_take(params.release_take, "release_take")?,
        track_take: validated_take(params.track_take, "track_take")?,
        region: params
            .region
            .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        personalized: params.personalized,
        user_id: params.user_id,
    };

    let response = state.search_service.search(&request)?;
    Ok(Json(response).into_response())
}

#[derive(Debug, Deserialize)]
pub struct RebuildBody {
    pub regions: Option<Vec<String>>,
    pub triggered_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    pub scheduled: usize,
}

pub async fn trigger_rebuild(
    State(state): State<ServerState>,
    Json(body): Json<RebuildBody>,
) -> Result<Json<RebuildResponse>, ApiError> {
    let scheduled = state
        .watcher
        .trigger_full_rebuild(body.regions, body.triggered_by.as_deref())?;
    Ok(Json(RebuildResponse { scheduled }))
}

pub async fn pending_refreshes(State(state): State<ServerState>) -> impl IntoResponse {
    Json(json!({ "pending": state.scheduler.pending_count() }))
}

#[derive(Debug, Deserialize)]
pub struct AuditParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub event: Option<String>,
}

pub async fn audit_log(
    State(state): State<ServerState>,
    Query(params): Query<AuditParams>,
) -> Result<Response, ApiError> {
    let limit = params.limit.unwrap_or(50).min(500);
    let offset = params.offset.unwrap_or(0);
    let entries = match params.event {
        Some(event) => state
            .server_store
            .get_audit_log_by_event(&event, limit, offset)?,
        None => state.server_store.get_audit_log(limit, offset)?,
    };
    Ok(Json(entries).into_response())
}

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
