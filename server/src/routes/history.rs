//! Listing and deleting generation records.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::Generation;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Deserialize)]
pub struct HistoryQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    generations: Vec<Generation>,
    total: i64,
    limit: i64,
    offset: i64,
}

/// GET /api/history
pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(0, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let generations = state.generations.list(limit, offset).await?;
    let total = state.generations.count().await?;

    Ok(Json(HistoryResponse {
        generations,
        total,
        limit,
        offset,
    }))
}

#[derive(Deserialize)]
pub struct DeleteRequest {
    id: String,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    success: bool,
}

/// DELETE /api/history
///
/// Removes the row first, then makes a best-effort attempt on the backing
/// file; a record whose file is already gone still deletes cleanly.
pub async fn delete_history(
    State(state): State<AppState>,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<DeleteResponse>, ApiError> {
    if req.id.trim().is_empty() {
        return Err(ApiError::validation("ID is required"));
    }

    let deleted = state
        .generations
        .delete(&req.id, &state.config.audio_root)
        .await?;
    if !deleted {
        return Err(ApiError::NotFound("Generation".to_string()));
    }

    Ok(Json(DeleteResponse { success: true }))
}
