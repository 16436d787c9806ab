//! Manual session sweep. In production the endpoint requires the shared
//! cleanup secret in the `x-cleanup-auth` header.

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    success: bool,
    message: String,
    cleaned_count: usize,
}

fn is_authorized(state: &AppState, headers: &HeaderMap) -> bool {
    if !state.config.production {
        return true;
    }
    let Some(secret) = state.config.cleanup_secret.as_deref() else {
        return false;
    };
    headers
        .get("x-cleanup-auth")
        .and_then(|v| v.to_str().ok())
        .map(|provided| provided.as_bytes().ct_eq(secret.as_bytes()).into())
        .unwrap_or(false)
}

/// GET/POST /api/sessions/cleanup
pub async fn cleanup_sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CleanupResponse>, ApiError> {
    if !is_authorized(&state, &headers) {
        return Err(ApiError::Authentication(
            "Cleanup authorization required".to_string(),
        ));
    }

    let cleaned = state.sessions.cleanup_old_sessions().await;
    tracing::info!(cleaned, "session cleanup finished");
    Ok(Json(CleanupResponse {
        success: true,
        message: format!("Cleaned up {cleaned} old session(s)"),
        cleaned_count: cleaned,
    }))
}
