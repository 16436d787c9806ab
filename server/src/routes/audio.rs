//! Saving client-held audio versions and serving generated files.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::{Generation, GenerationMode, NewGeneration};
use crate::validation::{validate_file_name, validate_speed, validate_text, validate_voice};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    text: String,
    voice: String,
    speed: Option<f64>,
    instructions: Option<String>,
    file_name: String,
    audio_url: String,
    mode: Option<GenerationMode>,
}

#[derive(Serialize)]
pub struct SaveResponse {
    success: bool,
    generation: Generation,
}

/// POST /api/audio/save
///
/// Persist a client-held in-memory version. The file already exists on
/// disk (it came out of an earlier pipeline run), so this is a pure
/// record-store write.
pub async fn save_audio(
    State(state): State<AppState>,
    Json(req): Json<SaveRequest>,
) -> Result<Json<SaveResponse>, ApiError> {
    let text = validate_text(&req.text)?;
    let voice = validate_voice(&req.voice)?;
    let speed = validate_speed(req.speed)?;
    let file_name = validate_file_name(Some(&req.file_name))?
        .ok_or_else(|| ApiError::validation("Missing required fields"))?;
    if req.audio_url.trim().is_empty() {
        return Err(ApiError::validation("Missing required fields"));
    }

    let generation = state
        .generations
        .create(NewGeneration {
            text,
            mode: req.mode.unwrap_or(GenerationMode::Basic),
            voice: voice.to_string(),
            speed,
            instructions: req.instructions.filter(|s| !s.trim().is_empty()),
            format: "wav".to_string(),
            file_name,
            file_url: req.audio_url.trim().to_string(),
        })
        .await?;

    Ok(Json(SaveResponse {
        success: true,
        generation,
    }))
}

/// GET /audio/{*path}
///
/// Serve generated audio with long-lived cache headers. Generated files
/// are immutable once written, so aggressive caching is safe.
pub async fn serve_audio(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    if path
        .split('/')
        .any(|part| part.is_empty() || part == "." || part == ".." || part.contains('\\'))
    {
        return Err(ApiError::NotFound("File".to_string()));
    }

    let full_path = state.config.audio_root.join(&path);
    let bytes = match tokio::fs::read(&full_path).await {
        Ok(bytes) => bytes,
        Err(_) => return Err(ApiError::NotFound("File".to_string())),
    };

    let content_type = match full_path.extension().and_then(|e| e.to_str()) {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=31536000"),
        ],
        bytes,
    )
        .into_response())
}
