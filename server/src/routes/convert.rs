//! Standalone re-conversion of an already generated file.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::store::resolve_audio_relative_path;
use crate::AppState;
use tts_core::{convert_audio, AudioFormat, FormatPreset};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    audio_url: String,
    format_preset: Option<String>,
    custom_format: Option<AudioFormat>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    success: bool,
    converted_url: String,
    format: AudioFormat,
}

/// POST /api/convert
pub async fn convert(
    State(state): State<AppState>,
    Json(req): Json<ConvertRequest>,
) -> Result<Json<ConvertResponse>, ApiError> {
    if req.audio_url.trim().is_empty() {
        return Err(ApiError::validation("Audio URL is required"));
    }

    let format = match req.format_preset.as_deref() {
        Some(name) => name
            .parse::<FormatPreset>()
            .map_err(|e| ApiError::validation(e.to_string()))?
            .format(),
        None => req
            .custom_format
            .unwrap_or_else(|| FormatPreset::Telephony.format()),
    };

    let relative = resolve_audio_relative_path(&req.audio_url)
        .ok_or_else(|| ApiError::validation("Audio URL must point below /audio/"))?;
    let input_path = state.config.audio_root.join(relative);
    if !tokio::fs::try_exists(&input_path).await.unwrap_or(false) {
        return Err(ApiError::NotFound("Audio file".to_string()));
    }

    let timestamp = Utc::now().timestamp_millis();
    let output_name = format!("converted_{timestamp}.{}", format.format);
    let output_path = state.config.audio_root.join(&output_name);

    convert_audio(&input_path, &output_path, &format).await?;

    Ok(Json(ConvertResponse {
        success: true,
        converted_url: format!("/audio/{output_name}"),
        format,
    }))
}
