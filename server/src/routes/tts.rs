//! The synthesis + conversion pipeline routes.
//!
//! Each request runs sequentially: validate, synthesize, write the temp
//! MP3, convert to the telephony WAV profile, drop the temp file, insert
//! the database record. A crash after conversion but before the insert
//! leaves an orphaned file; the session TTL sweep is the only reclaim
//! path, and only for session-scoped files.

use std::path::Path;

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::models::{Generation, GenerationMode, NewGeneration};
use crate::session::SessionManager;
use crate::validation::{
    validate_file_name, validate_instructions, validate_speed, validate_text, validate_voice,
};
use crate::AppState;
use tts_core::{convert_audio, FormatPreset, SpeechRequest};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicTtsRequest {
    text: String,
    voice: String,
    speed: Option<f64>,
    file_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedTtsRequest {
    text: String,
    voice: String,
    instructions: String,
    file_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsResponse {
    success: bool,
    generation: Generation,
    audio_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

/// POST /api/tts/basic
pub async fn tts_basic(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(req): Json<BasicTtsRequest>,
) -> Result<Json<TtsResponse>, ApiError> {
    let text = validate_text(&req.text)?;
    let voice = validate_voice(&req.voice)?;
    let speed = validate_speed(req.speed)?;
    let file_name = validate_file_name(req.file_name.as_deref())?;

    let session_id = state
        .sessions
        .get_or_create_id(&cookies, state.config.production);
    let paths = state.sessions.session_paths(&session_id).await?;

    let audio = state
        .speech
        .synthesize(&SpeechRequest {
            text: text.clone(),
            voice,
            speed,
        })
        .await?;

    let timestamp = Utc::now().timestamp_millis();
    let temp_path = paths.folder.join(format!("temp_{timestamp}.mp3"));
    tokio::fs::write(&temp_path, &audio).await?;

    let wav_name = final_wav_name(file_name, "prompt", timestamp);
    let output_path = paths.folder.join(&wav_name);
    let converted = convert_audio(&temp_path, &output_path, &FormatPreset::Telephony.format()).await;
    remove_temp_file(&temp_path).await;
    converted?;

    let audio_url = SessionManager::file_url(&session_id, &wav_name);
    let generation = state
        .generations
        .create(NewGeneration {
            text,
            mode: GenerationMode::Basic,
            voice: voice.to_string(),
            speed,
            instructions: None,
            format: "wav".to_string(),
            file_name: wav_name,
            file_url: audio_url.clone(),
        })
        .await?;

    info!(session = %session_id, id = %generation.id, "basic generation complete");
    Ok(Json(TtsResponse {
        success: true,
        generation,
        audio_url,
        note: None,
    }))
}

/// POST /api/tts/advanced
///
/// Natural-language voice instructions are mapped onto a speed heuristic.
/// Output goes to the legacy flat directory, matching the historical
/// behavior this route's clients rely on.
pub async fn tts_advanced(
    State(state): State<AppState>,
    Json(req): Json<AdvancedTtsRequest>,
) -> Result<Json<TtsResponse>, ApiError> {
    let text = validate_text(&req.text)?;
    let voice = validate_voice(&req.voice)?;
    let instructions = validate_instructions(&req.instructions)?;
    let file_name = validate_file_name(req.file_name.as_deref())?;

    let speed = speed_from_instructions(&instructions);

    let audio = state
        .speech
        .synthesize(&SpeechRequest {
            text: text.clone(),
            voice,
            speed,
        })
        .await?;

    let audio_root = state.config.audio_root.clone();
    tokio::fs::create_dir_all(&audio_root).await?;

    let timestamp = Utc::now().timestamp_millis();
    let temp_path = audio_root.join(format!("temp_advanced_{timestamp}.mp3"));
    tokio::fs::write(&temp_path, &audio).await?;

    let wav_name = final_wav_name(file_name, "prompt_advanced", timestamp);
    let output_path = audio_root.join(&wav_name);
    let converted = convert_audio(&temp_path, &output_path, &FormatPreset::Telephony.format()).await;
    remove_temp_file(&temp_path).await;
    converted?;

    let audio_url = format!("/audio/{wav_name}");
    let generation = state
        .generations
        .create(NewGeneration {
            text,
            mode: GenerationMode::Advanced,
            voice: voice.to_string(),
            speed,
            instructions: Some(instructions),
            format: "wav".to_string(),
            file_name: wav_name,
            file_url: audio_url.clone(),
        })
        .await?;

    info!(id = %generation.id, "advanced generation complete");
    Ok(Json(TtsResponse {
        success: true,
        generation,
        audio_url,
        note: Some(
            "Generated and converted to 3CX-compatible WAV format (8kHz, mono, 16-bit)".to_string(),
        ),
    }))
}

/// Compensating action only: a temp file that refuses to go away must
/// never fail the request.
async fn remove_temp_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("could not remove temp file {}: {e}", path.display());
    }
}

/// Pick the final WAV name: the caller's filename with its extension
/// normalized to `.wav`, or a timestamped default.
fn final_wav_name(file_name: Option<String>, prefix: &str, timestamp: i64) -> String {
    match file_name {
        Some(name) => {
            let base = name.strip_suffix(".mp3").unwrap_or(&name);
            if base.ends_with(".wav") {
                base.to_string()
            } else {
                format!("{base}.wav")
            }
        }
        None => format!("{prefix}_{timestamp}.wav"),
    }
}

/// Map voice instructions to a speed value. More specific phrases are
/// checked before their substrings.
fn speed_from_instructions(instructions: &str) -> f64 {
    let lower = instructions.to_lowercase();
    if lower.contains("very fast") {
        2.0
    } else if lower.contains("very slow") {
        0.6
    } else if lower.contains("fast") || lower.contains("quick") {
        1.5
    } else if lower.contains("slow") || lower.contains("clear") {
        0.8
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_map_to_speeds() {
        assert_eq!(speed_from_instructions("Speak very fast please"), 2.0);
        assert_eq!(speed_from_instructions("very slow and deliberate"), 0.6);
        assert_eq!(speed_from_instructions("a quick upbeat read"), 1.5);
        assert_eq!(speed_from_instructions("slow and clear"), 0.8);
        assert_eq!(speed_from_instructions("warm and friendly"), 1.0);
    }

    #[test]
    fn wav_name_normalizes_extension() {
        assert_eq!(
            final_wav_name(Some("greeting.mp3".into()), "prompt", 1),
            "greeting.wav"
        );
        assert_eq!(
            final_wav_name(Some("greeting.wav".into()), "prompt", 1),
            "greeting.wav"
        );
        assert_eq!(
            final_wav_name(Some("greeting".into()), "prompt", 1),
            "greeting.wav"
        );
        assert_eq!(final_wav_name(None, "prompt", 42), "prompt_42.wav");
    }
}
