//! AI text helpers: generate, polish, and filename suggestion.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::validation::MAX_TEXT_LENGTH;
use crate::AppState;
use llm_core::TextOperation;

#[derive(Deserialize)]
pub struct AiTextRequest {
    operation: String,
    input: String,
    version: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiTextResponse {
    success: bool,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    operation: &'static str,
    original_length: usize,
    truncated: bool,
}

/// POST /api/ai-text
pub async fn ai_text(
    State(state): State<AppState>,
    Json(req): Json<AiTextRequest>,
) -> Result<Json<AiTextResponse>, ApiError> {
    let operation: TextOperation = req
        .operation
        .parse()
        .map_err(|e: llm_core::UnknownOperation| ApiError::validation(e.to_string()))?;
    if req.input.trim().is_empty() {
        return Err(ApiError::validation("Operation and input are required"));
    }

    let generated = state
        .llm
        .complete(operation, req.input.trim(), req.version.as_deref())
        .await?;

    // Keep the result within the synthesis character limit so it can be
    // fed straight into the pipeline.
    let original_length = generated.chars().count();
    let truncated = original_length > MAX_TEXT_LENGTH;
    let text: String = if truncated {
        generated.chars().take(MAX_TEXT_LENGTH).collect()
    } else {
        generated
    };

    let filename = (operation == TextOperation::GenerateFilename).then(|| text.clone());

    Ok(Json(AiTextResponse {
        success: true,
        text,
        filename,
        operation: operation.as_str(),
        original_length,
        truncated,
    }))
}
