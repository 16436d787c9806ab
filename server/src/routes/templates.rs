//! Template CRUD. The first empty read seeds the built-in defaults.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::{NewTemplate, Template};
use crate::AppState;

/// GET /api/templates
pub async fn list_templates(
    State(state): State<AppState>,
) -> Result<Json<Vec<Template>>, ApiError> {
    Ok(Json(state.templates.list().await?))
}

#[derive(Deserialize)]
pub struct CreateTemplateRequest {
    name: String,
    category: String,
    content: String,
    variables: Option<Vec<String>>,
}

/// POST /api/templates
pub async fn create_template(
    State(state): State<AppState>,
    Json(req): Json<CreateTemplateRequest>,
) -> Result<Json<Template>, ApiError> {
    if req.name.trim().is_empty() || req.category.trim().is_empty() || req.content.trim().is_empty()
    {
        return Err(ApiError::validation("Name, category, and content are required"));
    }

    let template = state
        .templates
        .create(NewTemplate {
            name: req.name.trim().to_string(),
            category: req.category.trim().to_string(),
            content: req.content.trim().to_string(),
            variables: req.variables.unwrap_or_default(),
            is_default: false,
        })
        .await?;
    Ok(Json(template))
}

#[derive(Deserialize)]
pub struct UpdateTemplateRequest {
    id: String,
    name: String,
    category: String,
    content: String,
    variables: Option<Vec<String>>,
}

/// PUT /api/templates
pub async fn update_template(
    State(state): State<AppState>,
    Json(req): Json<UpdateTemplateRequest>,
) -> Result<Json<Template>, ApiError> {
    if req.id.trim().is_empty() {
        return Err(ApiError::validation("Template ID is required"));
    }

    let updated = state
        .templates
        .update(
            &req.id,
            req.name.trim(),
            req.category.trim(),
            req.content.trim(),
            &req.variables.unwrap_or_default(),
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("Template".to_string()))?;
    Ok(Json(updated))
}

#[derive(Deserialize)]
pub struct DeleteTemplateRequest {
    id: String,
}

#[derive(Serialize)]
pub struct DeleteTemplateResponse {
    success: bool,
}

/// DELETE /api/templates
pub async fn delete_template(
    State(state): State<AppState>,
    Json(req): Json<DeleteTemplateRequest>,
) -> Result<Json<DeleteTemplateResponse>, ApiError> {
    if req.id.trim().is_empty() {
        return Err(ApiError::validation("Template ID is required"));
    }
    let deleted = state.templates.delete(&req.id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Template".to_string()));
    }
    Ok(Json(DeleteTemplateResponse { success: true }))
}
