//! Login endpoint with per-client lockout after repeated failures.

use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use tower_cookies::cookie::{time, SameSite};
use tower_cookies::{Cookie, Cookies};

use crate::auth::{validate_credentials, AUTH_COOKIE, AUTH_SESSION_TTL};
use crate::error::ApiError;
use crate::routes::client_identifier;
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    success: bool,
    message: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    cookies: Cookies,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Username and password are required"));
    }

    let client = client_identifier(&headers);
    if state.auth.is_rate_limited(&client) {
        tracing::warn!(%client, "login blocked by lockout");
        return Err(ApiError::RateLimited(
            "Too many login attempts. Please try again later.".to_string(),
        ));
    }

    if !validate_credentials(&state.config, req.username.trim(), &req.password) {
        state.auth.record_failed_attempt(&client);
        tracing::warn!(%client, "failed login attempt");
        return Err(ApiError::Authentication(
            "Invalid username or password".to_string(),
        ));
    }

    state.auth.clear_attempts(&client);
    let secret = state
        .config
        .session_secret
        .as_deref()
        .ok_or_else(|| ApiError::Internal("SESSION_SECRET is not configured".to_string()))?;
    let session = state.auth.create_session(secret);

    let mut cookie = Cookie::new(AUTH_COOKIE, session);
    cookie.set_http_only(true);
    cookie.set_secure(state.config.production);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(time::Duration::seconds(AUTH_SESSION_TTL.as_secs() as i64));
    cookie.set_path("/");
    cookies.add(cookie);

    tracing::info!(%client, "login succeeded");
    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".to_string(),
    }))
}
