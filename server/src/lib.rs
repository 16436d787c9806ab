pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod session;
pub mod store;
pub mod validation;

use std::sync::Arc;

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use tower_cookies::CookieManagerLayer;

use llm_core::LlmClient;
use tts_core::SpeechClient;

use crate::auth::AuthState;
use crate::config::ServerConfig;
use crate::session::SessionManager;
use crate::store::{GenerationStore, TemplateStore};

#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub speech: Arc<SpeechClient>,
    pub llm: Arc<LlmClient>,
    pub sessions: SessionManager,
    pub auth: Arc<AuthState>,
    pub generations: GenerationStore,
    pub templates: TemplateStore,
}

pub async fn health_check() -> &'static str {
    "ok"
}

/// Request ID middleware for tracing
pub async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    if let Ok(value) = axum::http::HeaderValue::from_str(&request_id) {
        request.headers_mut().insert("x-request-id", value.clone());
        let mut response = next.run(request).await;
        response.headers_mut().insert("x-request-id", value);
        return response;
    }
    next.run(request).await
}

/// Builds the application router. Middleware that depends on runtime
/// configuration (CORS, rate limiting, timeouts) is layered in main.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/tts/basic", post(routes::tts::tts_basic))
        .route("/tts/advanced", post(routes::tts::tts_advanced))
        .route("/ai-text", post(routes::text::ai_text))
        .route("/convert", post(routes::convert::convert))
        .route(
            "/history",
            get(routes::history::list_history).delete(routes::history::delete_history),
        )
        .route("/audio/save", post(routes::audio::save_audio))
        .route("/audio/{*path}", get(routes::audio::serve_audio))
        .route(
            "/templates",
            get(routes::templates::list_templates)
                .post(routes::templates::create_template)
                .put(routes::templates::update_template)
                .delete(routes::templates::delete_template),
        )
        .route(
            "/sessions/cleanup",
            get(routes::sessions::cleanup_sessions).post(routes::sessions::cleanup_sessions),
        )
        .route("/auth/login", post(routes::auth::login));

    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .nest("/api", api)
        .route("/audio/{*path}", get(routes::audio::serve_audio))
        .layer(CookieManagerLayer::new())
        .with_state(state)
}
