use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

use llm_core::LlmClient;
use tts_core::SpeechClient;

use server::auth::AuthState;
use server::config::ServerConfig;
use server::session::SessionManager;
use server::store::{self, GenerationStore, TemplateStore};
use server::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenvy::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting phone prompt server...");

    let config = ServerConfig::from_env();
    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            warn!("config: {problem}");
        }
        if config.production {
            anyhow::bail!("refusing to start in production with invalid configuration");
        }
    }

    let speech = Arc::new(SpeechClient::from_env()?);
    let llm = Arc::new(LlmClient::from_env()?);

    let pool = store::connect(&config.database_url).await?;
    store::init_schema(&pool).await?;
    info!("Database ready at {}", config.database_url);

    let sessions = SessionManager::new(&config.audio_root);
    tokio::fs::create_dir_all(&config.audio_root).await?;

    let state = AppState {
        config: config.clone(),
        speech,
        llm,
        sessions,
        auth: Arc::new(AuthState::new()),
        generations: GenerationStore::new(pool.clone()),
        templates: TemplateStore::new(pool),
    };
    info!(
        "Server configuration loaded: port={}, rate_limit={}/min, audio_root={}",
        config.port,
        config.rate_limit_per_minute,
        config.audio_root.display()
    );

    // CORS configuration - environment-aware
    let cors = if let Some(ref allowed_origins) = config.cors_allowed_origins {
        let origins: Vec<axum::http::HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin: &String| origin.parse::<axum::http::HeaderValue>().ok())
            .collect();

        if origins.is_empty() {
            warn!("CORS_ALLOWED_ORIGINS is empty, falling back to permissive CORS");
            permissive_cors()
        } else {
            info!("CORS configured for {} origin(s)", origins.len());
            CorsLayer::new()
                .allow_origin(tower_http::cors::AllowOrigin::list(origins))
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(tower_http::cors::Any)
                .allow_credentials(false)
        }
    } else {
        warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
        permissive_cors()
    };

    // Using GlobalKeyExtractor to rate limit globally (all requests share the
    // same limit). This works better behind Docker/proxies where per-IP
    // extraction can be unreliable.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second((config.rate_limit_per_minute / 60).max(1) as u64)
            .burst_size(config.rate_limit_per_minute)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?,
    );
    info!("Rate limiting: {} requests per minute", config.rate_limit_per_minute);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors)
        .into_inner();

    let app = build_router(state)
        .layer(axum::middleware::from_fn(server::add_request_id))
        .layer(middleware_stack);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT."))?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any)
        .allow_credentials(false)
}
