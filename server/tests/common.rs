//! Common utilities for integration tests

use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;

use llm_core::LlmClient;
use tts_core::SpeechClient;

use server::auth::AuthState;
use server::config::ServerConfig;
use server::session::SessionManager;
use server::store::{self, GenerationStore, TemplateStore};
use server::{build_router, AppState};

/// A test app plus the temp dir backing its audio root. The dir is removed
/// when the TestApp is dropped, so keep it alive for the whole test.
pub struct TestApp {
    pub router: Router,
    _audio_root: TempDir,
}

impl TestApp {
    pub fn audio_root(&self) -> &std::path::Path {
        self._audio_root.path()
    }
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with_speech(SpeechClient::new("test-key")).await
}

/// Variant taking a preconfigured speech client, e.g. one pointed at a
/// local stub endpoint.
pub async fn create_test_app_with_speech(speech: SpeechClient) -> TestApp {
    let audio_root = TempDir::new().expect("temp audio root");

    let config = ServerConfig {
        audio_root: audio_root.path().to_path_buf(),
        auth_username: Some("testadmin".to_string()),
        auth_password: Some("correct-horse-battery".to_string()),
        session_secret: Some("0123456789abcdef0123456789abcdef".to_string()),
        cleanup_secret: Some("cleanup-secret".to_string()),
        production: false,
        ..ServerConfig::default()
    };

    let pool = store::connect("sqlite::memory:").await.expect("pool");
    store::init_schema(&pool).await.expect("schema");

    let state = AppState {
        sessions: SessionManager::new(&config.audio_root),
        config,
        speech: Arc::new(speech),
        llm: Arc::new(LlmClient::new("test-key")),
        auth: Arc::new(AuthState::new()),
        generations: GenerationStore::new(pool.clone()),
        templates: TemplateStore::new(pool),
    };

    TestApp {
        router: build_router(state),
        _audio_root: audio_root,
    }
}
