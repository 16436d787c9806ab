// Configuration for the server, loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, warn};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub database_url: String,
    /// Root of the public audio tree; generated files live below it.
    pub audio_root: PathBuf,
    pub rate_limit_per_minute: u32,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub auth_username: Option<String>,
    pub auth_password: Option<String>,
    pub session_secret: Option<String>,
    pub cleanup_secret: Option<String>,
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8085,
            database_url: "sqlite://prompts.db?mode=rwc".to_string(),
            audio_root: PathBuf::from("public/audio"),
            rate_limit_per_minute: 60,
            request_timeout_secs: 60,
            cors_allowed_origins: None,
            auth_username: None,
            auth_password: None,
            session_secret: None,
            cleanup_secret: None,
            production: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| defaults.database_url.clone());

        let audio_root = std::env::var("AUDIO_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.audio_root.clone());

        let rate_limit_per_minute = std::env::var("RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.rate_limit_per_minute);

        let request_timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.request_timeout_secs);

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| origins.split(',').map(|s| s.trim().to_string()).collect());

        let non_empty = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
        };

        let production = std::env::var("APP_ENV")
            .map(|v| v == "production")
            .unwrap_or(false);

        Self {
            port,
            database_url,
            audio_root,
            rate_limit_per_minute,
            request_timeout_secs,
            cors_allowed_origins,
            auth_username: non_empty("AUTH_USERNAME"),
            auth_password: non_empty("AUTH_PASSWORD"),
            session_secret: non_empty("SESSION_SECRET"),
            cleanup_secret: non_empty("CLEANUP_SECRET_KEY"),
            production,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check the environment for production readiness. Returns the list of
    /// hard errors; warnings are logged but do not block startup.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if std::env::var("OPENAI_API_KEY")
            .map(|v| v.trim().is_empty())
            .unwrap_or(true)
        {
            errors.push("OPENAI_API_KEY is not set".to_string());
        } else if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.starts_with("sk-") {
                warn!("OPENAI_API_KEY does not match the expected format (should start with sk-)");
            }
        }

        if self.auth_username.is_none() {
            errors.push("AUTH_USERNAME is not set".to_string());
        }
        if self.auth_password.is_none() {
            errors.push("AUTH_PASSWORD is not set".to_string());
        }
        if self.session_secret.is_none() {
            errors.push("SESSION_SECRET is not set".to_string());
        }
        if self.database_url.trim().is_empty() {
            errors.push("DATABASE_URL is not set".to_string());
        }

        if self.production {
            if let Some(secret) = &self.session_secret {
                if secret.len() < 32 {
                    errors.push(
                        "SESSION_SECRET must be at least 32 characters long in production"
                            .to_string(),
                    );
                }
                if secret.contains("change-this") || secret.contains("your-secret") {
                    errors.push(
                        "SESSION_SECRET appears to be a default/example value. Generate a secure random secret."
                            .to_string(),
                    );
                }
            }
            if let Some(password) = &self.auth_password {
                if password == "admin123" || password == "password" {
                    errors.push(
                        "AUTH_PASSWORD is a weak default value. Use a strong password or an Argon2 hash."
                            .to_string(),
                    );
                } else if !password.starts_with("$argon2") {
                    warn!("AUTH_PASSWORD is not hashed. Consider storing an Argon2 PHC string instead.");
                }
            }
        }

        for e in &errors {
            error!("environment validation: {e}");
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_rejects_short_session_secret() {
        let config = ServerConfig {
            auth_username: Some("admin".to_string()),
            auth_password: Some("a-long-strong-password".to_string()),
            session_secret: Some("short".to_string()),
            production: true,
            ..ServerConfig::default()
        };
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("32 characters")));
    }

    #[test]
    fn production_rejects_default_password() {
        let config = ServerConfig {
            auth_username: Some("admin".to_string()),
            auth_password: Some("admin123".to_string()),
            session_secret: Some("0123456789abcdef0123456789abcdef".to_string()),
            production: true,
            ..ServerConfig::default()
        };
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("AUTH_PASSWORD")));
    }
}
