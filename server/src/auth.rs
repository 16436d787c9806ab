//! Login credential checks, per-IP lockout, and the signed auth-session
//! cookie. All state here is process-memory only and is lost on restart.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use argon2::password_hash::PasswordHash;
use argon2::{Argon2, PasswordVerifier};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::ServerConfig;

pub const AUTH_COOKIE: &str = "auth_session";
pub const AUTH_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const MAX_LOGIN_ATTEMPTS: u32 = 5;
const LOCKOUT_DURATION: Duration = Duration::from_secs(15 * 60);

struct AttemptRecord {
    count: u32,
    reset_at: Instant,
}

struct AuthSession {
    expires_at: Instant,
}

/// In-memory login throttling and session store.
#[derive(Default)]
pub struct AuthState {
    attempts: Mutex<HashMap<String, AttemptRecord>>,
    sessions: Mutex<HashMap<String, AuthSession>>,
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the client identifier is currently locked out.
    pub fn is_rate_limited(&self, identifier: &str) -> bool {
        let mut attempts = self.attempts.lock().unwrap();
        match attempts.get(identifier) {
            None => false,
            Some(record) if Instant::now() > record.reset_at => {
                attempts.remove(identifier);
                false
            }
            Some(record) => record.count >= MAX_LOGIN_ATTEMPTS,
        }
    }

    pub fn record_failed_attempt(&self, identifier: &str) {
        let mut attempts = self.attempts.lock().unwrap();
        let record = attempts.entry(identifier.to_string()).or_insert(AttemptRecord {
            count: 0,
            reset_at: Instant::now() + LOCKOUT_DURATION,
        });
        record.count += 1;
        if record.count >= MAX_LOGIN_ATTEMPTS {
            record.reset_at = Instant::now() + LOCKOUT_DURATION;
        }
    }

    pub fn clear_attempts(&self, identifier: &str) {
        self.attempts.lock().unwrap().remove(identifier);
    }

    /// Create an auth session and return the cookie value
    /// (`token.signature`).
    pub fn create_session(&self, secret: &str) -> String {
        let token = generate_token();
        self.sessions.lock().unwrap().insert(
            token.clone(),
            AuthSession {
                expires_at: Instant::now() + AUTH_SESSION_TTL,
            },
        );
        let signature = sign_token(&token, secret);
        format!("{token}.{signature}")
    }

    /// Verify a cookie value: signature first, then the server-side store.
    pub fn is_authenticated(&self, cookie_value: &str, secret: &str) -> bool {
        let Some((token, signature)) = cookie_value.split_once('.') else {
            return false;
        };
        let expected = sign_token(token, secret);
        if !bool::from(signature.as_bytes().ct_eq(expected.as_bytes())) {
            tracing::warn!("invalid auth-session signature");
            return false;
        }

        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get(token) {
            None => false,
            Some(session) if Instant::now() > session.expires_at => {
                sessions.remove(token);
                false
            }
            Some(_) => true,
        }
    }

    pub fn destroy_session(&self, cookie_value: &str) {
        if let Some((token, _)) = cookie_value.split_once('.') {
            self.sessions.lock().unwrap().remove(token);
        }
    }

    /// Drop expired sessions. Safe to run at any time.
    pub fn cleanup_expired_sessions(&self) {
        let now = Instant::now();
        self.sessions
            .lock()
            .unwrap()
            .retain(|_, session| now <= session.expires_at);
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn sign_token(token: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b".");
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a username/password pair against the configured credentials.
/// The username compare is constant-time; the password is either a plain
/// env value (compared in constant time) or an Argon2 PHC string.
pub fn validate_credentials(config: &ServerConfig, username: &str, password: &str) -> bool {
    let (Some(valid_username), Some(valid_password)) =
        (&config.auth_username, &config.auth_password)
    else {
        tracing::error!("AUTH_USERNAME or AUTH_PASSWORD not configured");
        return false;
    };

    if !constant_time_str_eq(username, valid_username) {
        return false;
    }

    if valid_password.starts_with("$argon2") {
        match PasswordHash::new(valid_password) {
            Ok(hash) => Argon2::default()
                .verify_password(password.as_bytes(), &hash)
                .is_ok(),
            Err(e) => {
                tracing::error!("AUTH_PASSWORD is not a valid Argon2 PHC string: {e}");
                false
            }
        }
    } else {
        constant_time_str_eq(password, valid_password)
    }
}

/// Constant-time comparison over inputs padded to a fixed width, so the
/// timing does not leak the configured value's length.
fn constant_time_str_eq(a: &str, b: &str) -> bool {
    const WIDTH: usize = 128;
    if a.len() > WIDTH || b.len() > WIDTH {
        return a == b;
    }
    let mut a_buf = [0u8; WIDTH];
    let mut b_buf = [0u8; WIDTH];
    a_buf[..a.len()].copy_from_slice(a.as_bytes());
    b_buf[..b.len()].copy_from_slice(b.as_bytes());
    bool::from(a_buf.ct_eq(&b_buf)) && a.len() == b.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            auth_username: Some("admin".to_string()),
            auth_password: Some("correct horse battery staple".to_string()),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn lockout_after_five_failures() {
        let state = AuthState::new();
        let ip = "203.0.113.9";
        for _ in 0..4 {
            state.record_failed_attempt(ip);
            assert!(!state.is_rate_limited(ip));
        }
        state.record_failed_attempt(ip);
        // 5th failure locks; 6th and later attempts are throttled
        // regardless of credential correctness.
        assert!(state.is_rate_limited(ip));
        state.record_failed_attempt(ip);
        assert!(state.is_rate_limited(ip));
        // Other clients are unaffected.
        assert!(!state.is_rate_limited("198.51.100.1"));
    }

    #[test]
    fn successful_login_clears_attempts() {
        let state = AuthState::new();
        for _ in 0..5 {
            state.record_failed_attempt("10.0.0.1");
        }
        assert!(state.is_rate_limited("10.0.0.1"));
        state.clear_attempts("10.0.0.1");
        assert!(!state.is_rate_limited("10.0.0.1"));
    }

    #[test]
    fn session_round_trip() {
        let state = AuthState::new();
        let secret = "0123456789abcdef0123456789abcdef";
        let cookie = state.create_session(secret);
        assert!(state.is_authenticated(&cookie, secret));
        // Wrong secret invalidates the signature.
        assert!(!state.is_authenticated(&cookie, "another-secret-another-secret-xx"));
        // Tampered token fails.
        assert!(!state.is_authenticated("deadbeef.cafebabe", secret));
        state.destroy_session(&cookie);
        assert!(!state.is_authenticated(&cookie, secret));
    }

    #[test]
    fn credentials_check_plain_password() {
        let config = test_config();
        assert!(validate_credentials(
            &config,
            "admin",
            "correct horse battery staple"
        ));
        assert!(!validate_credentials(&config, "admin", "wrong"));
        assert!(!validate_credentials(
            &config,
            "root",
            "correct horse battery staple"
        ));
    }

    #[test]
    fn credentials_check_argon2_hash() {
        use argon2::password_hash::{PasswordHasher, SaltString};
        let salt = SaltString::encode_b64(b"0123456789abcdef").unwrap();
        let hash = Argon2::default()
            .hash_password(b"s3cret-passphrase", &salt)
            .unwrap()
            .to_string();
        let config = ServerConfig {
            auth_username: Some("admin".to_string()),
            auth_password: Some(hash),
            ..ServerConfig::default()
        };
        assert!(validate_credentials(&config, "admin", "s3cret-passphrase"));
        assert!(!validate_credentials(&config, "admin", "guess"));
    }

    #[test]
    fn missing_configuration_fails_closed() {
        let config = ServerConfig::default();
        assert!(!validate_credentials(&config, "admin", "anything"));
    }
}
