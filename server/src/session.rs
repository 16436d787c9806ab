//! Per-client session folders for generated audio.
//!
//! Each browser client gets an opaque session id in a cookie and a
//! dedicated directory under the audio root. Directories are reclaimed by
//! a coarse mtime-based sweep once they are older than the TTL; files are
//! cheap and regenerable, so precision is not worth per-file bookkeeping.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use rand::RngCore;
use tower_cookies::cookie::time::Duration as CookieDuration;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};
use tracing::{info, warn};

use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "audio_session_id";
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Resolved locations for one session.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub id: String,
    pub folder: PathBuf,
    pub public_prefix: String,
}

#[derive(Debug, Clone)]
pub struct SessionManager {
    sessions_dir: PathBuf,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(audio_root: impl AsRef<Path>) -> Self {
        Self {
            sessions_dir: audio_root.as_ref().join("sessions"),
            ttl: SESSION_TTL,
        }
    }

    #[cfg(test)]
    fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Mint a new unpredictable session id.
    fn mint_id() -> String {
        let mut suffix = [0u8; 4];
        rand::thread_rng().fill_bytes(&mut suffix);
        format!("session_{}_{}", Utc::now().timestamp_millis(), hex::encode(suffix))
    }

    /// Read the client's session id from the cookie jar, minting a new one
    /// (and setting the cookie) when absent or malformed.
    pub fn get_or_create_id(&self, cookies: &Cookies, production: bool) -> String {
        if let Some(cookie) = cookies.get(SESSION_COOKIE) {
            let value = cookie.value();
            if is_valid_session_id(value) {
                return value.to_string();
            }
        }

        let id = Self::mint_id();
        let mut cookie = Cookie::new(SESSION_COOKIE, id.clone());
        cookie.set_http_only(true);
        if production {
            cookie.set_secure(true);
        }
        cookie.set_same_site(SameSite::Lax);
        cookie.set_max_age(CookieDuration::seconds(self.ttl.as_secs() as i64));
        cookie.set_path("/");
        cookies.add(cookie);
        id
    }

    /// Map a session id to its directory, creating it if needed.
    /// Idempotent, so concurrent requests for the same session are safe.
    pub async fn session_paths(&self, id: &str) -> Result<SessionPaths, ApiError> {
        if !is_valid_session_id(id) {
            return Err(ApiError::validation("Invalid session id"));
        }
        let folder = self.sessions_dir.join(id);
        tokio::fs::create_dir_all(&folder).await?;
        Ok(SessionPaths {
            id: id.to_string(),
            folder,
            public_prefix: format!("/audio/sessions/{id}"),
        })
    }

    pub fn file_path(&self, id: &str, file_name: &str) -> PathBuf {
        self.sessions_dir.join(id).join(file_name)
    }

    pub fn file_url(id: &str, file_name: &str) -> String {
        format!("/audio/sessions/{id}/{file_name}")
    }

    /// Sweep session directories whose last modification is older than the
    /// TTL. Best-effort: a directory that cannot be inspected or removed is
    /// logged and skipped, never aborting the sweep. Returns the count
    /// removed.
    pub async fn cleanup_old_sessions(&self) -> usize {
        if let Err(e) = tokio::fs::create_dir_all(&self.sessions_dir).await {
            warn!("could not ensure sessions directory exists: {e}");
            return 0;
        }

        let mut entries = match tokio::fs::read_dir(&self.sessions_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("could not enumerate session directories: {e}");
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut cleaned = 0usize;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let age = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(mtime) => now.duration_since(mtime).unwrap_or(Duration::ZERO),
                Err(e) => {
                    warn!("could not stat session folder {}: {e}", path.display());
                    continue;
                }
            };

            if age > self.ttl {
                match tokio::fs::remove_dir_all(&path).await {
                    Ok(()) => {
                        cleaned += 1;
                        info!("cleaned up old session: {}", path.display());
                    }
                    Err(e) => warn!("could not remove session folder {}: {e}", path.display()),
                }
            }
        }

        cleaned
    }

    /// Remove one session's directory, best-effort.
    pub async fn remove_session(&self, id: &str) {
        if !is_valid_session_id(id) {
            return;
        }
        let path = self.sessions_dir.join(id);
        if let Err(e) = tokio::fs::remove_dir_all(&path).await {
            warn!("could not remove session {id}: {e}");
        }
    }
}

/// Session ids are used as directory names; restrict the charset so a
/// forged cookie can never escape the sessions root.
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 100
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_are_valid_and_distinct() {
        let a = SessionManager::mint_id();
        let b = SessionManager::mint_id();
        assert!(is_valid_session_id(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn traversal_ids_are_rejected() {
        assert!(!is_valid_session_id("../../etc"));
        assert!(!is_valid_session_id("a/b"));
        assert!(!is_valid_session_id(""));
        assert!(is_valid_session_id("session_1700000000000_deadbeef"));
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_directories() {
        let root = tempfile::tempdir().unwrap();

        // TTL of zero: everything already created counts as expired once
        // any time has passed.
        let expired = SessionManager::new(root.path()).with_ttl(Duration::ZERO);
        expired.session_paths("session_old_a").await.unwrap();
        expired.session_paths("session_old_b").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(expired.cleanup_old_sessions().await, 2);
        // Idempotent: a second run over the same state cleans nothing.
        assert_eq!(expired.cleanup_old_sessions().await, 0);

        // Normal TTL: fresh directories are left untouched.
        let fresh = SessionManager::new(root.path());
        fresh.session_paths("session_new").await.unwrap();
        assert_eq!(fresh.cleanup_old_sessions().await, 0);
        assert!(fresh.file_path("session_new", "").exists());
    }

    #[tokio::test]
    async fn session_paths_creates_directory_idempotently() {
        let root = tempfile::tempdir().unwrap();
        let manager = SessionManager::new(root.path());
        let first = manager.session_paths("session_x").await.unwrap();
        let second = manager.session_paths("session_x").await.unwrap();
        assert_eq!(first.folder, second.folder);
        assert!(first.folder.is_dir());
        assert_eq!(first.public_prefix, "/audio/sessions/session_x");
        assert!(manager.session_paths("../oops").await.is_err());
    }

    #[test]
    fn file_url_is_session_scoped() {
        assert_eq!(
            SessionManager::file_url("session_1_ab", "menu.wav"),
            "/audio/sessions/session_1_ab/menu.wav"
        );
    }
}
