//! Admin session validity
//!
//! The admin view is gated on a session record: a logged-in flag, a login
//! time in epoch milliseconds and a username, each under its own key in a
//! session-scoped backend. A session is valid for four hours after login.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::storage::KeyValueBackend;

pub const LOGGED_IN_KEY: &str = "adminLoggedIn";
pub const LOGIN_TIME_KEY: &str = "adminLoginTime";
pub const USERNAME_KEY: &str = "adminUsername";

/// How long a login stays valid
pub const SESSION_TTL_MS: i64 = 4 * 60 * 60 * 1000;

/// Snapshot of the stored admin session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminSession {
    pub logged_in: bool,
    pub login_time_ms: Option<i64>,
    pub username: Option<String>,
}

impl AdminSession {
    /// Valid when logged in and no more than `ttl_ms` has passed since login
    pub fn is_valid_at(&self, now_ms: i64, ttl_ms: i64) -> bool {
        match (self.logged_in, self.login_time_ms) {
            (true, Some(login)) => now_ms.saturating_sub(login) <= ttl_ms,
            _ => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now().timestamp_millis(), SESSION_TTL_MS)
    }
}

/// Reads and writes the session keys
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueBackend>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            backend,
            ttl: Duration::milliseconds(SESSION_TTL_MS),
        }
    }

    pub fn with_ttl(backend: Arc<dyn KeyValueBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current session; unreadable values count as logged out
    pub fn load(&self) -> Result<AdminSession> {
        let logged_in = self
            .backend
            .get(LOGGED_IN_KEY)?
            .map_or(false, |v| v.trim() == "true");
        let login_time_ms = self
            .backend
            .get(LOGIN_TIME_KEY)?
            .and_then(|v| v.trim().parse::<i64>().ok());
        let username = self.backend.get(USERNAME_KEY)?;

        Ok(AdminSession {
            logged_in,
            login_time_ms,
            username,
        })
    }

    /// Whether the stored session is valid at `now_ms`
    pub fn is_valid_at(&self, now_ms: i64) -> Result<bool> {
        Ok(self.load()?.is_valid_at(now_ms, self.ttl.num_milliseconds()))
    }

    /// Record a login at `now_ms`
    pub fn begin(&self, username: &str, now_ms: i64) -> Result<()> {
        self.backend.set(LOGGED_IN_KEY, "true")?;
        self.backend.set(LOGIN_TIME_KEY, &now_ms.to_string())?;
        self.backend.set(USERNAME_KEY, username)?;
        info!("Admin session started for {}", username);
        Ok(())
    }

    /// Clear every session key
    pub fn end(&self) -> Result<()> {
        for key in [LOGGED_IN_KEY, LOGIN_TIME_KEY, USERNAME_KEY] {
            self.backend.remove(key)?;
        }
        info!("Admin session ended");
        Ok(())
    }
}
