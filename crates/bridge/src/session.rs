//! Shared-secret login and the table of issued session tokens.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration as StdDuration,
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use subtle::ConstantTimeEq;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    clock::{Clock, SystemClock},
    error::AuthError,
};

/// Raw entropy per token, before encoding.
const TOKEN_BYTES: usize = 32;

pub const SESSION_TTL_HOURS: i64 = 24;
pub const SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionStore {
    secret: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    sessions: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl SessionStore {
    pub fn new(secret: impl Into<String>) -> Self {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::hours(SESSION_TTL_HOURS),
            clock,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Exchanges the shared secret for a fresh token. A wrong password
    /// leaves the table untouched.
    pub fn login(&self, candidate: &str) -> Result<Session, AuthError> {
        let matches: bool = candidate
            .as_bytes()
            .ct_eq(self.secret.as_bytes())
            .into();
        if !matches {
            return Err(AuthError::InvalidPassword);
        }

        let token = generate_token()?;
        let expires_at = self.clock.now() + self.ttl;
        self.sessions.write().insert(token.clone(), expires_at);
        debug!(%expires_at, "session issued");
        Ok(Session { token, expires_at })
    }

    /// True while the token is known and unexpired. Validation never
    /// extends the expiry.
    pub fn validate_token(&self, token: &str) -> bool {
        let now = self.clock.now();
        self.sessions
            .read()
            .get(token)
            .is_some_and(|expires_at| now < *expires_at)
    }

    pub fn logout(&self, token: &str) {
        self.sessions.write().remove(token);
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, expires_at| now < *expires_at);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs [`Self::sweep_expired`] every `period` until the store is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: StdDuration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let removed = store.sweep_expired();
                if removed > 0 {
                    info!(removed, remaining = store.len(), "expired sessions swept");
                }
            }
        })
    }
}

fn generate_token() -> Result<String, AuthError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::fill(&mut bytes).map_err(|e| AuthError::Entropy(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
