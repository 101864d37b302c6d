//! In-memory login sessions keyed by opaque bearer tokens.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

/// A live login session.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    /// Authenticated user.
    pub user_id: Uuid,
    /// Instant after which the token is rejected.
    pub expires_at: Instant,
}

/// Registry of issued session tokens.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
}

impl SessionRegistry {
    /// Build an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for `user_id`, valid for `ttl`. Expired tokens are swept first.
    pub fn create(&self, user_id: Uuid, ttl: Duration) -> String {
        let now = Instant::now();
        self.sessions.retain(|_, session| session.expires_at > now);

        let token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                user_id,
                expires_at: now + ttl,
            },
        );
        token
    }

    /// Resolve a token to its user, evicting it when expired.
    pub fn resolve(&self, token: &str) -> Option<Uuid> {
        let session = *self.sessions.get(token)?;
        if session.expires_at <= Instant::now() {
            self.sessions.remove(token);
            return None;
        }
        Some(session.user_id)
    }

    /// Forget a token. Returns whether it was known.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Number of stored sessions, expired ones included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}
