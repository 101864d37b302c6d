//! Accounts and login sessions.

use std::time::SystemTime;

use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::UserEntity,
    dto::auth::{LoginRequest, LoginResponse, RegisterRequest, UserSummary},
    error::ServiceError,
    state::SharedState,
};

const INVALID_CREDENTIALS: &str = "invalid username or password";

/// Caller identity resolved from a session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Account identifier.
    pub id: Uuid,
    /// Login name.
    pub username: String,
    /// Whether the account administers the platform.
    pub is_admin: bool,
    /// Token the request was authenticated with.
    pub token: String,
}

impl AuthUser {
    /// Fail with [`ServiceError::Forbidden`] unless the caller is an administrator.
    pub fn ensure_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "administrator privileges required".into(),
            ))
        }
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Create an account. The first account ever created is an administrator.
pub async fn register(
    state: &SharedState,
    payload: RegisterRequest,
) -> Result<UserSummary, ServiceError> {
    let store = state.require_store().await?;
    let RegisterRequest {
        username,
        email,
        password,
    } = payload;

    let _gate = state.account_gate().lock().await;
    if store.find_user_by_username(username.clone()).await?.is_some() {
        return Err(ServiceError::Conflict(format!(
            "username `{username}` is already taken"
        )));
    }
    let is_admin = store.count_users().await? == 0;

    let salt = hex::encode(rand::random::<[u8; 16]>());
    let user = UserEntity {
        id: Uuid::new_v4(),
        password_hash: hash_password(&salt, &password),
        password_salt: salt,
        username,
        email,
        is_admin,
        practice_tokens: 0,
        created_at: SystemTime::now(),
    };
    store.save_user(user.clone()).await?;

    info!(user_id = %user.id, username = %user.username, is_admin, "user registered");
    Ok(user.into())
}

/// Exchange credentials for a session token.
pub async fn login(
    state: &SharedState,
    payload: LoginRequest,
) -> Result<LoginResponse, ServiceError> {
    let store = state.require_store().await?;
    let user = store
        .find_user_by_username(payload.username)
        .await?
        .filter(|user| hash_password(&user.password_salt, &payload.password) == user.password_hash)
        .ok_or_else(|| ServiceError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    let token = state
        .sessions()
        .create(user.id, state.config().session_ttl());
    info!(user_id = %user.id, "user logged in");

    Ok(LoginResponse {
        token,
        user: user.into(),
    })
}

/// Revoke the caller's session. Revoking twice is harmless.
pub fn logout(state: &SharedState, user: &AuthUser) {
    if state.sessions().revoke(&user.token) {
        debug!(user_id = %user.id, "session revoked");
    }
}

/// Resolve a session token into the caller identity.
pub async fn authenticate(state: &SharedState, token: &str) -> Result<AuthUser, ServiceError> {
    let user_id = state
        .sessions()
        .resolve(token)
        .ok_or_else(|| ServiceError::Unauthorized("invalid or expired session".into()))?;

    let store = state.require_store().await?;
    let Some(user) = store.find_user(user_id).await? else {
        state.sessions().revoke(token);
        return Err(ServiceError::Unauthorized("account no longer exists".into()));
    };

    Ok(AuthUser {
        id: user.id,
        username: user.username,
        is_admin: user.is_admin,
        token: token.to_string(),
    })
}

/// Fresh view of the caller's account.
pub async fn me(state: &SharedState, user: &AuthUser) -> Result<UserSummary, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_user(user.id)
        .await?
        .map(UserSummary::from)
        .ok_or_else(|| ServiceError::NotFound(format!("user `{}` not found", user.id)))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, dao::arena_store::MemoryStore, state::AppState};

    pub(crate) fn memory_state() -> SharedState {
        AppState::with_store(AppConfig::default(), Arc::new(MemoryStore::new()))
    }

    /// Register `username` and log it in.
    pub(crate) async fn signed_in(state: &SharedState, username: &str) -> AuthUser {
        register(
            state,
            RegisterRequest {
                username: username.into(),
                email: format!("{username}@example.com"),
                password: "correct horse".into(),
            },
        )
        .await
        .unwrap();
        let response = login(
            state,
            LoginRequest {
                username: username.into(),
                password: "correct horse".into(),
            },
        )
        .await
        .unwrap();
        authenticate(state, &response.token).await.unwrap()
    }

    #[tokio::test]
    async fn first_user_becomes_admin() {
        let state = memory_state();
        let admin = signed_in(&state, "admin").await;
        let player = signed_in(&state, "player").await;

        assert!(admin.is_admin);
        assert!(!player.is_admin);
        assert!(player.ensure_admin().is_err());
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let state = memory_state();
        signed_in(&state, "alice").await;

        let err = register(
            &state,
            RegisterRequest {
                username: "alice".into(),
                email: "other@example.com".into(),
                password: "another password".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let state = memory_state();
        signed_in(&state, "alice").await;

        let wrong = login(
            &state,
            LoginRequest {
                username: "alice".into(),
                password: "nope nope".into(),
            },
        )
        .await
        .unwrap_err();
        let unknown = login(
            &state,
            LoginRequest {
                username: "bob".into(),
                password: "nope nope".into(),
            },
        )
        .await
        .unwrap_err();

        assert_eq!(wrong.to_string(), unknown.to_string());
        assert!(matches!(wrong, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn logout_invalidates_the_token() {
        let state = memory_state();
        let alice = signed_in(&state, "alice").await;

        assert_eq!(me(&state, &alice).await.unwrap().username, "alice");
        logout(&state, &alice);
        logout(&state, &alice);
        assert!(matches!(
            authenticate(&state, &alice.token).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[test]
    fn password_hash_depends_on_salt() {
        assert_ne!(hash_password("a", "secret"), hash_password("b", "secret"));
        assert_eq!(hash_password("a", "secret").len(), 64);
    }
}
