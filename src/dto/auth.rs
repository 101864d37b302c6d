use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::UserEntity,
    dto::{format_system_time, validation::validate_username},
};

/// Payload used to create an account.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    /// Login name, 3 to 32 characters among `[a-z0-9_]`.
    #[validate(length(min = 3, max = 32), custom(function = "validate_username"))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    /// At least 8 characters.
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Credentials exchanged for a session token.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 32))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Public projection of an account.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub practice_tokens: u32,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl From<UserEntity> for UserSummary {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id,
            username: value.username,
            email: value.email,
            is_admin: value.is_admin,
            practice_tokens: value.practice_tokens,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Session issued by a successful login.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Bearer token to send in the `X-Session-Token` header.
    pub token: String,
    pub user: UserSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_rules() {
        let valid = RegisterRequest {
            username: "quiz_master".into(),
            email: "quiz@example.com".into(),
            password: "correct horse".into(),
        };
        assert!(valid.validate().is_ok());

        let short_password = RegisterRequest {
            password: "short".into(),
            ..valid
        };
        let errors = short_password.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));

        let bad = RegisterRequest {
            username: "Quiz Master".into(),
            email: "not-an-email".into(),
            password: "correct horse".into(),
        };
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));
        assert!(errors.field_errors().contains_key("email"));
    }
}
