use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::User;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

/// `?token=...` on the verify-email and reset-password routes.
#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

/// Request body for the token-introspection endpoint.
#[derive(Debug, Deserialize)]
pub struct VerifyTokenRequest {
    pub token: String,
}

/// Freshly minted access/refresh pair. Delivered to the client exclusively
/// through httpOnly cookies.
#[derive(Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub is_verified: bool,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            avatar: user.avatar,
            is_verified: user.is_verified,
        }
    }
}

/// Response for register, login and refresh. Tokens travel in cookies
/// only, never in the body.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response for the reset-password validity check.
#[derive(Debug, Serialize)]
pub struct ResetTokenStatus {
    pub valid: bool,
    pub email: String,
}

/// Response for token introspection. The frontend reads `userId`, hence
/// the rename.
#[derive(Debug, Serialize)]
pub struct TokenStatus {
    pub valid: bool,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

/// Response for refresh: the rotated pair travels in the body as well as
/// the cookies, for consumers that read it from JSON.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "al".into(),
            email: "al@x.com".into(),
            password_hash: Some("$argon2id$...".into()),
            oauth_id: None,
            avatar: None,
            is_verified: false,
            verification_token: Some("deadbeef".into()),
            verification_token_expires: Some(OffsetDateTime::now_utc()),
            reset_token: None,
            reset_token_expires: None,
            refresh_token_hash: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn public_user_drops_sensitive_fields() {
        let public: PublicUser = sample_user().into();
        let json = serde_json::to_string(&public).unwrap();
        assert!(json.contains("al@x.com"));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("deadbeef"));
    }

    #[test]
    fn user_row_serialization_skips_secrets() {
        let json = serde_json::to_string(&sample_user()).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("verification_token"));
        assert!(!json.contains("reset_token"));
        assert!(!json.contains("refresh_token_hash"));
    }

    #[test]
    fn token_status_hides_absent_user_id() {
        let status = TokenStatus {
            valid: false,
            user_id: None,
        };
        assert_eq!(serde_json::to_string(&status).unwrap(), r#"{"valid":false}"#);
    }

    #[test]
    fn token_status_uses_camel_case_user_id() {
        let id = Uuid::new_v4();
        let status = TokenStatus {
            valid: true,
            user_id: Some(id),
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"userId\""));
        assert!(!json.contains("user_id"));
    }

    #[test]
    fn refresh_response_exposes_camel_case_pair() {
        let response = RefreshResponse {
            access_token: "a.b.c".into(),
            refresh_token: "d.e.f".into(),
            user: sample_user().into(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"accessToken\":\"a.b.c\""));
        assert!(json.contains("\"refreshToken\":\"d.e.f\""));
    }
}
