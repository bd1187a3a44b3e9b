use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Domain errors surfaced by the auth service. Every variant maps to a 4xx
/// with a stable machine-readable kind; anything unexpected becomes a 500
/// with a generic body.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    /// Covers both unknown email and wrong password. The message must not
    /// reveal which check failed (account enumeration).
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email address is not verified")]
    NotVerified,

    /// Missing, expired or already-consumed verification/reset token.
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    fn kind(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "validation_error",
            AuthError::Conflict(_) => "conflict",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::NotVerified => "not_verified",
            AuthError::InvalidToken => "invalid_token",
            AuthError::Unauthorized(_) => "unauthorized",
            AuthError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::NotVerified => StatusCode::FORBIDDEN,
            AuthError::InvalidToken => StatusCode::BAD_REQUEST,
            AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::Internal(e.into())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AuthError::Internal(e) => {
                error!(error = %e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(json!({ "error": self.kind(), "message": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_errors_share_one_generic_message() {
        // Unknown email and wrong password must be indistinguishable.
        assert_eq!(AuthError::InvalidCredentials.to_string(), "Invalid credentials");
        assert_eq!(AuthError::InvalidCredentials.kind(), "invalid_credentials");
    }

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            AuthError::Conflict("dup".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(AuthError::InvalidToken.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::NotVerified.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::Unauthorized("no".into()).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn internal_error_body_does_not_leak() {
        let err = AuthError::Internal(anyhow::anyhow!("secret db detail"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
