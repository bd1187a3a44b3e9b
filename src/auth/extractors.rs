use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::auth::jwt::{JwtKeys, TokenKind};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Extracts and validates the access token, returning the user ID. Accepts
/// either a `Bearer` Authorization header or the `accessToken` cookie the
/// login flow sets. Rejections go through [`AuthError`] so protected
/// routes fail with the same `{error, message}` body as everything else.
#[derive(Debug)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);

        let header_token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
            .map(|t| t.to_string());

        let token = match header_token {
            Some(t) => t,
            None => {
                let jar = CookieJar::from_headers(&parts.headers);
                jar.get(ACCESS_COOKIE)
                    .map(|c| c.value().to_string())
                    .ok_or_else(|| AuthError::Unauthorized("Missing access token".into()))?
            }
        };

        let claims = match keys.verify(&token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err(AuthError::Unauthorized("Invalid or expired token".into()));
            }
        };

        if claims.kind != TokenKind::Access {
            return Err(AuthError::Unauthorized("Access token required".into()));
        }

        Ok(AuthUser(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::http::Request;

    fn parts_with_header(auth: Option<String>) -> Parts {
        let mut builder = Request::builder().uri("/auth/me");
        if let Some(value) = auth {
            builder = builder.header(axum::http::header::AUTHORIZATION, value);
        }
        let (parts, ()) = builder.body(()).expect("request").into_parts();
        parts
    }

    #[tokio::test]
    async fn missing_token_rejects_with_unauthorized_error() {
        let state = AppState::fake();
        let mut parts = parts_with_header(None);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn refresh_token_in_header_is_rejected() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_refresh(Uuid::new_v4()).expect("sign refresh");
        let mut parts = parts_with_header(Some(format!("Bearer {token}")));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn bearer_access_token_is_accepted() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user_id = Uuid::new_v4();
        let token = keys.sign_access(user_id).expect("sign access");
        let mut parts = parts_with_header(Some(format!("Bearer {token}")));
        let AuthUser(extracted) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("extract");
        assert_eq!(extracted, user_id);
    }
}
