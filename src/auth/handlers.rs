use axum::{
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::Redirect,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, PublicUser,
            RefreshResponse, RegisterRequest, ResetPasswordRequest, ResetTokenStatus, TokenPair,
            TokenQuery, TokenStatus, VerifyTokenRequest,
        },
        error::AuthError,
        extractors::{AuthUser, ACCESS_COOKIE, REFRESH_COOKIE},
        jwt::{JwtKeys, TokenKind},
        oauth,
        repo_types::User,
        service,
        tokens::generate_secret_token,
    },
    config::AppConfig,
    state::AppState,
};

const OAUTH_STATE_COOKIE: &str = "oauthState";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn session_cookie(
    name: &'static str,
    value: String,
    max_age: time::Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(max_age)
        .build()
}

/// Attach the freshly minted pair as httpOnly cookies. Max-ages follow the
/// token lifetimes so the browser drops them when the JWTs die.
fn with_session_cookies(
    jar: CookieJar,
    config: &AppConfig,
    keys: &JwtKeys,
    pair: TokenPair,
) -> CookieJar {
    let secure = config.cookie_secure;
    jar.add(session_cookie(
        ACCESS_COOKIE,
        pair.access_token,
        time::Duration::seconds(keys.access_ttl.as_secs() as i64),
        secure,
    ))
    .add(session_cookie(
        REFRESH_COOKIE,
        pair.refresh_token,
        time::Duration::seconds(keys.refresh_ttl.as_secs() as i64),
        secure,
    ))
}

fn without_session_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build((ACCESS_COOKIE, "")).path("/").build())
        .remove(Cookie::build((REFRESH_COOKIE, "")).path("/").build())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AuthError::Validation("Invalid email".into()));
    }
    if payload.username.len() < 3 {
        return Err(AuthError::Validation("Username too short".into()));
    }
    if payload.password.len() < 8 {
        return Err(AuthError::Validation("Password too short".into()));
    }

    let user = service::register(&state, &payload.username, &payload.email, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse { user: user.into() }),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(mut payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AuthError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        return Err(AuthError::Validation("Invalid email".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let (user, pair) = service::login(&state, &keys, &payload.email, &payload.password).await?;
    let jar = with_session_cookies(jar, &state.config, &keys, pair);

    Ok((jar, Json(AuthResponse { user: user.into() })))
}

#[instrument(skip(state, jar))]
pub async fn google_login(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AuthError> {
    let Some(google) = &state.config.google else {
        return Err(AuthError::Validation("Google login is not configured".into()));
    };

    let csrf_state = generate_secret_token();
    let url = oauth::authorize_url(google, &csrf_state)?;

    // Lax, not Strict: the browser must send this cookie on the top-level
    // redirect back from Google.
    let cookie = Cookie::build((OAUTH_STATE_COOKIE, csrf_state))
        .path("/")
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(10))
        .build();

    Ok((jar.add(cookie), Redirect::to(url.as_str())))
}

#[derive(Debug, serde::Deserialize)]
pub struct GoogleCallbackQuery {
    pub code: String,
    pub state: String,
}

#[instrument(skip(state, jar, query))]
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<GoogleCallbackQuery>,
) -> Result<(CookieJar, Redirect), AuthError> {
    let Some(google) = &state.config.google else {
        return Err(AuthError::Validation("Google login is not configured".into()));
    };

    let expected = jar
        .get(OAUTH_STATE_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AuthError::Unauthorized("Missing OAuth state".into()))?;
    if expected != query.state {
        warn!("oauth state mismatch");
        return Err(AuthError::Unauthorized("OAuth state mismatch".into()));
    }

    let profile = oauth::exchange_code(google, &query.code).await.map_err(|e| {
        warn!(error = %e, "google code exchange failed");
        AuthError::Unauthorized("Google sign-in failed".into())
    })?;

    let outcome = service::resolve_oauth(&state, profile).await?;
    match &outcome {
        service::OAuthOutcome::NewAccount(u) => info!(user_id = %u.id, "google login: new account"),
        service::OAuthOutcome::LinkedExisting(u) => info!(user_id = %u.id, "google login: linked"),
        service::OAuthOutcome::AlreadyLinked(u) => info!(user_id = %u.id, "google login"),
    }
    let user = outcome.into_user();

    let keys = JwtKeys::from_ref(&state);
    let pair = service::issue_session(&state, &keys, user.id).await?;

    let jar = jar.remove(Cookie::build((OAUTH_STATE_COOKIE, "")).path("/").build());
    let jar = with_session_cookies(jar, &state.config, &keys, pair);

    let dashboard = format!("{}/dashboard", state.config.frontend_url);
    Ok((jar, Redirect::to(&dashboard)))
}

#[instrument(skip(state, query))]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<MessageResponse>, AuthError> {
    service::verify_email(&state, &query.token).await?;
    Ok(Json(MessageResponse::new("Email verified successfully.")))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    payload.email = payload.email.trim().to_lowercase();
    // Malformed addresses fall through to the same generic message: this
    // endpoint never distinguishes its inputs.
    service::forgot_password(&state, &payload.email).await?;
    Ok(Json(MessageResponse::new(service::FORGOT_PASSWORD_MESSAGE)))
}

#[instrument(skip(state, query))]
pub async fn check_reset_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<ResetTokenStatus>, AuthError> {
    let email = service::check_reset_token(&state, &query.token).await?;
    Ok(Json(ResetTokenStatus { valid: true, email }))
}

#[instrument(skip(state, query, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    if payload.password.len() < 8 {
        return Err(AuthError::Validation("Password too short".into()));
    }
    service::reset_password(&state, &query.token, &payload.password).await?;
    Ok(Json(MessageResponse::new(
        "Password has been reset successfully.",
    )))
}

/// The rotated pair goes into the body as well as the cookies: the
/// frontend middleware re-reads it from JSON when refreshing mid-request.
#[instrument(skip(state, jar))]
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<RefreshResponse>), AuthError> {
    let presented = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AuthError::Unauthorized("Missing refresh token".into()))?;

    let keys = JwtKeys::from_ref(&state);
    let (user, pair) = service::refresh_session(&state, &keys, &presented).await?;
    let body = RefreshResponse {
        access_token: pair.access_token.clone(),
        refresh_token: pair.refresh_token.clone(),
        user: user.into(),
    };
    let jar = with_session_cookies(jar, &state.config, &keys, pair);

    Ok((jar, Json(body)))
}

/// Access-token introspection for the frontend middleware. Always 200;
/// invalid tokens (and valid tokens of the wrong kind) report
/// `valid: false` instead of erroring.
#[instrument(skip(state, payload))]
pub async fn verify_token(
    State(state): State<AppState>,
    Json(payload): Json<VerifyTokenRequest>,
) -> Json<TokenStatus> {
    let keys = JwtKeys::from_ref(&state);
    match keys.verify(&payload.token) {
        Ok(claims) if claims.kind == TokenKind::Access => Json(TokenStatus {
            valid: true,
            user_id: Some(claims.sub),
        }),
        _ => Json(TokenStatus {
            valid: false,
            user_id: None,
        }),
    }
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AuthError::Unauthorized("User not found".into()))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    AuthUser(user_id): AuthUser,
) -> Result<(CookieJar, Json<MessageResponse>), AuthError> {
    service::logout(&state, user_id).await?;
    Ok((
        without_session_cookies(jar),
        Json(MessageResponse::new("Logout successful.")),
    ))
}
