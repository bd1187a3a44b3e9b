use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::dto::TokenPair;
use crate::auth::error::AuthError;
use crate::auth::jwt::JwtKeys;
use crate::auth::oauth::OAuthProfile;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo_types::User;
use crate::auth::tokens::{
    generate_secret_token, is_expired, RESET_TOKEN_TTL, VERIFICATION_TOKEN_TTL,
};
use crate::state::AppState;

/// Returned verbatim whether or not the address exists, so the endpoint
/// cannot be used to enumerate accounts.
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If a user with that email exists, a password reset link has been sent.";

/// Outcome of resolving an external OAuth profile against the store. The
/// three branches carry different side effects, so they stay distinct
/// instead of collapsing into "a user".
#[derive(Debug)]
pub enum OAuthOutcome {
    /// No account matched; a verified one was created.
    NewAccount(User),
    /// An account with the same email existed without an external identity;
    /// the profile was linked onto it.
    LinkedExisting(User),
    /// The external identity was already linked.
    AlreadyLinked(User),
}

impl OAuthOutcome {
    pub fn user(&self) -> &User {
        match self {
            OAuthOutcome::NewAccount(u)
            | OAuthOutcome::LinkedExisting(u)
            | OAuthOutcome::AlreadyLinked(u) => u,
        }
    }

    pub fn into_user(self) -> User {
        match self {
            OAuthOutcome::NewAccount(u)
            | OAuthOutcome::LinkedExisting(u)
            | OAuthOutcome::AlreadyLinked(u) => u,
        }
    }
}

fn map_unique_violation(e: sqlx::Error, conflict: &str) -> AuthError {
    if let sqlx::Error::Database(db) = &e {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return AuthError::Conflict(conflict.to_string());
        }
    }
    AuthError::Internal(e.into())
}

/// Sign a fresh access/refresh pair and persist the argon2 hash of the
/// refresh token, so logout and rotation can invalidate it server-side.
pub async fn issue_session(
    state: &AppState,
    keys: &JwtKeys,
    user_id: Uuid,
) -> Result<TokenPair, AuthError> {
    let access_token = keys.sign_access(user_id)?;
    let refresh_token = keys.sign_refresh(user_id)?;
    let hash = hash_password(&refresh_token)?;
    User::set_refresh_token_hash(&state.db, user_id, &hash).await?;
    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Create the account unverified and dispatch the verification mail. No
/// tokens are issued here: the user logs in after verifying. A failed mail
/// send is logged and swallowed so the account creation stands.
pub async fn register(
    state: &AppState,
    username: &str,
    email: &str,
    password: &str,
) -> Result<User, AuthError> {
    let password_hash = hash_password(password)?;
    let token = generate_secret_token();
    let expires = OffsetDateTime::now_utc() + VERIFICATION_TOKEN_TTL;

    let user = User::create_with_password(&state.db, username, email, &password_hash, &token, expires)
        .await
        .map_err(|e| map_unique_violation(e, "Email or username already in use"))?;

    let link = format!("{}/verify-email?token={}", state.config.frontend_url, token);
    if let Err(e) = state
        .mailer
        .send(
            &user.email,
            "Verify your email",
            &format!(
                "Welcome to Inkpost, {}!\n\nPlease verify your email within 15 minutes: {}",
                user.username, link
            ),
        )
        .await
    {
        warn!(error = %e, user_id = %user.id, "verification email failed to send");
    }

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn login(
    state: &AppState,
    keys: &JwtKeys,
    email: &str,
    password: &str,
) -> Result<(User, TokenPair), AuthError> {
    let user = User::find_by_email(&state.db, email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    // OAuth-only accounts have no hash and cannot log in with a password.
    let hash = user
        .password_hash
        .as_deref()
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(password, hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    if !user.is_verified {
        return Err(AuthError::NotVerified);
    }

    let pair = issue_session(state, keys, user.id).await?;
    info!(user_id = %user.id, "user logged in");
    Ok((user, pair))
}

/// Consume a verification token. The conditional UPDATE in the repo is the
/// atomicity mechanism: concurrent submissions of the same token let at
/// most one through.
pub async fn verify_email(state: &AppState, token: &str) -> Result<User, AuthError> {
    let user = User::consume_verification_token(&state.db, token)
        .await?
        .ok_or(AuthError::InvalidToken)?;
    info!(user_id = %user.id, "email verified");
    Ok(user)
}

/// Never reveals whether the email matched. The reset token is persisted
/// before the mail goes out, so a transient provider outage still leaves a
/// usable token behind.
pub async fn forgot_password(state: &AppState, email: &str) -> Result<(), AuthError> {
    let Some(user) = User::find_by_email(&state.db, email).await? else {
        return Ok(());
    };

    let token = generate_secret_token();
    let expires = OffsetDateTime::now_utc() + RESET_TOKEN_TTL;
    User::set_reset_token(&state.db, user.id, &token, expires).await?;

    let link = format!("{}/reset-password/{}", state.config.frontend_url, token);
    if let Err(e) = state
        .mailer
        .send(
            &user.email,
            "Reset your password",
            &format!(
                "Hi {},\n\nUse the following link to reset your password (valid 15 minutes): {}",
                user.username, link
            ),
        )
        .await
    {
        warn!(error = %e, user_id = %user.id, "reset email failed to send");
    }

    info!(user_id = %user.id, "reset token issued");
    Ok(())
}

/// Read-only validity check for the reset form; does not consume the token.
pub async fn check_reset_token(state: &AppState, token: &str) -> Result<String, AuthError> {
    let user = User::find_by_reset_token(&state.db, token)
        .await?
        .ok_or(AuthError::InvalidToken)?;
    match user.reset_token_expires {
        Some(expires) if !is_expired(expires, OffsetDateTime::now_utc()) => Ok(user.email),
        _ => Err(AuthError::InvalidToken),
    }
}

pub async fn reset_password(
    state: &AppState,
    token: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    let password_hash = hash_password(new_password)?;
    let user = User::consume_reset_token(&state.db, token, &password_hash)
        .await?
        .ok_or(AuthError::InvalidToken)?;
    info!(user_id = %user.id, "password reset");
    Ok(())
}

/// Rotate the session from a presented refresh token. Requires a valid
/// signature of the refresh kind, an existing user, and a match against the
/// stored hash (a logged-out or superseded token fails here).
pub async fn refresh_session(
    state: &AppState,
    keys: &JwtKeys,
    presented: &str,
) -> Result<(User, TokenPair), AuthError> {
    let claims = keys
        .verify_refresh(presented)
        .map_err(|_| AuthError::Unauthorized("Invalid refresh token".into()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AuthError::Unauthorized("Invalid refresh token".into()))?;

    let stored = user
        .refresh_token_hash
        .as_deref()
        .ok_or_else(|| AuthError::Unauthorized("Invalid refresh token".into()))?;
    if !verify_password(presented, stored)? {
        warn!(user_id = %user.id, "refresh token does not match stored hash");
        return Err(AuthError::Unauthorized("Invalid refresh token".into()));
    }

    let pair = issue_session(state, keys, user.id).await?;
    info!(user_id = %user.id, "session refreshed");
    Ok((user, pair))
}

/// Idempotent: clearing an already-cleared hash is a no-op.
pub async fn logout(state: &AppState, user_id: Uuid) -> Result<(), AuthError> {
    User::clear_refresh_token_hash(&state.db, user_id).await?;
    info!(user_id = %user_id, "user logged out");
    Ok(())
}

/// Username for a brand-new OAuth account: the display name when the
/// provider gives one, otherwise the email itself.
fn oauth_username(profile: &OAuthProfile, email: &str) -> String {
    profile
        .name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(email)
        .to_string()
}

/// Provider emails arrive in arbitrary case; normalize them exactly like
/// the register/login handlers do, so the lookup hits the same row instead
/// of creating a duplicate account.
fn normalized_profile_email(profile: &OAuthProfile) -> Option<String> {
    profile
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
}

/// An account found by email can only adopt the external identity if it
/// has none yet, or already carries this exact one.
fn link_conflict(user: &User, external_id: &str) -> bool {
    user.oauth_id
        .as_deref()
        .is_some_and(|existing| existing != external_id)
}

/// Resolve an external profile to a local account: lookup by external id,
/// then by email (link), then create. Idempotent across repeated logins
/// with the same profile.
pub async fn resolve_oauth(
    state: &AppState,
    profile: OAuthProfile,
) -> Result<OAuthOutcome, AuthError> {
    let email = normalized_profile_email(&profile)
        .ok_or_else(|| AuthError::Validation("No email found in OAuth profile".into()))?;

    if let Some(user) = User::find_by_oauth_id(&state.db, &profile.id).await? {
        return Ok(OAuthOutcome::AlreadyLinked(user));
    }

    if let Some(user) = User::find_by_email(&state.db, &email).await? {
        if link_conflict(&user, &profile.id) {
            warn!(user_id = %user.id, "oauth profile email belongs to an account linked elsewhere");
            return Err(AuthError::Conflict(
                "This email is already linked to a different sign-in identity".into(),
            ));
        }
        if user.oauth_id.is_some() {
            return Ok(OAuthOutcome::AlreadyLinked(user));
        }
        let linked =
            User::link_oauth(&state.db, user.id, &profile.id, profile.avatar.as_deref()).await?;
        info!(user_id = %linked.id, "oauth identity linked to existing account");
        return Ok(OAuthOutcome::LinkedExisting(linked));
    }

    let username = oauth_username(&profile, &email);
    let created = match User::create_from_oauth(
        &state.db,
        &username,
        &email,
        &profile.id,
        profile.avatar.as_deref(),
    )
    .await
    {
        Ok(u) => u,
        // Display name collided with an existing username; the email is
        // known-free, so retry with it.
        Err(e)
            if matches!(&e, sqlx::Error::Database(db)
                if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)) =>
        {
            User::create_from_oauth(&state.db, &email, &email, &profile.id, profile.avatar.as_deref())
                .await?
        }
        Err(e) => return Err(e.into()),
    };
    info!(user_id = %created.id, "oauth account created");
    Ok(OAuthOutcome::NewAccount(created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::FromRef;

    fn profile(name: Option<&str>) -> OAuthProfile {
        OAuthProfile {
            id: "google-sub-1".into(),
            email: Some("al@x.com".into()),
            name: name.map(|s| s.to_string()),
            avatar: None,
        }
    }

    #[test]
    fn oauth_username_prefers_display_name() {
        assert_eq!(oauth_username(&profile(Some("Al Example")), "al@x.com"), "Al Example");
    }

    #[test]
    fn oauth_username_falls_back_to_email() {
        assert_eq!(oauth_username(&profile(None), "al@x.com"), "al@x.com");
        assert_eq!(oauth_username(&profile(Some("   ")), "al@x.com"), "al@x.com");
    }

    #[test]
    fn profile_email_is_trimmed_and_lowercased() {
        let mut p = profile(None);
        p.email = Some("  Al@X.com ".into());
        assert_eq!(normalized_profile_email(&p).as_deref(), Some("al@x.com"));
    }

    #[test]
    fn profile_email_missing_or_blank_is_none() {
        let mut p = profile(None);
        p.email = None;
        assert_eq!(normalized_profile_email(&p), None);
        p.email = Some("   ".into());
        assert_eq!(normalized_profile_email(&p), None);
    }

    fn user_with_oauth_id(oauth_id: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            username: "al".into(),
            email: "al@x.com".into(),
            password_hash: Some("$argon2id$...".into()),
            oauth_id: oauth_id.map(|s| s.to_string()),
            avatar: None,
            is_verified: true,
            verification_token: None,
            verification_token_expires: None,
            reset_token: None,
            reset_token_expires: None,
            refresh_token_hash: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn linking_requires_a_free_or_matching_identity_slot() {
        assert!(!link_conflict(&user_with_oauth_id(None), "google-sub-1"));
        assert!(!link_conflict(
            &user_with_oauth_id(Some("google-sub-1")),
            "google-sub-1"
        ));
        assert!(link_conflict(
            &user_with_oauth_id(Some("google-sub-2")),
            "google-sub-1"
        ));
    }

    #[test]
    fn forgot_password_message_is_fixed() {
        // The handler returns this constant on both branches; a changed
        // message on one path would reintroduce account enumeration.
        assert!(FORGOT_PASSWORD_MESSAGE.starts_with("If a user with that email exists"));
    }

    #[tokio::test]
    async fn refresh_rejects_garbage_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let err = refresh_session(&state, &keys, "not.a.jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        // An access token has a valid signature but the wrong kind; it must
        // not rotate a session.
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let access = keys.sign_access(Uuid::new_v4()).expect("sign access");
        let err = refresh_session(&state, &keys, &access).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(_)));
    }

    #[test]
    fn oauth_outcome_exposes_user_uniformly() {
        let user = crate::auth::repo_types::User {
            id: uuid::Uuid::new_v4(),
            username: "al".into(),
            email: "al@x.com".into(),
            password_hash: None,
            oauth_id: Some("google-sub-1".into()),
            avatar: None,
            is_verified: true,
            verification_token: None,
            verification_token_expires: None,
            reset_token: None,
            reset_token_expires: None,
            refresh_token_hash: None,
            created_at: time::OffsetDateTime::now_utc(),
        };
        let id = user.id;
        let outcome = OAuthOutcome::NewAccount(user);
        assert_eq!(outcome.user().id, id);
        assert_eq!(outcome.into_user().id, id);
    }
}
