use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. Owns every piece of durable identity state:
/// credentials, the OAuth link, and the outstanding single-use tokens.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Argon2 hash; absent for OAuth-only accounts, never exposed in JSON.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// External provider subject id, unique when present.
    pub oauth_id: Option<String>,
    pub avatar: Option<String>,
    pub is_verified: bool,
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub verification_token_expires: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expires: Option<OffsetDateTime>,
    /// Argon2 hash of the last issued refresh token; cleared on logout.
    #[serde(skip_serializing)]
    pub refresh_token_hash: Option<String>,
    pub created_at: OffsetDateTime,
}
