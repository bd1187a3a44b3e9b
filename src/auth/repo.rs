use crate::auth::repo_types::User;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, password_hash, oauth_id, avatar, is_verified, \
     verification_token, verification_token_expires, reset_token, reset_token_expires, \
     refresh_token_hash, created_at";

impl User {
    /// Find a user by email (the primary login key).
    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_oauth_id(db: &PgPool, oauth_id: &str) -> sqlx::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE oauth_id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(oauth_id)
            .fetch_optional(db)
            .await
    }

    /// Create a password account with its verification token already set.
    /// Duplicate email/username surfaces as a unique-violation error.
    pub async fn create_with_password(
        db: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
        verification_token: &str,
        verification_token_expires: OffsetDateTime,
    ) -> sqlx::Result<User> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, verification_token, verification_token_expires) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .bind(email)
            .bind(password_hash)
            .bind(verification_token)
            .bind(verification_token_expires)
            .fetch_one(db)
            .await
    }

    /// Create an account from an OAuth profile. The provider has already
    /// verified the email, so the account starts verified.
    pub async fn create_from_oauth(
        db: &PgPool,
        username: &str,
        email: &str,
        oauth_id: &str,
        avatar: Option<&str>,
    ) -> sqlx::Result<User> {
        let sql = format!(
            "INSERT INTO users (username, email, oauth_id, avatar, is_verified) \
             VALUES ($1, $2, $3, $4, TRUE) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .bind(email)
            .bind(oauth_id)
            .bind(avatar)
            .fetch_one(db)
            .await
    }

    /// Attach an external identity to an existing account. Upgrades the
    /// verified flag (never downgrades) and adopts the avatar only when the
    /// account has none.
    pub async fn link_oauth(
        db: &PgPool,
        id: Uuid,
        oauth_id: &str,
        avatar: Option<&str>,
    ) -> sqlx::Result<User> {
        let sql = format!(
            "UPDATE users SET oauth_id = $2, avatar = COALESCE(avatar, $3), is_verified = TRUE \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(oauth_id)
            .bind(avatar)
            .fetch_one(db)
            .await
    }

    /// Flip the verified flag and clear the token pair in one conditional
    /// UPDATE. The guard on the token value and its expiry makes concurrent
    /// submissions race safely: at most one row update wins, the loser gets
    /// `None`.
    pub async fn consume_verification_token(
        db: &PgPool,
        token: &str,
    ) -> sqlx::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET is_verified = TRUE, verification_token = NULL, \
             verification_token_expires = NULL \
             WHERE verification_token = $1 AND verification_token_expires > now() \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .fetch_optional(db)
            .await
    }

    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        token: &str,
        expires: OffsetDateTime,
    ) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET reset_token = $2, reset_token_expires = $3 WHERE id = $1")
            .bind(id)
            .bind(token)
            .bind(expires)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Read-only lookup used by the reset-password form to show whose
    /// password is being reset. Expiry is checked by the caller.
    pub async fn find_by_reset_token(db: &PgPool, token: &str) -> sqlx::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE reset_token = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .fetch_optional(db)
            .await
    }

    /// Replace the password and clear the reset token pair in one
    /// conditional UPDATE, same race discipline as
    /// [`User::consume_verification_token`].
    pub async fn consume_reset_token(
        db: &PgPool,
        token: &str,
        new_password_hash: &str,
    ) -> sqlx::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET password_hash = $2, reset_token = NULL, reset_token_expires = NULL \
             WHERE reset_token = $1 AND reset_token_expires > now() \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .bind(new_password_hash)
            .fetch_optional(db)
            .await
    }

    pub async fn set_refresh_token_hash(db: &PgPool, id: Uuid, hash: &str) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET refresh_token_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Idempotent: a second logout matches zero rows and still succeeds.
    pub async fn clear_refresh_token_hash(db: &PgPool, id: Uuid) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE users SET refresh_token_hash = NULL \
             WHERE id = $1 AND refresh_token_hash IS NOT NULL",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }
}
