use rand::rngs::OsRng;
use rand::RngCore;
use time::{Duration, OffsetDateTime};

/// Raw length of verification/reset tokens before hex encoding.
pub const SECRET_TOKEN_BYTES: usize = 32;

/// Both opaque-token flows use the same short expiry window.
pub const VERIFICATION_TOKEN_TTL: Duration = Duration::minutes(15);
pub const RESET_TOKEN_TTL: Duration = Duration::minutes(15);

/// Mint a single-use opaque token: 32 random bytes, hex-encoded. The token
/// has no embedded structure; it is only ever looked up in storage.
pub fn generate_secret_token() -> String {
    let mut buf = [0u8; SECRET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Single expiry predicate shared by every token-consuming path. A token is
/// valid strictly before its expiry instant.
pub fn is_expired(expiry: OffsetDateTime, now: OffsetDateTime) -> bool {
    now >= expiry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_64_hex_chars() {
        let token = generate_secret_token();
        assert_eq!(token.len(), SECRET_TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_do_not_repeat() {
        let a = generate_secret_token();
        let b = generate_secret_token();
        assert_ne!(a, b);
    }

    #[test]
    fn expiry_is_exclusive() {
        let now = OffsetDateTime::now_utc();
        assert!(!is_expired(now + Duration::minutes(1), now));
        assert!(is_expired(now, now));
        assert!(is_expired(now - Duration::seconds(1), now));
    }
}
