/// Ephemeral token store: single-use, time-boxed, hashed secrets mailed to a
/// user to authorize one sensitive action.
///
/// Two kinds, structurally identical but stored in separate tables:
/// email verification (24 h TTL) and password reset (1 h TTL). At most one
/// live token per kind per account — issuing supersedes any prior one via
/// upsert. Only a SHA-256 hash is stored; the plaintext exists solely in the
/// link sent out-of-band. Expiry is passive: lookups ignore records older
/// than the TTL even before they are purged.

use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

const TOKEN_ENTROPY_BYTES: usize = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Verification,
    PasswordReset,
}

impl TokenKind {
    fn table(self) -> &'static str {
        match self {
            TokenKind::Verification => "verification_tokens",
            TokenKind::PasswordReset => "password_reset_tokens",
        }
    }

    fn ttl(self) -> Duration {
        match self {
            TokenKind::Verification => Duration::hours(24),
            TokenKind::PasswordReset => Duration::hours(1),
        }
    }
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Constant-time equality over the hex digests
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Issue a fresh token for `owner_id`, superseding any prior token of the
/// same kind. Returns the plaintext, to be embedded in a mailed link.
///
/// # Errors
/// Returns error if the database operation fails
pub async fn issue(pool: &PgPool, owner_id: Uuid, kind: TokenKind) -> Result<String, AppError> {
    let token = generate_token();
    let sql = format!(
        r#"
        INSERT INTO {} (owner_id, token_hash, created_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (owner_id) DO UPDATE
        SET token_hash = EXCLUDED.token_hash, created_at = EXCLUDED.created_at
        "#,
        kind.table()
    );

    sqlx::query(&sql)
        .bind(owner_id)
        .bind(hash_token(&token))
        .bind(Utc::now())
        .execute(pool)
        .await?;

    Ok(token)
}

/// Read-only check of a presented plaintext token against the stored hash.
///
/// Returns `false` when the record is absent, older than the kind's TTL, or
/// the hashes do not match; the caller cannot tell which. Does not consume
/// the record — deletion is the caller's responsibility and its timing is a
/// flow-level decision (verification deletes on use, reset deletes only
/// after the password update succeeds).
///
/// # Errors
/// Returns error if the database operation fails
pub async fn check(
    pool: &PgPool,
    owner_id: Uuid,
    kind: TokenKind,
    token: &str,
) -> Result<bool, AppError> {
    let cutoff = Utc::now() - kind.ttl();
    let sql = format!(
        r#"
        SELECT token_hash FROM {}
        WHERE owner_id = $1 AND created_at > $2
        "#,
        kind.table()
    );

    let record = sqlx::query_as::<_, (String,)>(&sql)
        .bind(owner_id)
        .bind(cutoff)
        .fetch_optional(pool)
        .await?;

    match record {
        Some((stored_hash,)) => Ok(constant_time_eq(&hash_token(token), &stored_hash)),
        None => Ok(false),
    }
}

/// Delete the owner's token of the given kind, if any
///
/// # Errors
/// Returns error if the database operation fails
pub async fn delete(pool: &PgPool, owner_id: Uuid, kind: TokenKind) -> Result<(), AppError> {
    let sql = format!("DELETE FROM {} WHERE owner_id = $1", kind.table());

    sqlx::query(&sql).bind(owner_id).execute(pool).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_carry_enough_entropy() {
        let token = generate_token();
        // 36 bytes hex-encoded
        assert_eq!(token.len(), TOKEN_ENTROPY_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn hashing_is_one_way_and_stable() {
        let token = generate_token();
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }

    #[test]
    fn constant_time_eq_matches_plain_equality() {
        let a = hash_token("one");
        let b = hash_token("two");
        assert!(constant_time_eq(&a, &a));
        assert!(!constant_time_eq(&a, &b));
        assert!(!constant_time_eq(&a, &a[..32]));
    }

    #[test]
    fn kinds_are_stored_separately() {
        assert_ne!(
            TokenKind::Verification.table(),
            TokenKind::PasswordReset.table()
        );
        assert!(TokenKind::Verification.ttl() > TokenKind::PasswordReset.ttl());
    }
}
