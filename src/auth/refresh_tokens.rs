/// Refresh-token set, one per account.
///
/// The `refresh_tokens` table is a set keyed on `(user_id, token_hash)`:
/// membership, not the JWT signature, is the source of truth for revocation.
/// Tokens are SHA-256 hashed before storage; the plaintext never touches the
/// database. Rotation is a single conditional SQL statement so that two
/// concurrent rotations of the same token cannot both succeed against a
/// stale read.

use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

/// One-way hash of a token for storage and lookup
pub(crate) fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Add a token to the account's set
///
/// Adding an already-present member is a no-op (set semantics).
///
/// # Errors
/// Returns error if the database operation fails
pub async fn add(pool: &PgPool, user_id: Uuid, token: &str) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, token_hash, created_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, token_hash) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(hash_token(token))
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Atomically replace `old_token` with `new_token` in the account's set.
///
/// The insert is fed by the delete, so it commits only if the old token was
/// still a member at commit time. Returns `false` when the old token was
/// absent — a cryptographically valid but revoked token, i.e. a compromise
/// signal the caller must act on.
///
/// # Errors
/// Returns error if the database operation fails
pub async fn rotate(
    pool: &PgPool,
    user_id: Uuid,
    old_token: &str,
    new_token: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        WITH removed AS (
            DELETE FROM refresh_tokens
            WHERE user_id = $1 AND token_hash = $2
            RETURNING user_id
        )
        INSERT INTO refresh_tokens (user_id, token_hash, created_at)
        SELECT user_id, $3, $4 FROM removed
        "#,
    )
    .bind(user_id)
    .bind(hash_token(old_token))
    .bind(hash_token(new_token))
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Remove one token from the account's set; absence is not an error
///
/// # Errors
/// Returns error if the database operation fails
pub async fn remove(pool: &PgPool, user_id: Uuid, token: &str) -> Result<(), AppError> {
    sqlx::query(
        r#"
        DELETE FROM refresh_tokens
        WHERE user_id = $1 AND token_hash = $2
        "#,
    )
    .bind(user_id)
    .bind(hash_token(token))
    .execute(pool)
    .await?;

    Ok(())
}

/// Revoke every refresh token for an account, forcing re-authentication on
/// all devices. Used on compromise detection and on password reset.
///
/// # Errors
/// Returns error if the database operation fails
pub async fn clear_all(pool: &PgPool, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;

    tracing::info!(user_id = %user_id, "All refresh tokens revoked for user");
    Ok(())
}

/// Number of tokens currently in the account's set (test support)
///
/// # Errors
/// Returns error if the database operation fails
pub async fn count(pool: &PgPool, user_id: Uuid) -> Result<i64, AppError> {
    let count = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM refresh_tokens WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_hashing_is_stable() {
        let token = "header.payload.signature";
        let hash1 = hash_token(token);
        let hash2 = hash_token(token);

        assert_eq!(hash1, hash2);
        assert_ne!(token, hash1);
        // SHA-256 hex
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_tokens_different_hashes() {
        assert_ne!(hash_token("token-one"), hash_token("token-two"));
    }
}
