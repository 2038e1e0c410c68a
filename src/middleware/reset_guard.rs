/// Reset-token guard.
///
/// Read-only check that an `{id, token}` pair from a mailed reset link is
/// currently valid. Gates both `verify-pass-reset-token` and `reset-pass`
/// before any password logic runs; it never consumes the record, so a failed
/// password update can be retried with the same link.

use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::ephemeral_token::{self, TokenKind};
use crate::error::AppError;

/// # Errors
/// Returns `InvalidResetToken` when the record is absent, expired, or the
/// token does not match — deliberately indistinguishable to the caller.
pub async fn ensure_valid_reset_token(
    pool: &PgPool,
    owner_id: Uuid,
    token: &str,
) -> Result<(), AppError> {
    let valid = ephemeral_token::check(pool, owner_id, TokenKind::PasswordReset, token).await?;
    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidResetToken)
    }
}
