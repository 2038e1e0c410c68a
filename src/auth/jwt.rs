/// Token codec: signs and verifies the access/refresh JWT pair.
///
/// One process-wide secret from configuration. The codec alone cannot
/// distinguish two refresh tokens for the same subject; revocation relies on
/// set membership in the credential store, not on the signature.

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::AppError;

/// Sign a short-lived access token for a user
///
/// # Errors
/// Returns error if token encoding fails
pub fn issue_access_token(user_id: Uuid, config: &JwtSettings) -> Result<String, AppError> {
    let claims = Claims::access(user_id, config.access_token_expiry, config.issuer.clone());
    sign(&claims, config)
}

/// Sign a refresh token for a user; carries no expiry of its own
///
/// # Errors
/// Returns error if token encoding fails
pub fn issue_refresh_token(user_id: Uuid, config: &JwtSettings) -> Result<String, AppError> {
    let claims = Claims::refresh(user_id, config.issuer.clone());
    sign(&claims, config)
}

fn sign(claims: &Claims, config: &JwtSettings) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Verify an access token and extract its claims
///
/// # Errors
/// - `SessionExpired` if the expiry window has elapsed
/// - `InvalidToken` for any other signature/format failure
pub fn verify_access_token(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::SessionExpired,
        _ => {
            tracing::warn!("Access token validation error: {}", e);
            AppError::InvalidToken
        }
    })
}

/// Verify a refresh token's signature and format only
///
/// Set membership is checked separately by the caller; a token that passes
/// here may still be revoked.
///
/// # Errors
/// Returns `InvalidCredentials` on any signature/format failure
pub fn verify_refresh_token(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.validate_exp = false;
    validation.set_required_spec_claims(&["iss"]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("Refresh token validation error: {}", e);
        AppError::InvalidCredentials
    })
}
