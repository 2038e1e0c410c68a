/// JWT claims shared by access and refresh tokens.
///
/// Both token kinds carry the subject id only (plus the standard iat/iss
/// fields). Access tokens embed an expiry; refresh tokens do not — their
/// lifetime is controlled entirely by set membership in the credential store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id as UUID string)
    pub sub: String,
    /// Expiration (Unix timestamp); absent on refresh tokens
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exp: Option<i64>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// Claims for a short-lived access token
    pub fn access(user_id: Uuid, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            exp: Some(now + expiry_seconds),
            iat: now,
            iss: issuer,
        }
    }

    /// Claims for a refresh token; no embedded expiry
    pub fn refresh(user_id: Uuid, issuer: String) -> Self {
        Self {
            sub: user_id.to_string(),
            exp: None,
            iat: chrono::Utc::now().timestamp(),
            iss: issuer,
        }
    }

    /// Extract the subject id
    ///
    /// # Errors
    /// Returns error if the subject is not a valid UUID
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::Internal("Invalid user id in token".to_string()))
    }
}
