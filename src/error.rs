/// Application error taxonomy
///
/// Every domain failure is converted into a variant of `AppError` at the
/// point of detection. The actix `ResponseError` impl is the single boundary
/// mapping variants to HTTP status codes; the wire shape is always
/// `{"message": "..."}`. Internal details never leak past that boundary.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

use crate::validators::ValidationError;

/// Database operation errors (always surfaced as 500)
#[derive(Debug)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    QueryExecution(String),
    ConnectionPool(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => {
                write!(f, "Duplicate entry: {}", msg)
            }
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Central error type for all request handling
#[derive(Debug)]
pub enum AppError {
    /// Malformed or missing input (400)
    Validation(ValidationError),
    /// Sign-up with an email that already has an account (400)
    DuplicateEmail,
    /// Wrong email or wrong password, intentionally indistinguishable (400)
    InvalidCredentials,
    /// Unknown account id or mismatched verification token, unified (400)
    InvalidVerification,
    /// Unknown or mismatched password-reset token (400)
    InvalidResetToken,
    /// Password reset with a password equal to the current one (400)
    SamePassword,
    /// Missing resource id (400)
    NotFound(String),
    /// Missing bearer token, or a reused/revoked refresh token (400)
    Unauthorized,
    /// Token that fails signature or format checks (401)
    InvalidToken,
    /// Access token past its expiry, distinct so clients can silently refresh (401)
    SessionExpired,
    Database(DatabaseError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::DuplicateEmail => write!(f, "Email is already in use!"),
            AppError::InvalidCredentials => write!(f, "Email/Password is mismatch!"),
            AppError::InvalidVerification => write!(f, "Invalid verification request!"),
            AppError::InvalidResetToken => write!(f, "Unauthorized request!"),
            AppError::SamePassword => write!(f, "The new password must be different!"),
            AppError::NotFound(what) => write!(f, "{} not found!", what),
            AppError::Unauthorized => write!(f, "Unauthorized request!"),
            AppError::InvalidToken => write!(f, "Unauthorized request!"),
            AppError::SessionExpired => write!(f, "Session expired!"),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let error_msg = err.to_string();

        if error_msg.contains("duplicate key") || error_msg.contains("unique constraint") {
            AppError::Database(DatabaseError::UniqueConstraintViolation(error_msg))
        } else if error_msg.contains("pool") || error_msg.contains("connect") {
            AppError::Database(DatabaseError::ConnectionPool(error_msg))
        } else {
            AppError::Database(DatabaseError::QueryExecution(error_msg))
        }
    }
}

/// Wire shape for every error response
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl AppError {
    /// Message shown to the client; 5xx variants never expose internals.
    fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    fn log(&self) {
        match self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
            }
            AppError::Validation(e) => {
                tracing::warn!(error = %e, "Validation error");
            }
            AppError::Unauthorized | AppError::InvalidToken | AppError::SessionExpired => {
                tracing::warn!(error = %self, "Rejected request token");
            }
            other => {
                tracing::warn!(error = %other, "Request failed");
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::DuplicateEmail
            | AppError::InvalidCredentials
            | AppError::InvalidVerification
            | AppError::InvalidResetToken
            | AppError::SamePassword
            | AppError::NotFound(_)
            | AppError::Unauthorized => StatusCode::BAD_REQUEST,
            AppError::InvalidToken | AppError::SessionExpired => StatusCode::UNAUTHORIZED,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        self.log();
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            message: self.public_message(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_do_not_reveal_which_check_failed() {
        // Unknown email and wrong password must render identically
        assert_eq!(
            AppError::InvalidCredentials.to_string(),
            "Email/Password is mismatch!"
        );
    }

    #[test]
    fn internal_errors_never_leak_details() {
        let err = AppError::Internal("secret connection string".to_string());
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::Database(DatabaseError::QueryExecution("users table".to_string()));
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn session_expiry_is_distinct_from_other_token_failures() {
        assert_eq!(AppError::SessionExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_ne!(
            AppError::SessionExpired.to_string(),
            AppError::InvalidToken.to_string()
        );
    }

    #[test]
    fn sqlx_unique_violation_maps_to_database_error() {
        let err: AppError = sqlx::Error::Protocol("duplicate key value".into()).into();
        match err {
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => (),
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}
