/// Credential store: persisted account records.
///
/// Passwords are hashed on write, inside `create` and `update_password` — the
/// hashing contract lives here, not in an implicit hook, and no function in
/// this module ever returns or stores a plaintext password. The refresh-token
/// set lives in `auth::refresh_tokens`.

use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::hash_password;
use crate::error::AppError;

/// Full account record; never serialized to a response
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub verified: bool,
    pub avatar_url: Option<String>,
    pub avatar_id: Option<String>,
}

/// Public projection of an account: what handlers may return and what the
/// auth gate attaches to a request. No password hash, no token set.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub verified: bool,
    pub avatar: Option<String>,
}

impl User {
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            verified: self.verified,
            avatar: self.avatar_url.clone(),
        }
    }
}

type UserRow = (
    Uuid,
    String,
    String,
    String,
    bool,
    Option<String>,
    Option<String>,
);

fn from_row(row: UserRow) -> User {
    User {
        id: row.0,
        email: row.1,
        name: row.2,
        password_hash: row.3,
        verified: row.4,
        avatar_url: row.5,
        avatar_id: row.6,
    }
}

const USER_COLUMNS: &str = "id, email, name, password_hash, verified, avatar_url, avatar_id";

/// Create an unverified account, hashing the password on write
///
/// A unique violation on the email column is reported as `DuplicateEmail`,
/// so two concurrent sign-ups race safely: the loser gets the same 400 a
/// pre-checked duplicate would.
///
/// # Errors
/// Returns error if the password fails strength validation, the email is
/// already registered, or the insert fails
pub async fn create(
    pool: &PgPool,
    email: &str,
    name: &str,
    password: &str,
) -> Result<Uuid, AppError> {
    let password_hash = hash_password(password)?;
    let user_id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, password_hash, verified, created_at, updated_at)
        VALUES ($1, $2, $3, $4, FALSE, $5, $6)
        "#,
    )
    .bind(user_id)
    .bind(email)
    .bind(name)
    .bind(&password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.constraint() == Some("users_email_key") => {
            AppError::DuplicateEmail
        }
        _ => AppError::from(e),
    })?;

    Ok(user_id)
}

/// # Errors
/// Returns error if the query fails
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM users WHERE email = $1",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(from_row))
}

/// # Errors
/// Returns error if the query fails
pub async fn find_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM users WHERE id = $1",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(from_row))
}

/// # Errors
/// Returns error if the update fails
pub async fn set_verified(pool: &PgPool, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET verified = TRUE, updated_at = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Replace the stored password, hashing the new one on write
///
/// # Errors
/// Returns error if the password fails strength validation or the update fails
pub async fn update_password(pool: &PgPool, user_id: Uuid, password: &str) -> Result<(), AppError> {
    let password_hash = hash_password(password)?;

    sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
        .bind(&password_hash)
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// # Errors
/// Returns error if the update fails
pub async fn update_name(pool: &PgPool, user_id: Uuid, name: &str) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET name = $1, updated_at = $2 WHERE id = $3")
        .bind(name)
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// # Errors
/// Returns error if the update fails
pub async fn update_avatar(
    pool: &PgPool,
    user_id: Uuid,
    url: &str,
    blob_id: &str,
) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET avatar_url = $1, avatar_id = $2, updated_at = $3 WHERE id = $4")
        .bind(url)
        .bind(blob_id)
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_projection_never_contains_the_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "seller@example.com".to_string(),
            name: "Seller".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            verified: true,
            avatar_url: Some("https://blobs.example.com/a.jpg".to_string()),
            avatar_id: Some("blob-1".to_string()),
        };

        let json = serde_json::to_value(user.profile()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("avatar_id").is_none());
        assert_eq!(json["email"], "seller@example.com");
        assert_eq!(json["verified"], true);
        assert_eq!(json["avatar"], "https://blobs.example.com/a.jpg");
    }
}
