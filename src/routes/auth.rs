/// Authentication and account lifecycle handlers.
///
/// Sign-up, email verification, sign-in, refresh rotation, sign-out,
/// password reset, and profile/avatar maintenance. Every handler returns
/// `Result<HttpResponse, AppError>`; the error type maps to the wire at one
/// boundary. Mail dispatch is consistently detached: a delivery failure is
/// logged but never blocks the response.

use actix_web::{http::header::CONTENT_TYPE, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::ephemeral_token::{self, TokenKind};
use crate::auth::refresh_tokens;
use crate::auth::{
    issue_access_token, issue_refresh_token, verify_password, verify_refresh_token,
};
use crate::blob_client::{BlobClient, AVATAR_TRANSFORM};
use crate::configuration::{JwtSettings, LinkSettings};
use crate::email_client::{dispatch, EmailClient};
use crate::error::AppError;
use crate::middleware::ensure_valid_reset_token;
use crate::users::{self, Profile};
use crate::validators::{is_valid_email, is_valid_name};

#[derive(Deserialize)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// `{id, token}` pair carried by mailed verification and reset links
#[derive(Deserialize)]
pub struct VerifyTokenRequest {
    pub id: Uuid,
    pub token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct ForgetPassRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPassRequest {
    pub id: Uuid,
    pub token: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Serialize)]
pub struct SignInResponse {
    pub profile: Profile,
    pub tokens: TokenPair,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub tokens: TokenPair,
}

/// POST /auth/sign-up
///
/// Creates an unverified account and mails a verification link. No session
/// is issued; the user signs in after verifying.
///
/// # Errors
/// - 400: invalid name/email/password, or email already registered
pub async fn sign_up(
    form: web::Json<SignUpRequest>,
    pool: web::Data<PgPool>,
    links: web::Data<LinkSettings>,
    mailer: web::Data<EmailClient>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;
    let name = is_valid_name(&form.name)?;

    if users::find_by_email(pool.get_ref(), &email).await?.is_some() {
        return Err(AppError::DuplicateEmail);
    }

    let user_id = users::create(pool.get_ref(), &email, &name, &form.password).await?;

    let token = ephemeral_token::issue(pool.get_ref(), user_id, TokenKind::Verification).await?;
    let link = format!("{}?id={}&token={}", links.verification, user_id, token);

    let mailer = mailer.get_ref().clone();
    dispatch(async move { mailer.send_verification_link(&email, &link).await });

    tracing::info!(user_id = %user_id, "New account created");

    Ok(HttpResponse::Ok().json(MessageResponse::new("Please check your inbox")))
}

/// POST /auth/verify-email
///
/// Consumes the mailed verification token and marks the account verified.
/// An unknown id and a mismatched token are indistinguishable to the caller.
///
/// # Errors
/// - 400: absent, expired, or mismatched verification token
pub async fn verify_email(
    form: web::Json<VerifyTokenRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let valid =
        ephemeral_token::check(pool.get_ref(), form.id, TokenKind::Verification, &form.token)
            .await?;
    if !valid {
        return Err(AppError::InvalidVerification);
    }

    users::set_verified(pool.get_ref(), form.id).await?;
    ephemeral_token::delete(pool.get_ref(), form.id, TokenKind::Verification).await?;

    tracing::info!(user_id = %form.id, "Email verified");

    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "Thank you for joining us, your email is verified!",
    )))
}

/// POST /auth/sign-in
///
/// Issues an access/refresh pair and adds the refresh token to the account's
/// set. Unknown email and wrong password return the identical error.
///
/// # Errors
/// - 400: invalid credentials
pub async fn sign_in(
    form: web::Json<SignInRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email).map_err(|_| AppError::InvalidCredentials)?;

    let user = users::find_by_email(pool.get_ref(), &email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&form.password, &user.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    let access = issue_access_token(user.id, jwt_config.get_ref())?;
    let refresh = issue_refresh_token(user.id, jwt_config.get_ref())?;
    refresh_tokens::add(pool.get_ref(), user.id, &refresh).await?;

    tracing::info!(user_id = %user.id, "User signed in");

    Ok(HttpResponse::Ok().json(SignInResponse {
        profile: user.profile(),
        tokens: TokenPair { access, refresh },
    }))
}

/// GET /auth/profile [access token required]
///
/// Returns the sanitized projection attached by the auth gate.
pub async fn profile(profile: web::ReqData<Profile>) -> HttpResponse {
    HttpResponse::Ok().json(profile.into_inner())
}

#[derive(Serialize)]
struct PublicProfile {
    id: Uuid,
    name: String,
    avatar: Option<String>,
}

/// GET /auth/profile/{id} [access token required]
///
/// Public projection of another account: id, name, avatar only.
///
/// # Errors
/// - 400: no account with that id
pub async fn public_profile(
    path: web::Path<Uuid>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user = users::find_by_id(pool.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("Profile".to_string()))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "profile": PublicProfile {
            id: user.id,
            name: user.name,
            avatar: user.avatar_url,
        }
    })))
}

/// POST /auth/refresh-token
///
/// Rotates a refresh token: the presented token is atomically replaced by a
/// fresh one, and a new access token is issued alongside. A token that
/// verifies cryptographically but is no longer in the account's set is a
/// compromise signal: the entire set is cleared, forcing re-authentication
/// on every device.
///
/// # Errors
/// - 400: bad signature/format, or reuse of a rotated/revoked token
pub async fn refresh_token(
    form: web::Json<RefreshRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let claims = verify_refresh_token(&form.refresh_token, jwt_config.get_ref())?;
    let user_id = claims.user_id()?;

    let new_refresh = issue_refresh_token(user_id, jwt_config.get_ref())?;
    let rotated = refresh_tokens::rotate(
        pool.get_ref(),
        user_id,
        &form.refresh_token,
        &new_refresh,
    )
    .await?;

    if !rotated {
        refresh_tokens::clear_all(pool.get_ref(), user_id).await?;
        tracing::warn!(user_id = %user_id, "Refresh token reuse detected, session set cleared");
        return Err(AppError::Unauthorized);
    }

    let access = issue_access_token(user_id, jwt_config.get_ref())?;

    tracing::info!(user_id = %user_id, "Refresh token rotated");

    Ok(HttpResponse::Ok().json(RefreshResponse {
        tokens: TokenPair {
            access,
            refresh: new_refresh,
        },
    }))
}

/// POST /auth/sign-out [access token required]
///
/// Removes exactly the presented refresh token from the account's set.
/// Idempotent: a token that is already absent is not an error.
pub async fn sign_out(
    form: web::Json<RefreshRequest>,
    profile: web::ReqData<Profile>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    refresh_tokens::remove(pool.get_ref(), profile.id, &form.refresh_token).await?;

    tracing::info!(user_id = %profile.id, "User signed out");

    Ok(HttpResponse::Ok().finish())
}

/// POST /auth/forget-pass
///
/// Issues a password-reset token (superseding any prior one) and mails the
/// reset link. The response is identical whether or not the email belongs to
/// an account, to avoid an existence oracle.
pub async fn forget_pass(
    form: web::Json<ForgetPassRequest>,
    pool: web::Data<PgPool>,
    links: web::Data<LinkSettings>,
    mailer: web::Data<EmailClient>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;

    match users::find_by_email(pool.get_ref(), &email).await? {
        Some(user) => {
            let token =
                ephemeral_token::issue(pool.get_ref(), user.id, TokenKind::PasswordReset).await?;
            let link = format!("{}?id={}&token={}", links.password_reset, user.id, token);

            let mailer = mailer.get_ref().clone();
            dispatch(async move { mailer.send_password_reset_link(&email, &link).await });
        }
        None => {
            tracing::info!("Password reset requested for unknown email");
        }
    }

    Ok(HttpResponse::Ok().json(MessageResponse::new("Please check your email!")))
}

/// POST /auth/verify-pass-reset-token
///
/// Read-only validity check for a mailed reset link; the token survives for
/// the subsequent reset-pass call.
///
/// # Errors
/// - 400: absent, expired, or mismatched reset token
pub async fn verify_pass_reset_token(
    form: web::Json<VerifyTokenRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    ensure_valid_reset_token(pool.get_ref(), form.id, &form.token).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "valid": true })))
}

/// POST /auth/reset-pass
///
/// Replaces the password behind the reset-token guard. Also revokes every
/// outstanding refresh token for the account, so a stolen session does not
/// survive a password reset. The reset record is deleted only after the
/// update succeeds, keeping the link retryable on failure.
///
/// # Errors
/// - 400: invalid reset token, unknown account, or unchanged password
pub async fn reset_pass(
    form: web::Json<ResetPassRequest>,
    pool: web::Data<PgPool>,
    mailer: web::Data<EmailClient>,
) -> Result<HttpResponse, AppError> {
    ensure_valid_reset_token(pool.get_ref(), form.id, &form.token).await?;

    let user = users::find_by_id(pool.get_ref(), form.id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if verify_password(&form.password, &user.password_hash)? {
        return Err(AppError::SamePassword);
    }

    users::update_password(pool.get_ref(), user.id, &form.password).await?;
    refresh_tokens::clear_all(pool.get_ref(), user.id).await?;
    ephemeral_token::delete(pool.get_ref(), user.id, TokenKind::PasswordReset).await?;

    let email = user.email.clone();
    let mailer = mailer.get_ref().clone();
    dispatch(async move { mailer.send_password_update_notice(&email).await });

    tracing::info!(user_id = %user.id, "Password reset completed");

    Ok(HttpResponse::Ok().json(MessageResponse::new("Password resets successfully")))
}

/// POST /auth/update-profile [access token required]
///
/// # Errors
/// - 400: invalid name
pub async fn update_profile(
    form: web::Json<UpdateProfileRequest>,
    profile: web::ReqData<Profile>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let name = is_valid_name(&form.name)?;

    users::update_name(pool.get_ref(), profile.id, &name).await?;

    let mut updated = profile.into_inner();
    updated.name = name;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "profile": updated })))
}

/// POST /auth/update-avatar [access token required]
///
/// Raw image body, passed through to the blob store with a thumbnail
/// transform. A previous avatar blob is destroyed best-effort first.
///
/// # Errors
/// - 400: body is not an image
pub async fn update_avatar(
    req: HttpRequest,
    body: web::Bytes,
    profile: web::ReqData<Profile>,
    pool: web::Data<PgPool>,
    blob: web::Data<BlobClient>,
) -> Result<HttpResponse, AppError> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !content_type.starts_with("image/") {
        return Err(AppError::Validation(
            crate::validators::ValidationError::InvalidFormat("image file"),
        ));
    }

    let user = users::find_by_id(pool.get_ref(), profile.id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if let Some(old_id) = &user.avatar_id {
        if let Err(e) = blob.destroy(old_id).await {
            tracing::warn!(blob_id = %old_id, error = %e, "Failed to destroy previous avatar");
        }
    }

    let uploaded = blob
        .upload(body.to_vec(), &content_type, AVATAR_TRANSFORM)
        .await?;
    users::update_avatar(pool.get_ref(), user.id, &uploaded.url, &uploaded.id).await?;

    let mut updated = profile.into_inner();
    updated.avatar = Some(uploaded.url);

    Ok(HttpResponse::Ok().json(serde_json::json!({ "profile": updated })))
}
