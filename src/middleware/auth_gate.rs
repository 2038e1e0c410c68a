/// Access guard.
///
/// Validates the bearer access token on protected routes, looks the subject
/// up in the credential store, and attaches a sanitized `Profile` projection
/// to the request extensions for downstream handlers. An elapsed expiry is
/// reported as `SessionExpired` (401), distinct from other token failures,
/// so clients can trigger a silent refresh.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use sqlx::PgPool;
use std::rc::Rc;

use crate::auth::verify_access_token;
use crate::configuration::JwtSettings;
use crate::error::AppError;
use crate::users;

pub struct AuthGate {
    jwt_config: JwtSettings,
}

impl AuthGate {
    pub fn new(jwt_config: JwtSettings) -> Self {
        Self { jwt_config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthGateService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthGateService {
            service: Rc::new(service),
            jwt_config: self.jwt_config.clone(),
        }))
    }
}

pub struct AuthGateService<S> {
    service: Rc<S>,
    jwt_config: JwtSettings,
}

impl<S, B> Service<ServiceRequest> for AuthGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let bearer = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string);

        let jwt_config = self.jwt_config.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let token = match bearer {
                Some(token) => token,
                None => {
                    tracing::warn!("Missing or malformed Authorization header");
                    return Err(AppError::Unauthorized.into());
                }
            };

            let claims = verify_access_token(&token, &jwt_config)?;
            let user_id = claims.user_id()?;

            let pool = req
                .app_data::<web::Data<PgPool>>()
                .ok_or_else(|| AppError::Internal("Database pool not configured".to_string()))?;

            // The subject may have been removed since the token was minted
            let user = users::find_by_id(pool.get_ref(), user_id)
                .await?
                .ok_or(AppError::Unauthorized)?;

            tracing::debug!(user_id = %user.id, "Access token validated");
            req.extensions_mut().insert(user.profile());

            service.call(req).await
        })
    }
}
