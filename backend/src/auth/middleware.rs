//! Middleware for protecting authenticated routes and handling authorization.
//!
//! The request authenticator turns a bearer credential into an `Identity`
//! attached to the request. Verification is two-tier: a cheap JWT check
//! first (no I/O), then a storage lookup for opaque API tokens. One
//! Authorization header therefore supports both short-lived sessions and
//! long-lived machine tokens transparently.

use crate::config::Config;
use crate::database::models::{ApiToken, Role, User};
use crate::services::token_service::ApiTokenService;
use crate::utils::jwt::{Claims, JwtUtils};
use axum::{
    extract::Request,
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use sqlx::SqlitePool;

/// Which credential path authenticated the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Session,
    Api,
}

/// Authenticated identity attached to every protected request.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    /// Effective role governing authorization decisions.
    pub role: Role,
    pub token_type: TokenType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_role: Option<Role>,
    pub impersonating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_username: Option<String>,
}

impl Identity {
    fn from_claims(claims: Claims) -> Self {
        let impersonating = claims.is_impersonating();
        Identity {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
            token_type: TokenType::Session,
            original_role: claims.original_role,
            impersonating,
            original_user_id: claims.original_user_id,
            original_username: claims.original_username,
        }
    }

    fn from_api_token(user: User, _token: ApiToken) -> Self {
        Identity {
            user_id: user.id,
            username: user.username,
            role: user.role,
            token_type: TokenType::Api,
            original_role: None,
            impersonating: false,
            original_user_id: None,
            original_username: None,
        }
    }
}

/// Bearer authentication middleware.
///
/// Tries session-token verification first; falls back to an API token
/// lookup when the bearer value is not a valid JWT. Rejects the request
/// with 401 when neither path succeeds.
pub async fn require_auth(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !auth_header.starts_with("Bearer ") {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let bearer = auth_header[7..].to_string();

    let config = request
        .extensions()
        .get::<Config>()
        .cloned()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    let pool = request
        .extensions()
        .get::<SqlitePool>()
        .cloned()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    let identity = authenticate_bearer(&pool, &config, &bearer)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Resolves a bearer value to an identity via either credential path.
pub async fn authenticate_bearer(
    pool: &SqlitePool,
    config: &Config,
    bearer: &str,
) -> Result<Identity, crate::errors::ServiceError> {
    let jwt_utils = JwtUtils::new(config);
    match jwt_utils.validate_token(bearer) {
        Ok(claims) => Ok(Identity::from_claims(claims)),
        Err(_) => {
            let (user, token) = ApiTokenService::new(pool).authenticate(bearer).await?;
            Ok(Identity::from_api_token(user, token))
        }
    }
}

/// Admin-tier authorization middleware. Must run after `require_auth`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, StatusCode> {
    let identity = request
        .extensions()
        .get::<Identity>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !identity.role.is_admin_tier() {
        tracing::warn!(
            user_id = %identity.user_id,
            role = %identity.role,
            "admin endpoint denied for non-admin identity"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}
