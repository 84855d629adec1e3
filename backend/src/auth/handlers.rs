//! Handler functions for authentication-related API endpoints.
//!
//! These functions process incoming HTTP requests for signup, login, API
//! token management, role inheritance, and impersonation, parse request
//! data, and delegate to the service layer for business logic.

use crate::api::common::{ApiResponse, service_error_to_http};
use crate::auth::middleware::Identity;
use crate::auth::models::*;
use crate::auth::service::AuthService;
use crate::config::Config;
use crate::errors::ServiceError;
use crate::repositories::user_repository::UserRepository;
use crate::services::impersonation_service::ImpersonationService;
use crate::services::role_service::RoleInheritanceService;
use crate::services::token_service::ApiTokenService;
use axum::{
    extract::{Extension, Json, Path},
    http::{HeaderMap, StatusCode},
    response::Json as ResponseJson,
};
use sqlx::SqlitePool;

/// Handle user registration request
#[axum::debug_handler]
pub async fn signup(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    Json(payload): Json<SignupRequest>,
) -> Result<ResponseJson<AuthResponse>, (StatusCode, String)> {
    let auth_service = AuthService::new(&pool, &config);

    match auth_service.signup(payload).await {
        Ok(response) => Ok(ResponseJson(response)),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle user login request
#[axum::debug_handler]
pub async fn login(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<ResponseJson<AuthResponse>, (StatusCode, String)> {
    let auth_service = AuthService::new(&pool, &config);
    let ip_address = client_ip(&headers);
    let user_agent = header_value(&headers, "user-agent");

    match auth_service.login(payload, &ip_address, &user_agent).await {
        Ok(response) => Ok(ResponseJson(response)),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle logout request.
///
/// Session tokens are stateless and expire on their own, so logout is an
/// acknowledgement for the client to discard its token.
#[axum::debug_handler]
pub async fn logout(
    Extension(identity): Extension<Identity>,
) -> ResponseJson<ApiResponse<serde_json::Value>> {
    tracing::info!(user_id = %identity.user_id, "user logged out");
    ResponseJson(ApiResponse::success(
        serde_json::json!({}),
        "Logged out successfully",
    ))
}

/// Return the authenticated user's profile
#[axum::debug_handler]
pub async fn me(
    Extension(pool): Extension<SqlitePool>,
    Extension(identity): Extension<Identity>,
) -> Result<ResponseJson<UserInfo>, (StatusCode, String)> {
    let user = match UserRepository::new(&pool)
        .get_user_by_id(&identity.user_id)
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            return Err(service_error_to_http(ServiceError::not_found(
                "User",
                &identity.user_id,
            )));
        }
        Err(error) => return Err(service_error_to_http(error.into())),
    };

    Ok(ResponseJson(user.into()))
}

/// Handle API token creation request
#[axum::debug_handler]
pub async fn create_token(
    Extension(pool): Extension<SqlitePool>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<CreateTokenRequest>,
) -> Result<ResponseJson<CreatedTokenResponse>, (StatusCode, String)> {
    match ApiTokenService::new(&pool)
        .create_token(&identity.user_id, payload)
        .await
    {
        Ok(response) => Ok(ResponseJson(response)),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// List the authenticated user's API tokens
#[axum::debug_handler]
pub async fn list_tokens(
    Extension(pool): Extension<SqlitePool>,
    Extension(identity): Extension<Identity>,
) -> Result<ResponseJson<Vec<ApiTokenInfo>>, (StatusCode, String)> {
    match ApiTokenService::new(&pool)
        .list_tokens(&identity.user_id)
        .await
    {
        Ok(tokens) => Ok(ResponseJson(tokens)),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle API token revocation request
#[axum::debug_handler]
pub async fn revoke_token(
    Extension(pool): Extension<SqlitePool>,
    Extension(identity): Extension<Identity>,
    Path(token_id): Path<String>,
) -> Result<ResponseJson<ApiResponse<serde_json::Value>>, (StatusCode, String)> {
    match ApiTokenService::new(&pool)
        .revoke_token(&identity.user_id, &token_id)
        .await
    {
        Ok(()) => Ok(ResponseJson(ApiResponse::success(
            serde_json::json!({ "id": token_id }),
            "API token revoked",
        ))),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle role switch (privilege downgrade) request
#[axum::debug_handler]
pub async fn switch_role(
    Extension(pool): Extension<SqlitePool>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<SwitchRoleRequest>,
) -> Result<ResponseJson<RoleInheritanceInfo>, (StatusCode, String)> {
    match RoleInheritanceService::new(&pool)
        .switch_role(&identity.user_id, payload.target_role, payload.expires_in_hours)
        .await
    {
        Ok(record) => Ok(ResponseJson(record.into())),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle return to the stored role
#[axum::debug_handler]
pub async fn return_role(
    Extension(pool): Extension<SqlitePool>,
    Extension(identity): Extension<Identity>,
) -> Result<ResponseJson<RoleInheritanceInfo>, (StatusCode, String)> {
    match RoleInheritanceService::new(&pool)
        .return_role(&identity.user_id)
        .await
    {
        Ok(record) => Ok(ResponseJson(record.into())),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Report the user's stored role, effective role, and switch options
#[axum::debug_handler]
pub async fn role_status(
    Extension(pool): Extension<SqlitePool>,
    Extension(identity): Extension<Identity>,
) -> Result<ResponseJson<RoleStatusResponse>, (StatusCode, String)> {
    let (user, record) = match RoleInheritanceService::new(&pool)
        .role_status(&identity.user_id)
        .await
    {
        Ok(status) => status,
        Err(error) => return Err(service_error_to_http(error)),
    };

    let effective_role = record
        .as_ref()
        .map(|record| record.inherited_role)
        .unwrap_or(user.role);

    Ok(ResponseJson(RoleStatusResponse {
        original_role: user.role,
        effective_role,
        is_inheriting: record.is_some(),
        inheritance: record.map(RoleInheritanceInfo::from),
        available_roles: user.role.roles_below(),
    }))
}

/// Handle impersonation start request
#[axum::debug_handler]
pub async fn impersonate(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<ImpersonateRequest>,
) -> Result<ResponseJson<AuthResponse>, (StatusCode, String)> {
    match ImpersonationService::new(&pool, &config)
        .start_impersonation(&identity, payload)
        .await
    {
        Ok(response) => Ok(ResponseJson(response)),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle impersonation stop request
#[axum::debug_handler]
pub async fn stop_impersonation(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    Extension(identity): Extension<Identity>,
) -> Result<ResponseJson<AuthResponse>, (StatusCode, String)> {
    match ImpersonationService::new(&pool, &config)
        .stop_impersonation(&identity)
        .await
    {
        Ok(response) => Ok(ResponseJson(response)),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Report whether the current session is an impersonation session
#[axum::debug_handler]
pub async fn impersonation_status(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    Extension(identity): Extension<Identity>,
) -> ResponseJson<ImpersonationStatusResponse> {
    ResponseJson(ImpersonationService::new(&pool, &config).impersonation_status(&identity))
}

/// Admin: clear a user's suspension and failed-login counters
#[axum::debug_handler]
pub async fn unlock_account(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<String>,
) -> Result<ResponseJson<UserInfo>, (StatusCode, String)> {
    match AuthService::new(&pool, &config).unlock_account(&user_id).await {
        Ok(user) => {
            tracing::info!(admin_id = %identity.user_id, user_id = %user_id, "account unlocked");
            Ok(ResponseJson(user))
        }
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Admin: list all currently suspended accounts
#[axum::debug_handler]
pub async fn list_suspended(
    Extension(pool): Extension<SqlitePool>,
    Extension(config): Extension<Config>,
) -> Result<ResponseJson<Vec<UserInfo>>, (StatusCode, String)> {
    match AuthService::new(&pool, &config)
        .list_suspended_accounts()
        .await
    {
        Ok(users) => Ok(ResponseJson(users)),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Best-effort client address for the audit trail. Proxied deployments
/// populate x-forwarded-for; otherwise the value is opaque.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.7, 10.0.0.1".parse().unwrap(),
        );
        assert_eq!(client_ip(&headers), "203.0.113.7");

        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
