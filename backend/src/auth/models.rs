//! Data structures for authentication-related entities.
//!
//! This module defines the request/response models for login, signup,
//! API token management, role inheritance, and impersonation. These are
//! API-facing DTOs; the storage-level structs live in `database::models`.

use crate::database::models::{ApiToken, Role, RoleInheritance, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Login request payload
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Signup request payload. Role is optional and defaults to `user`.
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,

    #[validate(
        email(message = "Must be a valid email"),
        length(max = 255, message = "Email too long")
    )]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    pub role: Option<Role>,
}

/// User information returned from auth endpoints. Never carries the
/// password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub suspended_until: Option<DateTime<Utc>>,
    pub suspension_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            suspended_until: user.suspended_until,
            suspension_reason: user.suspension_reason,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Login/signup response containing the session token and user info
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserInfo,
    pub session_token: String,
}

/// API token creation request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTokenRequest {
    #[validate(length(min = 1, max = 100, message = "Token name must be 1-100 characters"))]
    pub name: String,

    pub description: Option<String>,

    /// Hours until expiry. Absent means the token never expires.
    #[validate(range(min = 1, message = "expires_in_hours must be positive"))]
    pub expires_in_hours: Option<i64>,
}

/// Response returned once at token creation; the only time the raw token
/// value is ever surfaced.
#[derive(Debug, Serialize)]
pub struct CreatedTokenResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub token: String,
    pub token_prefix: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

/// API token listing entry. The raw token value is deliberately absent.
#[derive(Debug, Serialize)]
pub struct ApiTokenInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub token_prefix: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl From<ApiToken> for ApiTokenInfo {
    fn from(token: ApiToken) -> Self {
        Self {
            id: token.id,
            name: token.name,
            description: token.description,
            token_prefix: token.token_prefix,
            expires_at: token.expires_at,
            last_used_at: token.last_used_at,
            created_at: token.created_at,
            is_active: token.is_active,
        }
    }
}

/// Role switch (privilege downgrade) request
#[derive(Debug, Deserialize, Validate)]
pub struct SwitchRoleRequest {
    pub target_role: Role,

    /// Hours until the inheritance expires. Absent means no expiry.
    #[validate(range(min = 1, message = "expires_in_hours must be positive"))]
    pub expires_in_hours: Option<i64>,
}

/// Active inheritance details surfaced in role status
#[derive(Debug, Clone, Serialize)]
pub struct RoleInheritanceInfo {
    pub original_role: Role,
    pub inherited_role: Role,
    pub expires_at: Option<DateTime<Utc>>,
    pub inherited_at: DateTime<Utc>,
}

impl From<RoleInheritance> for RoleInheritanceInfo {
    fn from(record: RoleInheritance) -> Self {
        Self {
            original_role: record.original_role,
            inherited_role: record.inherited_role,
            expires_at: record.expires_at,
            inherited_at: record.inherited_at,
        }
    }
}

/// Current role situation for a user
#[derive(Debug, Serialize)]
pub struct RoleStatusResponse {
    pub original_role: Role,
    pub effective_role: Role,
    pub is_inheriting: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inheritance: Option<RoleInheritanceInfo>,
    pub available_roles: Vec<Role>,
}

/// Impersonation request: target by id or by username
#[derive(Debug, Deserialize)]
pub struct ImpersonateRequest {
    pub user_id: Option<String>,
    pub username: Option<String>,
}

/// Pure read of the current token's impersonation claims
#[derive(Debug, Serialize)]
pub struct ImpersonationStatusResponse {
    pub impersonating: bool,
    pub user_id: String,
    pub username: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_role: Option<Role>,
}
