//! Rust structs that represent database table mappings.
//!
//! These models define the structure of data as it is stored in and retrieved
//! from the database. Note that these may differ from API-specific models;
//! password hashes and raw token values are never serialized out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Ordered role hierarchy, ascending privilege.
///
/// This is the single source of truth for the privilege order consumed by
/// both the login flow's effective-role computation and the role-inheritance
/// downgrade check. Derived `Ord` follows declaration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Guest,
    User,
    Localadmin,
    Sysadmin,
    Superuser,
}

impl Role {
    /// All roles in ascending privilege order.
    pub const ALL: [Role; 5] = [
        Role::Guest,
        Role::User,
        Role::Localadmin,
        Role::Sysadmin,
        Role::Superuser,
    ];

    /// Numeric privilege level, ascending.
    pub fn level(self) -> u8 {
        match self {
            Role::Guest => 1,
            Role::User => 2,
            Role::Localadmin => 3,
            Role::Sysadmin => 4,
            Role::Superuser => 5,
        }
    }

    /// Admin-tier roles. Accounts at this tier can never be impersonated,
    /// and this tier gates the admin endpoints (unlock, suspended list).
    pub fn is_admin_tier(self) -> bool {
        matches!(self, Role::Localadmin | Role::Sysadmin | Role::Superuser)
    }

    /// Roles allowed to start an impersonation session.
    pub fn can_impersonate(self) -> bool {
        matches!(self, Role::Localadmin | Role::Superuser)
    }

    /// Every role strictly below this one, ascending.
    pub fn roles_below(self) -> Vec<Role> {
        Role::ALL.iter().copied().filter(|r| *r < self).collect()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Guest => "guest",
            Role::User => "user",
            Role::Localadmin => "localadmin",
            Role::Sysadmin => "sysadmin",
            Role::Superuser => "superuser",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(Role::Guest),
            "user" => Ok(Role::User),
            "localadmin" => Ok(Role::Localadmin),
            "sysadmin" => Ok(Role::Sysadmin),
            "superuser" => Ok(Role::Superuser),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub failed_login_count: i64,
    pub last_failed_login: Option<DateTime<Utc>>,
    pub suspended_until: Option<DateTime<Utc>>,
    pub suspension_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the account is currently locked out.
    pub fn is_suspended(&self, now: DateTime<Utc>) -> bool {
        self.suspended_until.map_or(false, |until| until > now)
    }
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiToken {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub token_prefix: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ApiToken {
    /// Whether the token has passed its expiry. Tokens without an
    /// `expires_at` never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

#[derive(Debug, Clone)]
pub struct CreateApiToken {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub token: String,
    pub token_prefix: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleInheritance {
    pub id: String,
    pub user_id: String,
    pub original_role: Role,
    pub inherited_role: Role,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub inherited_at: DateTime<Utc>,
}

impl RoleInheritance {
    /// Whether an active record has passed its expiry. Records without an
    /// `expires_at` stay in effect until explicitly returned.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

#[derive(Debug, Clone)]
pub struct CreateRoleInheritance {
    pub id: String,
    pub user_id: String,
    pub original_role: Role,
    pub inherited_role: Role,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoginAttempt {
    pub id: String,
    pub user_id: Option<String>,
    pub username: String,
    pub ip_address: String,
    pub user_agent: String,
    pub success: bool,
    pub attempted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateLoginAttempt {
    pub user_id: Option<String>,
    pub username: String,
    pub ip_address: String,
    pub user_agent: String,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_role_ordering() {
        assert!(Role::Guest < Role::User);
        assert!(Role::User < Role::Localadmin);
        assert!(Role::Localadmin < Role::Sysadmin);
        assert!(Role::Sysadmin < Role::Superuser);
        assert_eq!(Role::Superuser.level(), 5);
        assert_eq!(Role::Guest.level(), 1);
    }

    #[test]
    fn test_roles_below() {
        assert_eq!(
            Role::Superuser.roles_below(),
            vec![Role::Guest, Role::User, Role::Localadmin, Role::Sysadmin]
        );
        assert_eq!(Role::User.roles_below(), vec![Role::Guest]);
        assert!(Role::Guest.roles_below().is_empty());
    }

    #[test]
    fn test_role_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::from_str(&role.to_string()).unwrap(), role);
        }
        assert!(Role::from_str("admin").is_err());
    }

    #[test]
    fn test_admin_tiers() {
        assert!(Role::Localadmin.is_admin_tier());
        assert!(Role::Sysadmin.is_admin_tier());
        assert!(Role::Superuser.is_admin_tier());
        assert!(!Role::User.is_admin_tier());

        assert!(Role::Superuser.can_impersonate());
        assert!(Role::Localadmin.can_impersonate());
        assert!(!Role::Sysadmin.can_impersonate());
        assert!(!Role::User.can_impersonate());
    }
}
