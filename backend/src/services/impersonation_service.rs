//! Admin impersonation.
//!
//! Lets a `localadmin` or `superuser` act as a specific non-admin user
//! without sharing credentials. The impersonation context lives entirely
//! inside the session token claims: the target's identity and effective
//! role up front, with a back-link to the admin for auditability. It ends
//! when the (2 hour) token expires or stop-impersonation issues a fresh
//! token for the original admin.

use crate::auth::middleware::Identity;
use crate::auth::models::{AuthResponse, ImpersonateRequest, ImpersonationStatusResponse};
use crate::config::Config;
use crate::database::models::User;
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::user_repository::UserRepository;
use crate::services::role_service::RoleInheritanceService;
use crate::utils::jwt::JwtUtils;
use sqlx::SqlitePool;

pub struct ImpersonationService<'a> {
    pool: &'a SqlitePool,
    jwt_utils: JwtUtils,
}

impl<'a> ImpersonationService<'a> {
    pub fn new(pool: &'a SqlitePool, config: &Config) -> Self {
        ImpersonationService {
            pool,
            jwt_utils: JwtUtils::new(config),
        }
    }

    /// Starts impersonating the target user.
    ///
    /// The requester's effective role must be admin-tier with
    /// impersonation rights, and the target must not itself be an
    /// admin-tier account. Privilege-equal-or-above impersonation is
    /// never allowed.
    pub async fn start_impersonation(
        &self,
        requester: &Identity,
        request: ImpersonateRequest,
    ) -> ServiceResult<AuthResponse> {
        if !requester.role.can_impersonate() {
            return Err(ServiceError::forbidden(
                "impersonation requires an admin role",
            ));
        }

        let target = self.resolve_target(&request).await?;

        if target.role.is_admin_tier() {
            return Err(ServiceError::ForbiddenTarget {
                role: target.role.to_string(),
            });
        }

        // The issued token carries the target's effective role, honoring
        // any inheritance the target has active.
        let target_effective_role = RoleInheritanceService::new(self.pool)
            .effective_role_for(&target)
            .await?;

        let session_token = self.jwt_utils.generate_impersonation_token(
            &target,
            target_effective_role,
            &requester.user_id,
            &requester.username,
            requester.role,
        )?;

        tracing::info!(
            admin_id = %requester.user_id,
            target_id = %target.id,
            target_username = %target.username,
            "impersonation started"
        );

        Ok(AuthResponse {
            user: target.into(),
            session_token,
        })
    }

    /// Ends impersonation: loads the original admin and issues a fresh
    /// standard session token with no impersonation claims.
    pub async fn stop_impersonation(&self, identity: &Identity) -> ServiceResult<AuthResponse> {
        if !identity.impersonating {
            return Err(ServiceError::NotImpersonating);
        }
        let original_user_id = identity
            .original_user_id
            .as_deref()
            .ok_or(ServiceError::NotImpersonating)?;

        let admin = UserRepository::new(self.pool)
            .get_user_by_id(original_user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", original_user_id))?;

        let effective_role = RoleInheritanceService::new(self.pool)
            .effective_role_for(&admin)
            .await?;
        let session_token = self
            .jwt_utils
            .generate_session_token(&admin, effective_role)?;

        tracing::info!(admin_id = %admin.id, "impersonation stopped");

        Ok(AuthResponse {
            user: admin.into(),
            session_token,
        })
    }

    /// Pure read of the current token's impersonation claims; never
    /// touches storage.
    pub fn impersonation_status(&self, identity: &Identity) -> ImpersonationStatusResponse {
        ImpersonationStatusResponse {
            impersonating: identity.impersonating,
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            role: identity.role,
            original_user_id: identity.original_user_id.clone(),
            original_username: identity.original_username.clone(),
            original_role: if identity.impersonating {
                identity.original_role
            } else {
                None
            },
        }
    }

    async fn resolve_target(&self, request: &ImpersonateRequest) -> ServiceResult<User> {
        let repo = UserRepository::new(self.pool);

        if let Some(user_id) = request.user_id.as_deref() {
            return repo
                .get_user_by_id(user_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("User", user_id));
        }
        if let Some(username) = request.username.as_deref() {
            return repo
                .get_user_by_username(username)
                .await?
                .ok_or_else(|| ServiceError::not_found("User", username));
        }

        Err(ServiceError::validation(
            "user_id or username is required",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::middleware::TokenType;
    use crate::database::models::{CreateUser, Role};
    use crate::database::test_pool;
    use uuid::Uuid;

    fn test_config() -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout_seconds: 3,
            jwt_secret: "test-secret-key".to_string(),
            server_port: 0,
        }
    }

    async fn seed_user(pool: &SqlitePool, username: &str, role: Role) -> User {
        UserRepository::new(pool)
            .create_user(CreateUser {
                id: Uuid::now_v7().to_string(),
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: "x".to_string(),
                role,
            })
            .await
            .unwrap()
    }

    fn identity_for(user: &User, role: Role) -> Identity {
        Identity {
            user_id: user.id.clone(),
            username: user.username.clone(),
            role,
            token_type: TokenType::Session,
            original_role: Some(user.role),
            impersonating: false,
            original_user_id: None,
            original_username: None,
        }
    }

    fn by_username(username: &str) -> ImpersonateRequest {
        ImpersonateRequest {
            user_id: None,
            username: Some(username.to_string()),
        }
    }

    #[tokio::test]
    async fn test_impersonation_round_trip() {
        let pool = test_pool().await;
        let config = test_config();
        let service = ImpersonationService::new(&pool, &config);

        let admin = seed_user(&pool, "root", Role::Superuser).await;
        let target = seed_user(&pool, "bob", Role::User).await;
        let admin_identity = identity_for(&admin, Role::Superuser);

        let started = service
            .start_impersonation(&admin_identity, by_username("bob"))
            .await
            .unwrap();
        assert_eq!(started.user.id, target.id);

        let claims = JwtUtils::new(&config)
            .validate_token(&started.session_token)
            .unwrap();
        assert_eq!(claims.sub, target.id);
        assert_eq!(claims.role, Role::User);
        assert!(claims.is_impersonating());
        assert_eq!(claims.original_user_id.as_deref(), Some(admin.id.as_str()));
        assert_eq!(claims.original_role, Some(Role::Superuser));

        // Stop from the impersonated identity restores the admin.
        let impersonated = Identity {
            user_id: target.id.clone(),
            username: target.username.clone(),
            role: Role::User,
            token_type: TokenType::Session,
            original_role: Some(Role::Superuser),
            impersonating: true,
            original_user_id: Some(admin.id.clone()),
            original_username: Some(admin.username.clone()),
        };
        let stopped = service.stop_impersonation(&impersonated).await.unwrap();
        assert_eq!(stopped.user.id, admin.id);

        let claims = JwtUtils::new(&config)
            .validate_token(&stopped.session_token)
            .unwrap();
        assert_eq!(claims.role, Role::Superuser);
        assert!(!claims.is_impersonating());
    }

    #[tokio::test]
    async fn test_admin_tier_targets_are_forbidden() {
        let pool = test_pool().await;
        let config = test_config();
        let service = ImpersonationService::new(&pool, &config);

        let admin = seed_user(&pool, "root", Role::Superuser).await;
        let admin_identity = identity_for(&admin, Role::Superuser);

        for (name, role) in [
            ("other-root", Role::Superuser),
            ("sys", Role::Sysadmin),
            ("local", Role::Localadmin),
        ] {
            seed_user(&pool, name, role).await;
            let err = service
                .start_impersonation(&admin_identity, by_username(name))
                .await
                .unwrap_err();
            assert!(
                matches!(err, ServiceError::ForbiddenTarget { .. }),
                "target role {:?} must be forbidden",
                role
            );
        }
    }

    #[tokio::test]
    async fn test_non_admin_requester_is_forbidden() {
        let pool = test_pool().await;
        let config = test_config();
        let service = ImpersonationService::new(&pool, &config);

        seed_user(&pool, "bob", Role::User).await;
        for role in [Role::Guest, Role::User, Role::Sysadmin] {
            let requester = seed_user(&pool, &format!("req-{}", role), role).await;
            let err = service
                .start_impersonation(&identity_for(&requester, role), by_username("bob"))
                .await
                .unwrap_err();
            assert!(
                matches!(err, ServiceError::Forbidden { .. }),
                "requester role {:?} must be forbidden",
                role
            );
        }

        // A superuser currently downgraded to `user` cannot impersonate
        // either: the check runs against the effective role.
        let downgraded = seed_user(&pool, "downgraded", Role::Superuser).await;
        let err = service
            .start_impersonation(&identity_for(&downgraded, Role::User), by_username("bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_target_inheritance_is_honored() {
        let pool = test_pool().await;
        let config = test_config();
        let service = ImpersonationService::new(&pool, &config);

        let admin = seed_user(&pool, "root", Role::Localadmin).await;
        let target = seed_user(&pool, "carol", Role::User).await;
        RoleInheritanceService::new(&pool)
            .switch_role(&target.id, Role::Guest, None)
            .await
            .unwrap();

        let started = service
            .start_impersonation(&identity_for(&admin, Role::Localadmin), by_username("carol"))
            .await
            .unwrap();
        let claims = JwtUtils::new(&config)
            .validate_token(&started.session_token)
            .unwrap();
        assert_eq!(claims.role, Role::Guest);
    }

    #[tokio::test]
    async fn test_missing_target_and_not_impersonating() {
        let pool = test_pool().await;
        let config = test_config();
        let service = ImpersonationService::new(&pool, &config);

        let admin = seed_user(&pool, "root", Role::Superuser).await;
        let identity = identity_for(&admin, Role::Superuser);

        let err = service
            .start_impersonation(&identity, by_username("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));

        let err = service.stop_impersonation(&identity).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotImpersonating));
    }
}
