//! Core business logic for the authentication system.
//!
//! The login guard: credential verification wrapped in brute-force
//! protection and an audit trail. Five consecutive failures suspend the
//! account for 24 hours; a successful login resets the counters. Lockout
//! state transitions are persisted before the error response is produced,
//! so a crash after the response cannot lose an increment.

use crate::api::common::validation_errors_to_message;
use crate::auth::models::{AuthResponse, LoginRequest, SignupRequest, UserInfo};
use crate::config::Config;
use crate::database::models::{CreateLoginAttempt, CreateUser, Role, User};
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::login_attempt_repository::LoginAttemptRepository;
use crate::repositories::user_repository::UserRepository;
use crate::services::role_service::RoleInheritanceService;
use crate::utils::jwt::JwtUtils;
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

/// Consecutive failures that trigger a suspension.
const MAX_FAILED_LOGINS: i64 = 5;
/// Length of the automatic suspension window.
const SUSPENSION_HOURS: i64 = 24;
const DEFAULT_SUSPENSION_REASON: &str = "Too many failed login attempts";

/// Authentication service for signup, login, and lockout management.
pub struct AuthService<'a> {
    pool: &'a SqlitePool,
    jwt_utils: JwtUtils,
}

impl<'a> AuthService<'a> {
    /// Create a new AuthService instance.
    pub fn new(pool: &'a SqlitePool, config: &Config) -> Self {
        AuthService {
            pool,
            jwt_utils: JwtUtils::new(config),
        }
    }

    /// Registers a new user and logs them in.
    pub async fn signup(&self, request: SignupRequest) -> ServiceResult<AuthResponse> {
        validate_request(&request)?;

        let repo = UserRepository::new(self.pool);
        if repo
            .username_or_email_exists(&request.username, &request.email)
            .await?
        {
            return Err(ServiceError::already_exists("User", &request.username));
        }

        let password_hash = hash_password(&request.password)?;
        let username = request.username;
        let user = repo
            .create_user(CreateUser {
                id: Uuid::now_v7().to_string(),
                username: username.clone(),
                email: request.email,
                password_hash,
                role: request.role.unwrap_or(Role::User),
            })
            .await
            .map_err(|e| ServiceError::conflict_or_database(e, "User", username.as_str()))?;

        tracing::info!(user_id = %user.id, username = %user.username, "user created");

        let session_token = self.jwt_utils.generate_session_token(&user, user.role)?;
        Ok(AuthResponse {
            user: user.into(),
            session_token,
        })
    }

    /// Authenticates a user and issues a session token.
    ///
    /// The algorithm follows a strict order: unknown username, active
    /// suspension (password is never checked on a suspended account),
    /// password verification with counter increment on mismatch, and only
    /// then token issuance. Credential failures are indistinguishable from
    /// unknown usernames.
    pub async fn login(
        &self,
        request: LoginRequest,
        ip_address: &str,
        user_agent: &str,
    ) -> ServiceResult<AuthResponse> {
        validate_request(&request)?;

        let repo = UserRepository::new(self.pool);
        let now = Utc::now();

        let Some(mut user) = repo.get_user_by_username(&request.username).await? else {
            self.audit(None, &request.username, ip_address, user_agent, false)
                .await;
            return Err(ServiceError::InvalidCredentials);
        };

        if user.is_suspended(now) {
            return Err(ServiceError::AccountSuspended {
                suspended_until: user.suspended_until.unwrap_or(now),
                reason: user
                    .suspension_reason
                    .unwrap_or_else(|| DEFAULT_SUSPENSION_REASON.to_string()),
            });
        }

        if !verify_password(&request.password, &user.password_hash)? {
            // Increment before responding so a crash cannot lose it.
            let failed_count = repo.record_failed_login(&user.id, now).await?;
            self.audit(
                Some(&user.id),
                &request.username,
                ip_address,
                user_agent,
                false,
            )
            .await;

            if failed_count >= MAX_FAILED_LOGINS {
                let suspended_until = now + Duration::hours(SUSPENSION_HOURS);
                repo.suspend_user(&user.id, suspended_until, DEFAULT_SUSPENSION_REASON)
                    .await?;
                tracing::warn!(
                    user_id = %user.id,
                    username = %user.username,
                    failed_count,
                    "account suspended after repeated failed logins"
                );
                return Err(ServiceError::AccountSuspended {
                    suspended_until,
                    reason: DEFAULT_SUSPENSION_REASON.to_string(),
                });
            }

            return Err(ServiceError::InvalidCredentials);
        }

        repo.clear_lockout(&user.id).await?;
        user.failed_login_count = 0;
        user.last_failed_login = None;
        user.suspended_until = None;
        user.suspension_reason = None;

        self.audit(
            Some(&user.id),
            &request.username,
            ip_address,
            user_agent,
            true,
        )
        .await;

        let effective_role = RoleInheritanceService::new(self.pool)
            .effective_role_for(&user)
            .await?;
        let session_token = self
            .jwt_utils
            .generate_session_token(&user, effective_role)?;

        tracing::info!(user_id = %user.id, username = %user.username, "user authenticated");

        Ok(AuthResponse {
            user: user.into(),
            session_token,
        })
    }

    /// Admin operation: clears all suspension and lockout fields.
    pub async fn unlock_account(&self, target_user_id: &str) -> ServiceResult<UserInfo> {
        let repo = UserRepository::new(self.pool);
        let mut user = repo
            .get_user_by_id(target_user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", target_user_id))?;

        if !user.is_suspended(Utc::now()) {
            return Err(ServiceError::NotSuspended);
        }

        repo.clear_lockout(&user.id).await?;
        user.failed_login_count = 0;
        user.last_failed_login = None;
        user.suspended_until = None;
        user.suspension_reason = None;

        tracing::info!(user_id = %user.id, "account unlocked by admin");
        Ok(user.into())
    }

    /// Admin operation: every account with an active suspension window.
    pub async fn list_suspended_accounts(&self) -> ServiceResult<Vec<UserInfo>> {
        let now = Utc::now();
        let users = UserRepository::new(self.pool)
            .get_users_with_suspension()
            .await?;

        Ok(users
            .into_iter()
            .filter(|user| user.is_suspended(now))
            .map(UserInfo::from)
            .collect())
    }

    /// Best-effort audit write: a lost audit row must never block or fail
    /// the login response.
    async fn audit(
        &self,
        user_id: Option<&str>,
        username: &str,
        ip_address: &str,
        user_agent: &str,
        success: bool,
    ) {
        let result = LoginAttemptRepository::new(self.pool)
            .record_attempt(CreateLoginAttempt {
                user_id: user_id.map(String::from),
                username: username.to_string(),
                ip_address: ip_address.to_string(),
                user_agent: user_agent.to_string(),
                success,
            })
            .await;

        if let Err(e) = result {
            tracing::warn!(username = %username, "failed to record login attempt: {}", e);
        }
    }
}

fn hash_password(password: &str) -> ServiceResult<String> {
    hash(password, DEFAULT_COST)
        .map_err(|e| ServiceError::internal_error(format!("Password hashing failed: {}", e)))
}

fn verify_password(password: &str, stored_hash: &str) -> ServiceResult<bool> {
    verify(password, stored_hash)
        .map_err(|e| ServiceError::internal_error(format!("Password verification failed: {}", e)))
}

fn validate_request<T: Validate>(request: &T) -> ServiceResult<()> {
    request
        .validate()
        .map_err(|errors| ServiceError::validation(validation_errors_to_message(errors)))
}
