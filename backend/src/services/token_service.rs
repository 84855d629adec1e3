//! Long-lived API token management and verification.
//!
//! API tokens are the machine-credential counterpart to session tokens:
//! persisted, revocable, and verified against storage. The raw token value
//! is surfaced exactly once, at creation.

use crate::api::common::validation_errors_to_message;
use crate::auth::models::{ApiTokenInfo, CreateTokenRequest, CreatedTokenResponse};
use crate::database::models::{ApiToken, CreateApiToken, User};
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::token_repository::TokenRepository;
use crate::repositories::user_repository::UserRepository;
use crate::utils::token::{generate_api_token, token_prefix};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

pub struct ApiTokenService<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ApiTokenService<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a new API token for the user.
    ///
    /// Token names are unique per user. Without `expires_in_hours` the
    /// token never expires.
    pub async fn create_token(
        &self,
        user_id: &str,
        request: CreateTokenRequest,
    ) -> ServiceResult<CreatedTokenResponse> {
        if let Err(errors) = request.validate() {
            return Err(ServiceError::validation(validation_errors_to_message(
                errors,
            )));
        }

        let repo = TokenRepository::new(self.pool);
        if repo.name_exists(user_id, &request.name).await? {
            return Err(ServiceError::already_exists("API token", &request.name));
        }

        let value = generate_api_token();
        let expires_at = request
            .expires_in_hours
            .map(|hours| Utc::now() + Duration::hours(hours));

        let name = request.name;
        let token = repo
            .create_token(CreateApiToken {
                id: Uuid::now_v7().to_string(),
                user_id: user_id.to_string(),
                name: name.clone(),
                description: request.description.unwrap_or_default(),
                token: value.clone(),
                token_prefix: token_prefix(&value),
                expires_at,
            })
            .await
            .map_err(|e| ServiceError::conflict_or_database(e, "API token", name.as_str()))?;

        tracing::info!(
            user_id = %user_id,
            token_id = %token.id,
            token_name = %token.name,
            "API token created"
        );

        Ok(CreatedTokenResponse {
            id: token.id,
            name: token.name,
            description: token.description,
            // Full value returned only on creation.
            token: value,
            token_prefix: token.token_prefix,
            expires_at: token.expires_at,
            created_at: token.created_at,
            is_active: token.is_active,
        })
    }

    /// Lists the user's tokens, newest first, without raw values.
    pub async fn list_tokens(&self, user_id: &str) -> ServiceResult<Vec<ApiTokenInfo>> {
        let tokens = TokenRepository::new(self.pool)
            .get_tokens_by_user_id(user_id)
            .await?;
        Ok(tokens.into_iter().map(ApiTokenInfo::from).collect())
    }

    /// Revokes (deletes) a token owned by the user.
    pub async fn revoke_token(&self, user_id: &str, token_id: &str) -> ServiceResult<()> {
        let deleted = TokenRepository::new(self.pool)
            .delete_token(token_id, user_id)
            .await?;

        if !deleted {
            return Err(ServiceError::not_found("API token", token_id));
        }

        tracing::info!(user_id = %user_id, token_id = %token_id, "API token revoked");
        Ok(())
    }

    /// Resolves a bearer value to its owning user.
    ///
    /// Accepts only active, unexpired tokens; stamps `last_used_at` as a
    /// side effect. The stamp is best-effort: losing it never fails the
    /// authentication.
    pub async fn authenticate(&self, value: &str) -> ServiceResult<(User, ApiToken)> {
        let repo = TokenRepository::new(self.pool);
        let token = repo
            .get_active_token_by_value(value)
            .await?
            .ok_or_else(|| ServiceError::unauthenticated("invalid or expired API token"))?;

        let now = Utc::now();
        if token.is_expired(now) {
            return Err(ServiceError::unauthenticated("invalid or expired API token"));
        }

        let user = UserRepository::new(self.pool)
            .get_user_by_id(&token.user_id)
            .await?
            .ok_or_else(|| ServiceError::unauthenticated("invalid or expired API token"))?;

        if let Err(e) = repo.touch_last_used(&token.id, now).await {
            tracing::warn!(token_id = %token.id, "failed to update token last_used_at: {}", e);
        }

        Ok((user, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{CreateUser, Role};
    use crate::database::test_pool;

    async fn seed_user(pool: &SqlitePool, username: &str) -> User {
        UserRepository::new(pool)
            .create_user(CreateUser {
                id: Uuid::now_v7().to_string(),
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: "x".to_string(),
                role: Role::User,
            })
            .await
            .unwrap()
    }

    fn token_request(name: &str, expires_in_hours: Option<i64>) -> CreateTokenRequest {
        CreateTokenRequest {
            name: name.to_string(),
            description: Some("ci token".to_string()),
            expires_in_hours,
        }
    }

    #[tokio::test]
    async fn test_create_list_revoke() {
        let pool = test_pool().await;
        let service = ApiTokenService::new(&pool);
        let user = seed_user(&pool, "heidi").await;

        let created = service
            .create_token(&user.id, token_request("deploy", Some(48)))
            .await
            .unwrap();
        assert!(created.token.starts_with("pm_"));
        assert!(created.expires_at.is_some());
        assert!(created.is_active);

        let listed = service.list_tokens(&user.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "deploy");
        // Listing exposes only the truncated prefix, never the raw value.
        assert!(listed[0].token_prefix.ends_with("..."));
        assert_eq!(
            serde_json::to_value(&listed[0]).unwrap().get("token"),
            None
        );

        service.revoke_token(&user.id, &created.id).await.unwrap();
        assert!(service.list_tokens(&user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let pool = test_pool().await;
        let service = ApiTokenService::new(&pool);
        let user = seed_user(&pool, "ivan").await;

        service
            .create_token(&user.id, token_request("deploy", None))
            .await
            .unwrap();
        let err = service
            .create_token(&user.id, token_request("deploy", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_name_insert_maps_to_already_exists() {
        let pool = test_pool().await;
        let user = seed_user(&pool, "trent").await;
        let repo = TokenRepository::new(&pool);

        let make = |id: &str| CreateApiToken {
            id: id.to_string(),
            user_id: user.id.clone(),
            name: "deploy".to_string(),
            description: String::new(),
            token: format!("pm_{}", id),
            token_prefix: "pm_...".to_string(),
            expires_at: None,
        };
        repo.create_token(make("t-1")).await.unwrap();

        // Same owner and name with a distinct token value violates the
        // per-user name constraint; must map to a conflict, not a 500.
        let err = repo.create_token(make("t-2")).await.unwrap_err();
        let mapped = ServiceError::conflict_or_database(err, "API token", "deploy");
        assert!(matches!(mapped, ServiceError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_revoke_foreign_token_is_not_found() {
        let pool = test_pool().await;
        let service = ApiTokenService::new(&pool);
        let owner = seed_user(&pool, "judy").await;
        let other = seed_user(&pool, "mallory").await;

        let created = service
            .create_token(&owner.id, token_request("deploy", None))
            .await
            .unwrap();

        let err = service.revoke_token(&other.id, &created.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
        // The owner still sees the token.
        assert_eq!(service.list_tokens(&owner.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_authenticate_updates_last_used() {
        let pool = test_pool().await;
        let service = ApiTokenService::new(&pool);
        let user = seed_user(&pool, "niaj").await;

        let created = service
            .create_token(&user.id, token_request("agent", None))
            .await
            .unwrap();

        let (resolved, token) = service.authenticate(&created.token).await.unwrap();
        assert_eq!(resolved.id, user.id);
        assert_eq!(token.id, created.id);

        let listed = service.list_tokens(&user.id).await.unwrap();
        assert!(listed[0].last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_authenticate_rejects_expired_and_unknown() {
        let pool = test_pool().await;
        let service = ApiTokenService::new(&pool);
        let user = seed_user(&pool, "olivia").await;

        let created = service
            .create_token(&user.id, token_request("stale", Some(1)))
            .await
            .unwrap();
        // Backdate the expiry.
        sqlx::query("UPDATE api_tokens SET expires_at = ? WHERE id = ?")
            .bind(Utc::now() - Duration::hours(1))
            .bind(&created.id)
            .execute(&pool)
            .await
            .unwrap();

        let err = service.authenticate(&created.token).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated { .. }));

        let err = service.authenticate("pm_nonsense").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated { .. }));
    }
}
