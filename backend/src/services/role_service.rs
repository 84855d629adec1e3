//! Time-boxed role inheritance (privilege downgrade).
//!
//! A user may temporarily operate under a role with strictly fewer
//! privileges than their stored role, and return to the real role at any
//! time. Expiry is lazy: there is no background sweeper, so every read
//! path that needs the effective role performs the expiry check itself.

use crate::database::models::{CreateRoleInheritance, Role, RoleInheritance, User};
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::inheritance_repository::InheritanceRepository;
use crate::repositories::user_repository::UserRepository;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

pub struct RoleInheritanceService<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RoleInheritanceService<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Switches the user to a strictly lower-privilege role.
    ///
    /// Any prior active record is deactivated first, so at most one record
    /// is active per user. With `expires_in_hours` absent the inheritance
    /// lasts until an explicit return.
    pub async fn switch_role(
        &self,
        user_id: &str,
        target_role: Role,
        expires_in_hours: Option<i64>,
    ) -> ServiceResult<RoleInheritance> {
        let user = self.get_user_required(user_id).await?;

        if target_role >= user.role {
            return Err(ServiceError::invalid_inheritance(format!(
                "target role '{}' is not below your role '{}'",
                target_role, user.role
            )));
        }

        let expires_at = match expires_in_hours {
            Some(hours) if hours > 0 => Some(Utc::now() + Duration::hours(hours)),
            Some(_) => {
                return Err(ServiceError::validation(
                    "expires_in_hours must be positive",
                ));
            }
            None => None,
        };

        let record = InheritanceRepository::new(self.pool)
            .replace_active(CreateRoleInheritance {
                id: Uuid::now_v7().to_string(),
                user_id: user_id.to_string(),
                original_role: user.role,
                inherited_role: target_role,
                expires_at,
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            original_role = %user.role,
            inherited_role = %target_role,
            "role inheritance started"
        );

        Ok(record)
    }

    /// Ends the active inheritance and restores the stored role.
    pub async fn return_role(&self, user_id: &str) -> ServiceResult<RoleInheritance> {
        let repo = InheritanceRepository::new(self.pool);
        let record = repo
            .get_active_for_user(user_id)
            .await?
            .ok_or(ServiceError::NoActiveInheritance)?;

        repo.deactivate_for_user(user_id).await?;

        if record.is_expired(Utc::now()) {
            // The grant had already lapsed; the stored role was in effect.
            return Err(ServiceError::NoActiveInheritance);
        }

        tracing::info!(user_id = %user_id, "role inheritance returned");
        Ok(record)
    }

    /// The role governing authorization decisions right now.
    pub async fn effective_role(&self, user_id: &str) -> ServiceResult<Role> {
        let user = self.get_user_required(user_id).await?;
        self.effective_role_for(&user).await
    }

    /// Effective-role resolution against an already-loaded user row.
    ///
    /// An active record past its expiry is deactivated here and the stored
    /// role returned (lazy expiry).
    pub async fn effective_role_for(&self, user: &User) -> ServiceResult<Role> {
        match self.active_unexpired(&user.id).await? {
            Some(record) => Ok(record.inherited_role),
            None => Ok(user.role),
        }
    }

    /// Reports the user's stored role, effective role, any active
    /// inheritance, and every role they could still switch to.
    pub async fn role_status(
        &self,
        user_id: &str,
    ) -> ServiceResult<(User, Option<RoleInheritance>)> {
        let user = self.get_user_required(user_id).await?;
        let record = self.active_unexpired(user_id).await?;
        Ok((user, record))
    }

    /// Returns the active, unexpired record for the user, deactivating a
    /// lapsed one on the way.
    async fn active_unexpired(&self, user_id: &str) -> ServiceResult<Option<RoleInheritance>> {
        let repo = InheritanceRepository::new(self.pool);
        let Some(record) = repo.get_active_for_user(user_id).await? else {
            return Ok(None);
        };

        if record.is_expired(Utc::now()) {
            repo.deactivate_for_user(user_id).await?;
            tracing::debug!(user_id = %user_id, "expired role inheritance deactivated");
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn get_user_required(&self, user_id: &str) -> ServiceResult<User> {
        UserRepository::new(self.pool)
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::CreateUser;
    use crate::database::{test_pool, test_pool_concurrent};
    use crate::repositories::inheritance_repository::InheritanceRepository;

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

    #[tokio::test]
    async fn test_switch_role_downgrade_only() {
        let pool = test_pool().await;
        let service = RoleInheritanceService::new(&pool);
        let user = seed_user(&pool, "carol", Role::Localadmin).await;

        // Equal or higher targets are rejected.
        for target in [Role::Localadmin, Role::Sysadmin, Role::Superuser] {
            let err = service.switch_role(&user.id, target, None).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidInheritance { .. }));
        }

        // Strictly lower targets succeed.
        let record = service
            .switch_role(&user.id, Role::User, None)
            .await
            .unwrap();
        assert_eq!(record.original_role, Role::Localadmin);
        assert_eq!(record.inherited_role, Role::User);
        assert!(record.is_active);
        assert!(record.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_single_active_record_after_repeated_switches() {
        let pool = test_pool().await;
        let service = RoleInheritanceService::new(&pool);
        let user = seed_user(&pool, "dave", Role::Superuser).await;

        service.switch_role(&user.id, Role::User, Some(2)).await.unwrap();
        service.switch_role(&user.id, Role::Guest, None).await.unwrap();
        let record = service
            .switch_role(&user.id, Role::Localadmin, Some(5))
            .await
            .unwrap();

        let active = InheritanceRepository::new(&pool)
            .get_active_for_user(&user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, record.id);
        assert_eq!(active.inherited_role, Role::Localadmin);

        // History is preserved: three rows exist, one active.
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM role_inheritance WHERE user_id = ?")
                .bind(&user.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(total, 3);
        let active_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM role_inheritance WHERE user_id = ? AND is_active = 1",
        )
        .bind(&user.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(active_count, 1);
    }

    #[tokio::test]
    async fn test_effective_role_and_return() {
        let pool = test_pool().await;
        let service = RoleInheritanceService::new(&pool);
        let user = seed_user(&pool, "erin", Role::Superuser).await;

        assert_eq!(service.effective_role(&user.id).await.unwrap(), Role::Superuser);

        service
            .switch_role(&user.id, Role::Localadmin, None)
            .await
            .unwrap();
        assert_eq!(
            service.effective_role(&user.id).await.unwrap(),
            Role::Localadmin
        );

        let returned = service.return_role(&user.id).await.unwrap();
        assert_eq!(returned.inherited_role, Role::Localadmin);
        assert_eq!(service.effective_role(&user.id).await.unwrap(), Role::Superuser);

        // Second return finds nothing active.
        let err = service.return_role(&user.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NoActiveInheritance));
    }

    #[tokio::test]
    async fn test_lazy_expiry_on_read() {
        let pool = test_pool().await;
        let service = RoleInheritanceService::new(&pool);
        let user = seed_user(&pool, "frank", Role::Sysadmin).await;

        // Plant a record whose expiry is already in the past.
        InheritanceRepository::new(&pool)
            .create_record(CreateRoleInheritance {
                id: Uuid::now_v7().to_string(),
                user_id: user.id.clone(),
                original_role: Role::Sysadmin,
                inherited_role: Role::Guest,
                expires_at: Some(Utc::now() - Duration::minutes(5)),
            })
            .await
            .unwrap();

        // No explicit return happened, but the stored role governs.
        assert_eq!(service.effective_role(&user.id).await.unwrap(), Role::Sysadmin);

        // And the read deactivated the lapsed record.
        let active = InheritanceRepository::new(&pool)
            .get_active_for_user(&user.id)
            .await
            .unwrap();
        assert!(active.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_switches_leave_one_active() {
        let pool = test_pool_concurrent(8).await;
        let user = seed_user(&pool, "henry", Role::Superuser).await;

        for round in 0..50 {
            let spawn_switch = |target: Role| {
                let pool = pool.clone();
                let user_id = user.id.clone();
                tokio::spawn(async move {
                    RoleInheritanceService::new(&pool)
                        .switch_role(&user_id, target, None)
                        .await
                })
            };

            let (a, b) = tokio::join!(spawn_switch(Role::User), spawn_switch(Role::Guest));
            a.unwrap().unwrap();
            b.unwrap().unwrap();

            let active: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM role_inheritance WHERE user_id = ? AND is_active = 1",
            )
            .bind(&user.id)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert_eq!(
                active, 1,
                "round {}: expected exactly one active record after two concurrent switches",
                round
            );
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn test_role_status_reports_available_roles() {
        let pool = test_pool().await;
        let service = RoleInheritanceService::new(&pool);
        let user = seed_user(&pool, "grace", Role::Superuser).await;

        service
            .switch_role(&user.id, Role::Localadmin, Some(24))
            .await
            .unwrap();

        let (status_user, record) = service.role_status(&user.id).await.unwrap();
        assert_eq!(status_user.role, Role::Superuser);
        let record = record.unwrap();
        assert_eq!(record.inherited_role, Role::Localadmin);
        assert!(record.expires_at.is_some());
        assert_eq!(
            status_user.role.roles_below(),
            vec![Role::Guest, Role::User, Role::Localadmin, Role::Sysadmin]
        );
    }
}
