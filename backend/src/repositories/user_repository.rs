//! Database repository for user records and lockout state.

use crate::database::models::{CreateUser, User};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, failed_login_count, \
     last_failed_login, suspended_until, suspension_reason, created_at, updated_at";

/// Repository for user database operations.
///
/// Handles all persistence for the User entity, including the lockout
/// counters mutated on every login attempt.
pub struct UserRepository<'a> {
    /// Shared SQLite connection pool
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a new user in the database.
    pub async fn create_user(&self, user: CreateUser) -> Result<User> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, username, email, password_hash, role, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        Ok(created)
    }

    /// Retrieves a user by their unique identifier.
    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Retrieves a user by their username.
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Checks whether a username or email is already taken.
    pub async fn username_or_email_exists(&self, username: &str, email: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE username = ? OR email = ?",
        )
        .bind(username)
        .bind(email)
        .fetch_one(self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Atomically increments the failed-login counter and stamps the
    /// failure time. Returns the new count so the caller can decide
    /// whether the suspension threshold was reached. The arithmetic runs
    /// inside the UPDATE so two concurrent failures never under-count.
    pub async fn record_failed_login(&self, id: &str, now: DateTime<Utc>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "UPDATE users \
             SET failed_login_count = failed_login_count + 1, \
                 last_failed_login = ?, updated_at = ? \
             WHERE id = ? \
             RETURNING failed_login_count",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Marks the account suspended until the given time.
    pub async fn suspend_user(
        &self,
        id: &str,
        until: DateTime<Utc>,
        reason: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE users SET suspended_until = ?, suspension_reason = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(until)
        .bind(reason)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Clears every lockout field: failure count, last failure, suspension
    /// window and reason. Used on successful login and on admin unlock.
    pub async fn clear_lockout(&self, id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE users \
             SET failed_login_count = 0, last_failed_login = NULL, \
                 suspended_until = NULL, suspension_reason = NULL, updated_at = ? \
             WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Retrieves all users with a suspension window set. Callers filter
    /// for windows still in the future.
    pub async fn get_users_with_suspension(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE suspended_until IS NOT NULL ORDER BY suspended_until DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Role;
    use crate::database::test_pool_concurrent;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_concurrent_failed_logins_count_every_increment() {
        let pool = test_pool_concurrent(8).await;
        let user = UserRepository::new(&pool)
            .create_user(CreateUser {
                id: Uuid::now_v7().to_string(),
                username: "victor".to_string(),
                email: "victor@example.com".to_string(),
                password_hash: "x".to_string(),
                role: Role::User,
            })
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let pool = pool.clone();
            let id = user.id.clone();
            handles.push(tokio::spawn(async move {
                UserRepository::new(&pool)
                    .record_failed_login(&id, Utc::now())
                    .await
            }));
        }

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap().unwrap());
        }
        counts.sort_unstable();
        // Every increment is observed exactly once; none are lost.
        assert_eq!(counts, vec![1, 2, 3, 4, 5]);

        let user = UserRepository::new(&pool)
            .get_user_by_id(&user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.failed_login_count, 5);
        assert!(user.last_failed_login.is_some());

        pool.close().await;
    }
}
