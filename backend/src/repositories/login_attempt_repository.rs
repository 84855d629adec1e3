//! Append-only audit trail of login attempts.
//!
//! Rows are never mutated or deleted. Writes are best-effort at the
//! service layer: a failed audit insert must not fail the login response.

use crate::database::models::CreateLoginAttempt;
use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

pub struct LoginAttemptRepository<'a> {
    /// Shared SQLite connection pool
    pool: &'a SqlitePool,
}

impl<'a> LoginAttemptRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Records a single login attempt. `user_id` is None when the
    /// username did not resolve to an account.
    pub async fn record_attempt(&self, attempt: CreateLoginAttempt) -> Result<()> {
        sqlx::query(
            "INSERT INTO login_attempts \
                 (id, user_id, username, ip_address, user_agent, success, attempted_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::now_v7().to_string())
        .bind(&attempt.user_id)
        .bind(&attempt.username)
        .bind(&attempt.ip_address)
        .bind(&attempt.user_agent)
        .bind(attempt.success)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Number of recorded attempts for a username. Used by tests and
    /// admin tooling; the lockout decision reads the counter on the user
    /// row, not this table.
    pub async fn count_for_username(&self, username: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM login_attempts WHERE username = ?")
                .bind(username)
                .fetch_one(self.pool)
                .await?;

        Ok(count)
    }
}
