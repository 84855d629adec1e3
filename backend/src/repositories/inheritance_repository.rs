//! Database repository for role inheritance records.
//!
//! Records are never updated in place: a switch deactivates any prior
//! active record and inserts a fresh one, preserving a full history of
//! past grants. Readers must always filter on `is_active`.

use crate::database::models::{CreateRoleInheritance, RoleInheritance};
use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

const INHERITANCE_COLUMNS: &str =
    "id, user_id, original_role, inherited_role, is_active, expires_at, inherited_at";

pub struct InheritanceRepository<'a> {
    /// Shared SQLite connection pool
    pool: &'a SqlitePool,
}

impl<'a> InheritanceRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the user's single active inheritance record, if any.
    pub async fn get_active_for_user(&self, user_id: &str) -> Result<Option<RoleInheritance>> {
        let record = sqlx::query_as::<_, RoleInheritance>(&format!(
            "SELECT {INHERITANCE_COLUMNS} FROM role_inheritance \
             WHERE user_id = ? AND is_active = 1 \
             ORDER BY inherited_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    /// Deactivates every active record for the user in one statement.
    /// Returns the number of rows flipped.
    pub async fn deactivate_for_user(&self, user_id: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE role_inheritance SET is_active = 0 WHERE user_id = ? AND is_active = 1",
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Inserts a new active record.
    pub async fn create_record(&self, record: CreateRoleInheritance) -> Result<RoleInheritance> {
        let created = sqlx::query_as::<_, RoleInheritance>(&format!(
            "INSERT INTO role_inheritance \
                 (id, user_id, original_role, inherited_role, is_active, expires_at, inherited_at) \
             VALUES (?, ?, ?, ?, 1, ?, ?) \
             RETURNING {INHERITANCE_COLUMNS}"
        ))
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(record.original_role)
        .bind(record.inherited_role)
        .bind(record.expires_at)
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await?;

        Ok(created)
    }

    /// Deactivates any active record and inserts the new one in a single
    /// transaction. Concurrent switches for the same user serialize on
    /// the write lock, so exactly one record ends up active.
    pub async fn replace_active(&self, record: CreateRoleInheritance) -> Result<RoleInheritance> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE role_inheritance SET is_active = 0 WHERE user_id = ? AND is_active = 1",
        )
        .bind(&record.user_id)
        .execute(&mut *tx)
        .await?;

        let created = sqlx::query_as::<_, RoleInheritance>(&format!(
            "INSERT INTO role_inheritance \
                 (id, user_id, original_role, inherited_role, is_active, expires_at, inherited_at) \
             VALUES (?, ?, ?, ?, 1, ?, ?) \
             RETURNING {INHERITANCE_COLUMNS}"
        ))
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(record.original_role)
        .bind(record.inherited_role)
        .bind(record.expires_at)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }
}
