//! Database repository for long-lived API tokens.

use crate::database::models::{ApiToken, CreateApiToken};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

const TOKEN_COLUMNS: &str = "id, user_id, name, description, token, token_prefix, \
     expires_at, last_used_at, is_active, created_at";

pub struct TokenRepository<'a> {
    /// Shared SQLite connection pool
    pool: &'a SqlitePool,
}

impl<'a> TokenRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a new API token row.
    pub async fn create_token(&self, token: CreateApiToken) -> Result<ApiToken> {
        let created = sqlx::query_as::<_, ApiToken>(&format!(
            "INSERT INTO api_tokens (id, user_id, name, description, token, token_prefix, \
                 expires_at, is_active, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?) \
             RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(&token.id)
        .bind(&token.user_id)
        .bind(&token.name)
        .bind(&token.description)
        .bind(&token.token)
        .bind(&token.token_prefix)
        .bind(token.expires_at)
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await?;

        Ok(created)
    }

    /// Retrieves all tokens owned by a user, newest first.
    pub async fn get_tokens_by_user_id(&self, user_id: &str) -> Result<Vec<ApiToken>> {
        let tokens = sqlx::query_as::<_, ApiToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM api_tokens \
             WHERE user_id = ? ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(tokens)
    }

    /// Looks up an active token row by its opaque value. Expiry is checked
    /// by the caller so time comparisons stay in one place.
    pub async fn get_active_token_by_value(&self, value: &str) -> Result<Option<ApiToken>> {
        let token = sqlx::query_as::<_, ApiToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM api_tokens WHERE token = ? AND is_active = 1"
        ))
        .bind(value)
        .fetch_optional(self.pool)
        .await?;

        Ok(token)
    }

    /// Checks if the user already owns a token with this name.
    pub async fn name_exists(&self, user_id: &str, name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM api_tokens WHERE user_id = ? AND name = ?",
        )
        .bind(user_id)
        .bind(name)
        .fetch_one(self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Stamps the token as used just now.
    pub async fn touch_last_used(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE api_tokens SET last_used_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Deletes a token, but only if it belongs to the given user. Returns
    /// whether a row was actually removed.
    pub async fn delete_token(&self, id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM api_tokens WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
