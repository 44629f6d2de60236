//! Denylist of revoked-but-unexpired access tokens.
//!
//! Presence of a row means the token is rejected regardless of its
//! signature. Rows become dead weight once the token's own `exp` passes
//! (the signature check rejects it anyway), so expired rows are only
//! pruned for hygiene, never for correctness.

use sqlx::sqlite::SqlitePool;

use super::refresh_token::timestamp_to_datetime;

/// Store for invalidated access tokens.
pub struct InvalidTokenStore {
    pool: SqlitePool,
}

impl InvalidTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a revoked access token together with its natural expiry.
    pub async fn insert(
        &self,
        token: &str,
        user_uuid: &str,
        expires_at: u64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO invalid_access_tokens (token, user_uuid, expires_at) VALUES (?, ?, ?)",
        )
        .bind(token)
        .bind(user_uuid)
        .bind(timestamp_to_datetime(expires_at))
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Membership test, run on every authenticated request before the
    /// signature is verified.
    pub async fn contains(&self, token: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) =
            sqlx::query_as("SELECT COUNT(*) FROM invalid_access_tokens WHERE token = ?")
                .bind(token)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 > 0)
    }

    /// Prune rows whose token would no longer verify anyway.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM invalid_access_tokens WHERE expires_at < datetime('now')")
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
