//! Live refresh token registry.
//!
//! A refresh token is valid iff a row with its exact value exists here.
//! Rows are destroyed exactly once: at rotation (`consume`) or at logout
//! (`revoke_all_for_user`).

use sqlx::sqlite::SqlitePool;

/// Store for currently-valid refresh tokens.
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a newly issued refresh token.
    pub async fn create(
        &self,
        token: &str,
        user_uuid: &str,
        issued_at: u64,
        expires_at: u64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO refresh_tokens (token, user_uuid, issued_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(token)
        .bind(user_uuid)
        .bind(timestamp_to_datetime(issued_at))
        .bind(timestamp_to_datetime(expires_at))
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Atomically look up and delete a token record in one statement.
    ///
    /// Returns whether a record existed. The single DELETE is the replay
    /// gate: concurrent submissions of the same token see exactly one
    /// `true`. A `false` covers already-used, never-issued, and
    /// wrong-user alike; callers must not distinguish them.
    pub async fn consume(&self, token: &str, user_uuid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = ? AND user_uuid = ?")
            .bind(token)
            .bind(user_uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every token belonging to a user (logout everywhere).
    pub async fn revoke_all_for_user(&self, user_uuid: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_uuid = ?")
            .bind(user_uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete all expired token rows. Housekeeping only: expired tokens
    /// already fail signature verification before the registry is consulted.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < datetime('now')")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Number of live tokens for a user.
    pub async fn count_for_user(&self, user_uuid: &str) -> Result<i64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens WHERE user_uuid = ?")
                .bind(user_uuid)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }
}

/// Convert a Unix timestamp to an ISO 8601 datetime string for SQLite.
pub(crate) fn timestamp_to_datetime(timestamp: u64) -> String {
    let days_since_epoch = timestamp / 86400;
    let time_of_day = timestamp % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (year, month, day) = days_to_ymd(days_since_epoch as i64);

    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year, month, day, hours, minutes, seconds
    )
}

/// Convert days since Unix epoch to year, month, day.
/// Algorithm from http://howardhinnant.github.io/date_algorithms.html
fn days_to_ymd(days: i64) -> (i32, u32, u32) {
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as i32, m, d)
}
