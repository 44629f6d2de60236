//! Scheduled cleanup of expired token rows.
//!
//! Correctness never depends on this: expired refresh tokens fail signature
//! verification before the registry is consulted, and denylist rows only
//! matter while their token would still verify. Cleanup just keeps the
//! tables from growing without bound.

use crate::db::Database;
use std::time::Duration;
use tracing::{error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once.
pub async fn run_cleanup(db: &Database) {
    match db.refresh_tokens().delete_expired().await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired refresh tokens", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up expired refresh tokens: {}", e),
    }

    match db.invalid_tokens().delete_expired().await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired denylist entries", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up expired denylist entries: {}", e),
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&db).await;
        }
    })
}
