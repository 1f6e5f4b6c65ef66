//! WAL/busy-timeout pragma tuning, pared down from vibe-kanban's
//! `apply_performance_pragmas` to what a small per-project/per-host store
//! needs: no mmap tuning or WAL-size metrics, just the durability and
//! concurrency pragmas spec.md's concurrency model requires.

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Sqlite, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Busy timeout applied to every connection, matching the concurrency
/// requirement that concurrent writers from the orchestrator CLI and the
/// dashboard server never surface `SQLITE_BUSY` to the operator.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn open_pool(path: &Path) -> sqlx::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT)
        .disable_statement_logging();

    sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(8)
        .min_connections(1)
        .connect_with(options)
        .await
}

pub async fn apply_wal_autocheckpoint(pool: &sqlx::Pool<Sqlite>) -> sqlx::Result<()> {
    sqlx::query("PRAGMA wal_autocheckpoint = 1000")
        .execute(pool)
        .await?;
    Ok(())
}
