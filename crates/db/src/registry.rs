//! The host-global port registry: `~/.agent-farm/global.db`, one row per
//! running instance's claimed port block. Grounded on vibe-kanban's
//! `InstanceRegistry` (`crates/utils/src/port_file.rs`), ported from its
//! per-project flat JSON files to a single shared SQLite table since spec.md
//! requires registry reads/writes to be transactional across concurrently
//! spawning instances.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use af_core::PortAllocation;

use crate::error::{DbError, Result};
use crate::pragma;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./registry-migrations");

pub struct RegistryDb {
    pool: SqlitePool,
}

impl RegistryDb {
    pub async fn open_default() -> Result<Self> {
        Self::open(&default_registry_path()?).await
    }

    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let pool = pragma::open_pool(path).await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }

    /// Claims `base_port` for `project_path`. Fails with `PortConflict` if
    /// another *live* project already holds it; a stale row (process no
    /// longer running) is silently reclaimed by the caller running
    /// `cleanup_stale` first.
    pub async fn register(&self, project_path: &str, base_port: u16, pid: u32) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO port_allocation (project_path, base_port, pid, registered_at, \
             last_seen_at) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(project_path) DO UPDATE SET base_port = excluded.base_port, \
             pid = excluded.pid, registered_at = excluded.registered_at, \
             last_seen_at = excluded.last_seen_at \
             WHERE NOT EXISTS ( \
               SELECT 1 FROM port_allocation AS other \
               WHERE other.base_port = excluded.base_port \
                 AND other.project_path != excluded.project_path \
             )",
        )
        .bind(project_path)
        .bind(base_port as i64)
        .bind(pid as i64)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::PortConflict(base_port));
        }
        Ok(())
    }

    pub async fn unregister(&self, project_path: &str) -> Result<()> {
        sqlx::query("DELETE FROM port_allocation WHERE project_path = ?")
            .bind(project_path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn touch(&self, project_path: &str) -> Result<()> {
        sqlx::query("UPDATE port_allocation SET last_seen_at = ? WHERE project_path = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(project_path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn find_by_project(&self, project_path: &str) -> Result<Option<PortAllocation>> {
        let row = sqlx::query(
            "SELECT project_path, base_port, pid, registered_at, last_seen_at FROM \
             port_allocation WHERE project_path = ?",
        )
        .bind(project_path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_allocation))
    }

    pub async fn list_all(&self) -> Result<Vec<PortAllocation>> {
        let rows = sqlx::query(
            "SELECT project_path, base_port, pid, registered_at, last_seen_at FROM \
             port_allocation ORDER BY registered_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_allocation).collect())
    }

    /// Removes allocations whose project directory no longer exists on
    /// disk, per spec.md's definition of a stale row ("pointing at a
    /// non-existent directory") — distinct from process liveness, since a
    /// project can be legitimately stopped (no running orchestrator) while
    /// its directory, and thus its claim on the block, remains valid.
    pub async fn cleanup_stale(&self) -> Result<Vec<String>> {
        let all = self.list_all().await?;
        let mut removed = Vec::new();
        for alloc in all {
            if !Path::new(&alloc.project_path).is_dir() {
                self.unregister(&alloc.project_path).await?;
                removed.push(alloc.project_path);
            }
        }
        Ok(removed)
    }

    /// First free base port at or above `floor`, scanning in `step`
    /// increments, that isn't already claimed by `used`.
    fn first_free_base_port(used: &std::collections::BTreeSet<u16>) -> Result<u16> {
        let mut candidate = BASE_PORT_FLOOR;
        while candidate <= BASE_PORT_CEIL {
            if !used.contains(&candidate) {
                return Ok(candidate);
            }
            candidate += BASE_PORT_STEP;
        }
        Err(DbError::RegistryExhausted)
    }

    /// Returns this project's existing base port if it already holds one,
    /// otherwise atomically claims the lowest free block in
    /// `4200..=9900` (step 100, 58 possible blocks) and registers it.
    /// Runs inside a single transaction so two orchestrators racing to
    /// start the same host never observe, and claim, the same candidate.
    pub async fn get_or_allocate(&self, project_path: &str, pid: u32) -> Result<u16> {
        // A plain `pool.begin()` issues `BEGIN DEFERRED`, which only takes
        // its write lock on the first write statement — two orchestrators
        // racing here can both pass the "read all base ports" step before
        // either writes, then collide on `SQLITE_BUSY_SNAPSHOT` instead of
        // serializing. `BEGIN IMMEDIATE` takes the write lock up front, so
        // the loser blocks (up to the busy timeout) rather than conflicts,
        // matching spec.md §4.1's "single serialized transaction" algorithm.
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result: Result<u16> = async {
            let now = Utc::now().to_rfc3339();

            if let Some(row) =
                sqlx::query("SELECT base_port FROM port_allocation WHERE project_path = ?")
                    .bind(project_path)
                    .fetch_optional(&mut *conn)
                    .await?
            {
                let base_port = row.get::<i64, _>("base_port") as u16;
                sqlx::query(
                    "UPDATE port_allocation SET pid = ?, last_seen_at = ? WHERE project_path = ?",
                )
                .bind(pid as i64)
                .bind(&now)
                .bind(project_path)
                .execute(&mut *conn)
                .await?;
                return Ok(base_port);
            }

            let rows = sqlx::query("SELECT base_port FROM port_allocation")
                .fetch_all(&mut *conn)
                .await?;
            let used: std::collections::BTreeSet<u16> = rows
                .into_iter()
                .map(|r| r.get::<i64, _>("base_port") as u16)
                .collect();
            let base_port = Self::first_free_base_port(&used)?;

            sqlx::query(
                "INSERT INTO port_allocation (project_path, base_port, pid, registered_at, \
                 last_seen_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(project_path)
            .bind(base_port as i64)
            .bind(pid as i64)
            .bind(&now)
            .bind(&now)
            .execute(&mut *conn)
            .await?;

            Ok(base_port)
        }
        .await;

        match result {
            Ok(base_port) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(base_port)
            }
            Err(e) => {
                sqlx::query("ROLLBACK").execute(&mut *conn).await.ok();
                Err(e)
            }
        }
    }
}

/// Lowest base port ever handed out, per spec.md's port-block layout.
pub const BASE_PORT_FLOOR: u16 = 4200;
/// Width of one project's port block.
pub const BASE_PORT_STEP: u16 = 100;
/// Highest base port: 58 blocks of 100 span `4200..=9900`.
pub const BASE_PORT_CEIL: u16 = 9900;

fn row_to_allocation(row: sqlx::sqlite::SqliteRow) -> PortAllocation {
    PortAllocation {
        project_path: row.get("project_path"),
        base_port: row.get::<i64, _>("base_port") as u16,
        pid: row.get::<i64, _>("pid") as u32,
        registered_at: row
            .get::<String, _>("registered_at")
            .parse()
            .unwrap_or_else(|_| Utc::now()),
        last_seen_at: row
            .get::<String, _>("last_seen_at")
            .parse()
            .unwrap_or_else(|_| Utc::now()),
    }
}

pub fn default_registry_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| {
        DbError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no home directory",
        ))
    })?;
    Ok(home.join(".agent-farm").join("global.db"))
}
