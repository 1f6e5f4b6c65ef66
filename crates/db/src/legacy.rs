//! One-shot migration of the legacy `state.json` flat file into the SQLite
//! state store, run once at `StateDb::open` if a database doesn't exist yet.
//! Ported from vibe-kanban's `utils::port_file::{read_port_file,
//! write_port_file}` convention of a single JSON blob per project, which
//! predated its own move to SQLite.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{DbError, Result};
use crate::pragma;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Deserialize, Default)]
struct LegacyState {
    architect: Option<af_core::Architect>,
    #[serde(default)]
    builders: Vec<af_core::Builder>,
    #[serde(default)]
    utils: Vec<af_core::UtilityTerminal>,
    #[serde(default)]
    annotations: Vec<af_core::Annotation>,
}

/// If `<dir>/state.json` exists, parses it and writes its contents into a
/// fresh database at `db_path`, then renames the JSON to
/// `state.json.migrated`. Any failure — bad JSON, write error — leaves
/// `state.json` in place and removes the partially-created database file so
/// the next `open` call retries cleanly rather than seeing a half-populated
/// store.
pub async fn migrate_legacy_state(dir: &Path, db_path: &Path) -> Result<()> {
    let legacy_path = dir.join("state.json");
    if !legacy_path.exists() {
        return Ok(());
    }

    let result = try_migrate(&legacy_path, db_path).await;
    if result.is_err() && db_path.exists() {
        let _ = std::fs::remove_file(db_path);
    }
    result
}

async fn try_migrate(legacy_path: &Path, db_path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(legacy_path)?;
    let legacy: LegacyState = serde_json::from_str(&raw)
        .map_err(|e| DbError::LegacyStateCorrupt(e.to_string()))?;

    let pool = pragma::open_pool(db_path).await?;
    MIGRATOR.run(&pool).await?;

    let mut tx = pool.begin().await?;

    if let Some(architect) = &legacy.architect {
        sqlx::query(
            "INSERT INTO architect (id, port, pid, command, session, started_at) \
             VALUES (1, ?, ?, ?, ?, ?)",
        )
        .bind(architect.port as i64)
        .bind(architect.pid as i64)
        .bind(&architect.command)
        .bind(&architect.session)
        .bind(architect.started_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }

    for b in &legacy.builders {
        sqlx::query(
            "INSERT INTO builder (id, name, port, pid, session, builder_type, status, phase, \
             worktree_path, branch, task_text, protocol_name, tracking_issue, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&b.id)
        .bind(&b.name)
        .bind(b.port as i64)
        .bind(b.pid as i64)
        .bind(&b.session)
        .bind(format!("{:?}", b.builder_type).to_lowercase())
        .bind(format!("{:?}", b.status).to_lowercase())
        .bind(&b.phase)
        .bind(&b.worktree_path)
        .bind(&b.branch)
        .bind(&b.task_text)
        .bind(&b.protocol_name)
        .bind(b.tracking_issue)
        .bind(b.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }

    for u in &legacy.utils {
        sqlx::query(
            "INSERT INTO util_terminal (id, name, port, pid, session, worktree_path, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&u.id)
        .bind(&u.name)
        .bind(u.port as i64)
        .bind(u.pid as i64)
        .bind(&u.session)
        .bind(&u.worktree_path)
        .bind(u.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }

    for a in &legacy.annotations {
        let (parent_kind, parent_id) = match &a.parent {
            Some(p) => (
                Some(format!("{:?}", p.kind).to_lowercase()),
                Some(p.id.clone()),
            ),
            None => (None, None),
        };
        sqlx::query(
            "INSERT INTO annotation (id, file_path, port, pid, parent_kind, parent_id, \
             created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&a.id)
        .bind(&a.file_path)
        .bind(a.port as i64)
        .bind(a.pid as i64)
        .bind(parent_kind)
        .bind(parent_id)
        .bind(a.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    pool.close().await;

    std::fs::rename(legacy_path, migrated_path(legacy_path))?;

    Ok(())
}

fn migrated_path(legacy_path: &Path) -> PathBuf {
    let mut s = legacy_path.as_os_str().to_owned();
    s.push(".migrated");
    PathBuf::from(s)
}
