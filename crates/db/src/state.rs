//! The per-project state store: `.agent-farm/state.db`, one row per running
//! architect/builder/utility terminal/annotation. Mirrors vibe-kanban's
//! `DBService` in shape (a thin wrapper around a pool plus migrations) but
//! scoped to the handful of tables spec.md's data model names.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use af_core::{
    Architect, Builder, BuilderStatus, BuilderType, TerminalKind, TerminalRef, UtilityTerminal,
};

use crate::error::{DbError, Result};
use crate::legacy;
use crate::pragma;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// A full snapshot of a project's live state, the shape the Dashboard
/// Server's `GET /api/state` serializes directly.
#[derive(Debug, Clone, Serialize, Default)]
pub struct FarmState {
    pub architect: Option<Architect>,
    pub builders: Vec<Builder>,
    pub utils: Vec<UtilityTerminal>,
    pub annotations: Vec<af_core::Annotation>,
}

pub struct StateDb {
    pool: SqlitePool,
}

impl StateDb {
    /// Opens (creating if necessary) `<project_root>/.agent-farm/state.db`,
    /// migrating a legacy `state.json` in first if one is present and no
    /// database yet exists (spec.md §4.2's startup migration requirement).
    pub async fn open(project_root: &Path) -> Result<Self> {
        let dir = project_root.join(".agent-farm");
        std::fs::create_dir_all(&dir)?;
        let db_path = dir.join("state.db");

        if !db_path.exists() {
            legacy::migrate_legacy_state(&dir, &db_path).await?;
        }

        let pool = pragma::open_pool(&db_path).await?;
        MIGRATOR.run(&pool).await?;
        pragma::apply_wal_autocheckpoint(&pool).await?;
        Ok(Self { pool })
    }

    /// Opens a store at an exact database path, bypassing the
    /// `.agent-farm/` project-root convention and the legacy migration
    /// check. Used by tests that want a scratch database without a fake
    /// project tree.
    pub async fn open_at(db_path: &Path) -> Result<Self> {
        let pool = pragma::open_pool(db_path).await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }

    /// Reads architect, builders, utils, and annotations as one consistent
    /// snapshot (spec.md §4.2: "`LoadState()` reads ... in a single read
    /// transaction; concurrent writers do not tear the snapshot"). SQLite's
    /// deferred transaction acquires its read lock on the first statement
    /// and holds it for the rest, so all four selects see the same commit.
    pub async fn load_state(&self) -> Result<FarmState> {
        let mut tx = self.pool.begin().await?;

        let architect = sqlx::query(
            "SELECT port, pid, command, session, started_at FROM architect WHERE id = 1",
        )
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| Architect {
            port: row.get::<i64, _>("port") as u16,
            pid: row.get::<i64, _>("pid") as u32,
            command: row.get("command"),
            session: row.get("session"),
            started_at: row.get::<String, _>("started_at").parse().unwrap_or_else(|_| Utc::now()),
        });

        let builder_rows = sqlx::query(
            "SELECT id, name, port, pid, session, builder_type, status, phase, worktree_path, \
             branch, task_text, protocol_name, tracking_issue, created_at FROM builder \
             ORDER BY created_at ASC",
        )
        .fetch_all(&mut *tx)
        .await?;
        let builders = builder_rows
            .into_iter()
            .map(|row| Builder {
                id: row.get("id"),
                name: row.get("name"),
                port: row.get::<i64, _>("port") as u16,
                pid: row.get::<i64, _>("pid") as u32,
                session: row.get("session"),
                builder_type: parse_builder_type(&row.get::<String, _>("builder_type")),
                status: parse_status(&row.get::<String, _>("status")),
                phase: row.get("phase"),
                worktree_path: row.get("worktree_path"),
                branch: row.get("branch"),
                task_text: row.get("task_text"),
                protocol_name: row.get("protocol_name"),
                tracking_issue: row.get("tracking_issue"),
                created_at: row
                    .get::<String, _>("created_at")
                    .parse()
                    .unwrap_or_else(|_| Utc::now()),
            })
            .collect();

        let util_rows = sqlx::query(
            "SELECT id, name, port, pid, session, worktree_path, created_at FROM util_terminal \
             ORDER BY created_at ASC",
        )
        .fetch_all(&mut *tx)
        .await?;
        let utils = util_rows
            .into_iter()
            .map(|row| UtilityTerminal {
                id: row.get("id"),
                name: row.get("name"),
                port: row.get::<i64, _>("port") as u16,
                pid: row.get::<i64, _>("pid") as u32,
                session: row.get("session"),
                worktree_path: row.get("worktree_path"),
                created_at: row
                    .get::<String, _>("created_at")
                    .parse()
                    .unwrap_or_else(|_| Utc::now()),
            })
            .collect();

        let annotation_rows = sqlx::query(
            "SELECT id, file_path, port, pid, parent_kind, parent_id, created_at FROM annotation \
             ORDER BY created_at ASC",
        )
        .fetch_all(&mut *tx)
        .await?;
        let annotations = annotation_rows
            .into_iter()
            .map(|row| {
                let parent_kind: Option<String> = row.get("parent_kind");
                let parent_id: Option<String> = row.get("parent_id");
                let parent = match (parent_kind, parent_id) {
                    (Some(kind), Some(id)) => Some(TerminalRef {
                        kind: parse_terminal_kind(&kind),
                        id,
                    }),
                    _ => None,
                };
                af_core::Annotation {
                    id: row.get("id"),
                    file_path: row.get("file_path"),
                    port: row.get::<i64, _>("port") as u16,
                    pid: row.get::<i64, _>("pid") as u32,
                    parent,
                    created_at: row
                        .get::<String, _>("created_at")
                        .parse()
                        .unwrap_or_else(|_| Utc::now()),
                }
            })
            .collect();

        tx.commit().await?;

        Ok(FarmState {
            architect,
            builders,
            utils,
            annotations,
        })
    }

    pub async fn set_architect(&self, architect: &Architect) -> Result<()> {
        sqlx::query(
            "INSERT INTO architect (id, port, pid, command, session, started_at) \
             VALUES (1, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET port = excluded.port, pid = excluded.pid, \
             command = excluded.command, session = excluded.session, \
             started_at = excluded.started_at",
        )
        .bind(architect.port as i64)
        .bind(architect.pid as i64)
        .bind(&architect.command)
        .bind(&architect.session)
        .bind(architect.started_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_builder(&self, b: &Builder) -> Result<()> {
        sqlx::query(
            "INSERT INTO builder (id, name, port, pid, session, builder_type, status, phase, \
             worktree_path, branch, task_text, protocol_name, tracking_issue, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, port = excluded.port, \
             pid = excluded.pid, session = excluded.session, builder_type = excluded.builder_type, \
             status = excluded.status, phase = excluded.phase, \
             worktree_path = excluded.worktree_path, branch = excluded.branch, \
             task_text = excluded.task_text, protocol_name = excluded.protocol_name, \
             tracking_issue = excluded.tracking_issue",
        )
        .bind(&b.id)
        .bind(&b.name)
        .bind(b.port as i64)
        .bind(b.pid as i64)
        .bind(&b.session)
        .bind(builder_type_str(b.builder_type))
        .bind(status_str(b.status))
        .bind(&b.phase)
        .bind(&b.worktree_path)
        .bind(&b.branch)
        .bind(&b.task_text)
        .bind(&b.protocol_name)
        .bind(b.tracking_issue)
        .bind(b.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_builder(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM builder WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NoSuchBuilder(id.to_string()));
        }
        Ok(())
    }

    pub async fn rename_builder(&self, id: &str, name: &str) -> Result<()> {
        let result = sqlx::query("UPDATE builder SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NoSuchBuilder(id.to_string()));
        }
        Ok(())
    }

    pub async fn set_builder_status(&self, id: &str, status: BuilderStatus) -> Result<()> {
        let result = sqlx::query("UPDATE builder SET status = ? WHERE id = ?")
            .bind(status_str(status))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NoSuchBuilder(id.to_string()));
        }
        Ok(())
    }

    /// Inserts a utility terminal, returning `false` instead of an error if
    /// its id is already taken — the operator's retry loop treats that as
    /// "try the next candidate", not as a hard failure.
    pub async fn try_add_util(&self, u: &UtilityTerminal) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO util_terminal (id, name, port, pid, session, worktree_path, \
             created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&u.id)
        .bind(&u.name)
        .bind(u.port as i64)
        .bind(u.pid as i64)
        .bind(&u.session)
        .bind(&u.worktree_path)
        .bind(u.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn delete_util(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM util_terminal WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NoSuchUtil(id.to_string()));
        }
        Ok(())
    }

    pub async fn upsert_annotation(&self, a: &af_core::Annotation) -> Result<()> {
        let (parent_kind, parent_id) = match &a.parent {
            Some(p) => (Some(terminal_kind_str(p.kind)), Some(p.id.clone())),
            None => (None, None),
        };
        sqlx::query(
            "INSERT INTO annotation (id, file_path, port, pid, parent_kind, parent_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET file_path = excluded.file_path, \
             port = excluded.port, pid = excluded.pid, \
             parent_kind = excluded.parent_kind, parent_id = excluded.parent_id",
        )
        .bind(&a.id)
        .bind(&a.file_path)
        .bind(a.port as i64)
        .bind(a.pid as i64)
        .bind(parent_kind)
        .bind(parent_id)
        .bind(a.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_annotation(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM annotation WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NoSuchAnnotation(id.to_string()));
        }
        Ok(())
    }

    /// Removes every builder whose terminal is no longer alive. The liveness
    /// check itself lives in `af-utils`; callers pass the set of still-live
    /// ids so this stays a pure storage operation.
    pub async fn retain_builders(&self, live_ids: &[String]) -> Result<Vec<String>> {
        let all: Vec<String> = sqlx::query("SELECT id FROM builder")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| row.get("id"))
            .collect();
        let mut removed = Vec::new();
        for id in all {
            if !live_ids.contains(&id) {
                self.delete_builder(&id).await?;
                removed.push(id);
            }
        }
        Ok(removed)
    }

    /// Wipes every table. Used by `cleanup --force` on the whole project and
    /// by tests.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM annotation").execute(&self.pool).await?;
        sqlx::query("DELETE FROM util_terminal").execute(&self.pool).await?;
        sqlx::query("DELETE FROM builder").execute(&self.pool).await?;
        sqlx::query("DELETE FROM architect").execute(&self.pool).await?;
        Ok(())
    }
}

fn status_str(status: BuilderStatus) -> &'static str {
    match status {
        BuilderStatus::Spawning => "spawning",
        BuilderStatus::Implementing => "implementing",
        BuilderStatus::Blocked => "blocked",
        BuilderStatus::PrReady => "pr-ready",
        BuilderStatus::Complete => "complete",
    }
}

fn parse_status(s: &str) -> BuilderStatus {
    match s {
        "implementing" => BuilderStatus::Implementing,
        "blocked" => BuilderStatus::Blocked,
        "pr-ready" => BuilderStatus::PrReady,
        "complete" => BuilderStatus::Complete,
        _ => BuilderStatus::Spawning,
    }
}

fn builder_type_str(t: BuilderType) -> &'static str {
    match t {
        BuilderType::Spec => "spec",
        BuilderType::Task => "task",
        BuilderType::Protocol => "protocol",
        BuilderType::Shell => "shell",
        BuilderType::Worktree => "worktree",
    }
}

fn parse_builder_type(s: &str) -> BuilderType {
    match s {
        "task" => BuilderType::Task,
        "protocol" => BuilderType::Protocol,
        "shell" => BuilderType::Shell,
        "worktree" => BuilderType::Worktree,
        _ => BuilderType::Spec,
    }
}

fn terminal_kind_str(k: TerminalKind) -> &'static str {
    match k {
        TerminalKind::Architect => "architect",
        TerminalKind::Builder => "builder",
        TerminalKind::Util => "util",
    }
}

fn parse_terminal_kind(s: &str) -> TerminalKind {
    match s {
        "architect" => TerminalKind::Architect,
        "util" => TerminalKind::Util,
        _ => TerminalKind::Builder,
    }
}

/// Resolves `.agent-farm/state.db` under `project_root` without opening it,
/// used by the CLI to decide whether a project has been initialized.
pub fn state_db_path(project_root: &Path) -> PathBuf {
    project_root.join(".agent-farm").join("state.db")
}
