//! Tab creation/removal: `POST /api/tabs/file`, `POST /api/tabs/builder`,
//! `POST /api/tabs/shell`, `DELETE /api/tabs/{id}`. Every creation route
//! enforces the dashboard's 20-open-tab limit before doing any work.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use af_core::{Annotation, Builder, BuilderType, TerminalKind, TerminalRef, UtilityTerminal};
use af_orchestrator::{SpawnRequest, MAX_TABS};
use af_utils::ApiResponse;

use crate::app_state::AppState;
use crate::error::ApiError;

fn open_tab_count(snapshot: &af_db::FarmState) -> usize {
    snapshot.builders.len() + snapshot.utils.len() + snapshot.annotations.len()
}

async fn enforce_tab_limit(app: &AppState) -> Result<(), ApiError> {
    let snapshot = app.state_db.load_state().await?;
    let count = open_tab_count(&snapshot);
    if count >= MAX_TABS {
        return Err(af_orchestrator::OrchestratorError::TabLimitReached(count, MAX_TABS).into());
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct FileTabRequest {
    pub path: String,
    pub parent_kind: Option<String>,
    pub parent_id: Option<String>,
}

pub async fn open_file_tab(
    State(app): State<AppState>,
    Json(req): Json<FileTabRequest>,
) -> Result<Json<ApiResponse<Annotation>>, ApiError> {
    enforce_tab_limit(&app).await?;

    let resolved = af_utils::resolve_project_path(&app.config.project_root, &req.path)?;

    let parent = match (req.parent_kind.as_deref(), req.parent_id) {
        (Some("builder"), Some(id)) => Some(TerminalRef { kind: TerminalKind::Builder, id }),
        (Some("util"), Some(id)) => Some(TerminalRef { kind: TerminalKind::Util, id }),
        (Some("architect"), Some(id)) => Some(TerminalRef { kind: TerminalKind::Architect, id }),
        _ => None,
    };

    let annotation = af_orchestrator::open_file(
        &app.config,
        &app.state_db,
        resolved.display().to_string(),
        parent,
    )
    .await?;
    Ok(Json(ApiResponse::success(annotation)))
}

#[derive(Debug, Deserialize)]
pub struct BuilderTabRequest {
    pub name: String,
    pub builder_type: String,
    pub task_text: Option<String>,
    pub protocol_name: Option<String>,
    pub tracking_issue: Option<i64>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub no_role: bool,
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

pub async fn open_builder_tab(
    State(app): State<AppState>,
    Json(req): Json<BuilderTabRequest>,
) -> Result<Json<ApiResponse<Builder>>, ApiError> {
    enforce_tab_limit(&app).await?;

    let builder = af_orchestrator::spawn(
        &app.config,
        &app.state_db,
        &app.git,
        SpawnRequest {
            builder_type: parse_builder_type(&req.builder_type),
            name: req.name,
            task_text: req.task_text,
            protocol_name: req.protocol_name,
            tracking_issue: req.tracking_issue,
            files: req.files,
            no_role: req.no_role,
            builder_id: None,
        },
    )
    .await?;
    Ok(Json(ApiResponse::success(builder)))
}

#[derive(Debug, Deserialize)]
pub struct ShellTabRequest {
    pub name: String,
    #[serde(default)]
    pub worktree: bool,
}

pub async fn open_shell_tab(
    State(app): State<AppState>,
    Json(req): Json<ShellTabRequest>,
) -> Result<Json<ApiResponse<UtilityTerminal>>, ApiError> {
    enforce_tab_limit(&app).await?;
    let util = af_orchestrator::spawn_util(
        &app.config,
        &app.state_db,
        &app.git,
        req.name,
        req.worktree,
    )
    .await?;
    Ok(Json(ApiResponse::success(util)))
}

#[derive(Debug, Serialize)]
pub struct DeletedTab {
    pub id: String,
}

/// Removes whichever kind of tab `id` refers to: a builder (tears down its
/// session and worktree without `--force`), a utility terminal, or a bare
/// file-viewer annotation. Tries each kind in turn, but only falls through to
/// the next when the current kind genuinely doesn't own `id`
/// (`NoSuchTerminal`) — any other error (e.g. a builder's `DirtyWorktree`
/// refusal) is a real failure and must surface as one, not get swallowed in
/// favor of a later branch reporting a fabricated success.
pub async fn close_tab(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeletedTab>>, ApiError> {
    match af_orchestrator::cleanup(&app.state_db, &app.git, &id, false).await {
        Ok(()) => return Ok(Json(ApiResponse::success(DeletedTab { id }))),
        Err(af_orchestrator::OrchestratorError::NoSuchTerminal(_)) => {}
        Err(e) => return Err(e.into()),
    }
    match af_orchestrator::cleanup_util(&app.state_db, &id).await {
        Ok(()) => return Ok(Json(ApiResponse::success(DeletedTab { id }))),
        Err(af_orchestrator::OrchestratorError::NoSuchTerminal(_)) => {}
        Err(e) => return Err(e.into()),
    }
    af_orchestrator::close_tab(&app.state_db, &id).await?;
    Ok(Json(ApiResponse::success(DeletedTab { id })))
}
