//! `GET /open-file`, `GET /file`, `GET /api/projectlist-exists`: the three
//! routes that touch the filesystem directly rather than through a terminal
//! bridge. Every path comes from `af_utils::resolve_project_path`, the same
//! validator `routes/tabs.rs`'s file-tab creation uses, so traversal is
//! rejected identically everywhere a path enters from the network.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;

use af_utils::ApiResponse;

use crate::app_state::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct OpenFileQuery {
    pub path: String,
    pub line: Option<u32>,
}

/// A page with no UI of its own: it exists to hand the requested path (and
/// optional line number) to whatever editor-integration script the
/// dashboard UI bundle registers as a `message` listener, then close itself.
pub async fn open_file(
    State(app): State<AppState>,
    Query(q): Query<OpenFileQuery>,
) -> Result<Html<String>, ApiError> {
    let resolved = af_utils::resolve_project_path(&app.config.project_root, &q.path)?;
    let path_json = serde_json::to_string(&resolved.display().to_string()).unwrap_or_default();
    let line = q.line.unwrap_or(0);
    Ok(Html(format!(
        "<!DOCTYPE html><html><body><script>\
         window.opener && window.opener.postMessage({{type:\"open-file\",path:{path_json},line:{line}}}, \"*\");\
         window.close();\
         </script></body></html>"
    )))
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub path: String,
}

/// Raw bytes of a project-relative file, for the dashboard's inline file
/// viewer tabs. Content type is left to the browser to sniff — Agent Farm
/// has no opinion on the file's kind, only that it's inside the project.
pub async fn file(
    State(app): State<AppState>,
    Query(q): Query<FileQuery>,
) -> Result<Response, ApiError> {
    let resolved = af_utils::resolve_project_path(&app.config.project_root, &q.path)?;
    let bytes = tokio::fs::read(&resolved)
        .await
        .map_err(af_utils::PathError::Io)?;
    Ok((StatusCode::OK, bytes).into_response())
}

/// Whether `<project>/codev/projects.md` (or equivalent project-list
/// scaffold) exists, letting the dashboard UI decide whether to offer a
/// "browse projects" affordance. The scaffold content itself is out of
/// scope (spec.md §1's Non-goals); only its presence is reported here.
pub async fn projectlist_exists(
    State(app): State<AppState>,
) -> axum::Json<ApiResponse<bool>> {
    let exists = app.config.project_root.join("codev").join("projects.md").is_file();
    axum::Json(ApiResponse::success(exists))
}
