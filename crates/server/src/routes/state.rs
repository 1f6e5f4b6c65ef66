//! `GET /api/state`: the full dashboard snapshot. Runs the liveness
//! autocleanup sweep first — dead utility terminals and annotations
//! anchored to a terminal that no longer exists are pruned. Builders are
//! deliberately exempt: a builder's dashboard card (and its `pr-ready`
//! status) should survive its tmux session exiting, since that's how an
//! operator notices a builder finished.

use axum::extract::State;
use axum::Json;

use af_core::TerminalKind;
use af_supervisor::tmux;
use af_utils::{liveness, ApiResponse};

use crate::app_state::AppState;
use crate::error::ApiError;

pub async fn get_state(State(app): State<AppState>) -> Result<Json<ApiResponse<af_db::FarmState>>, ApiError> {
    sweep(&app).await?;
    let snapshot = app.state_db.load_state().await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

async fn sweep(app: &AppState) -> Result<(), ApiError> {
    let snapshot = app.state_db.load_state().await?;

    let mut live_util_ids = Vec::new();
    for util in &snapshot.utils {
        if liveness::is_alive(util.pid) {
            live_util_ids.push(util.id.clone());
        } else {
            // spec.md §4.6/§8: a dead bridge's multiplexer session is killed
            // before the row is removed, not left orphaned.
            tmux::kill_session(&util.session).await.ok();
            app.state_db.delete_util(&util.id).await?;
        }
    }

    for annotation in &snapshot.annotations {
        let orphaned = match &annotation.parent {
            Some(p) if p.kind == TerminalKind::Util => !live_util_ids.contains(&p.id),
            _ => false,
        };
        let viewer_dead = !liveness::is_alive(annotation.pid);
        if orphaned || viewer_dead {
            app.state_db.delete_annotation(&annotation.id).await?;
        }
    }

    Ok(())
}
