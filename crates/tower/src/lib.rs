//! The Tower Server (spec.md §4.7): a host-level, read-only endpoint that
//! lists every running Agent Farm instance by querying the Port Registry and
//! probing each instance's dashboard port. It holds no state of its own
//! beyond the registry — the same no-cache-layer-in-front-of-a-store idiom
//! `af-server`'s `/api/state` route uses, grounded on
//! `davidrudduck-vk-swarm`'s `routes::mod::router` assembly (a `Router<S>`
//! built from `.merge()`s and handed a `State`).

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use af_db::RegistryDb;

/// Per spec.md's design-note resolution: no cache, probe fresh every call.
const PROBE_TIMEOUT: Duration = Duration::from_millis(800);

/// The Tower Server's own fixed port, one below the lowest project base port
/// (4200) so it never collides with a project's block.
pub const DEFAULT_TOWER_PORT: u16 = 4199;

#[derive(Clone)]
pub struct TowerState {
    pub registry: Arc<RegistryDb>,
    pub http: reqwest::Client,
}

impl TowerState {
    pub fn new(registry: Arc<RegistryDb>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { registry, http }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceSummary {
    pub project_path: String,
    pub base_port: u16,
    pub pid: u32,
    pub registered_at: chrono::DateTime<chrono::Utc>,
    pub last_seen_at: chrono::DateTime<chrono::Utc>,
    /// Whether `project_path` still exists as a directory on disk.
    pub exists: bool,
    /// Whether the dashboard at `base_port+0` answered `/api/state`.
    pub alive: bool,
}

pub fn router(state: TowerState) -> Router {
    Router::new()
        .route("/", get(list_html))
        .route("/api/instances", get(list_json))
        .with_state(state)
}

async fn collect_instances(state: &TowerState) -> af_db::Result<Vec<InstanceSummary>> {
    let allocations = state.registry.list_all().await?;
    let mut out = Vec::with_capacity(allocations.len());
    for alloc in allocations {
        let exists = std::path::Path::new(&alloc.project_path).is_dir();
        let alive = probe(&state.http, alloc.base_port).await;
        out.push(InstanceSummary {
            project_path: alloc.project_path,
            base_port: alloc.base_port,
            pid: alloc.pid,
            registered_at: alloc.registered_at,
            last_seen_at: alloc.last_seen_at,
            exists,
            alive,
        });
    }
    Ok(out)
}

/// A dashboard is "alive" if its `/api/state` endpoint answers at all —
/// probed fresh on every Tower request (spec.md §9's open-question
/// resolution: no cache).
async fn probe(http: &reqwest::Client, base_port: u16) -> bool {
    let url = format!("http://127.0.0.1:{base_port}/api/state");
    matches!(http.get(&url).send().await, Ok(resp) if resp.status().is_success())
}

async fn list_json(State(state): State<TowerState>) -> impl IntoResponse {
    match collect_instances(&state).await {
        Ok(instances) => Json(instances).into_response(),
        Err(e) => {
            tracing::error!("failed to list instances: {e}");
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn list_html(State(state): State<TowerState>) -> impl IntoResponse {
    let instances = collect_instances(&state).await.unwrap_or_default();
    let rows: String = instances
        .iter()
        .map(|i| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                html_escape(&i.project_path),
                i.base_port,
                if i.alive { "up" } else { "down" },
                if i.exists { "present" } else { "missing" },
            )
        })
        .collect();
    Html(format!(
        "<!DOCTYPE html><html><head><title>Agent Farm — Tower</title></head><body>\
         <h1>Running instances</h1>\
         <table border=\"1\"><thead><tr><th>project</th><th>base port</th>\
         <th>dashboard</th><th>directory</th></tr></thead><tbody>{rows}</tbody></table>\
         </body></html>"
    ))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_registry_lists_no_instances() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegistryDb::open(&dir.path().join("global.db")).await.unwrap();
        let state = TowerState::new(Arc::new(registry));
        let instances = collect_instances(&state).await.unwrap();
        assert!(instances.is_empty());
    }

    #[tokio::test]
    async fn lists_a_registered_project_as_not_alive_when_nothing_listens() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegistryDb::open(&dir.path().join("global.db")).await.unwrap();
        let project = tempfile::tempdir().unwrap();
        registry
            .get_or_allocate(&project.path().display().to_string(), std::process::id())
            .await
            .unwrap();

        let state = TowerState::new(Arc::new(registry));
        let instances = collect_instances(&state).await.unwrap();
        assert_eq!(instances.len(), 1);
        assert!(instances[0].exists);
        assert!(!instances[0].alive);
    }
}
