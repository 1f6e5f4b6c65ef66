use std::sync::Arc;
use std::time::Duration;

use af_db::{RegistryDb, StateDb};
use af_orchestrator::Config;
use af_worktree::GitService;

/// Request timeout the reverse proxy applies to outbound calls against a
/// child bridge, per spec.md §5 ("typically 30s"). WebSocket tunnels are not
/// subject to this — the timeout only wraps `reqwest`'s plain HTTP forward.
const PROXY_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state every route handler extracts, built once at startup the way
/// `davidrudduck-vk-swarm`'s `DeploymentImpl` is built once and handed to
/// every router via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub state_db: Arc<StateDb>,
    pub registry_db: Arc<RegistryDb>,
    pub config: Arc<Config>,
    pub git: Arc<GitService>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        state_db: Arc<StateDb>,
        registry_db: Arc<RegistryDb>,
        config: Arc<Config>,
        git: Arc<GitService>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(PROXY_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            state_db,
            registry_db,
            config,
            git,
            http,
        }
    }
}
