//! The Dashboard Server binary (spec.md §4.6): the single entry point for a
//! project's browser session. Bootstrap is grounded on
//! `davidrudduck-vk-swarm`'s `server::main` (asset dir creation, instance
//! registration, port binding, graceful shutdown, best-effort browser
//! opening), adapted from vibe-kanban's single global instance to Agent
//! Farm's one-dashboard-per-project-per-host model, and from its
//! `spawn_mcp_http_server` self-re-exec trick (reused here for
//! `--serve-file`, the annotation viewer's own entry point).

mod app_state;
mod error;
mod logging;
mod routes;
mod security;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::response::IntoResponse;
use clap::Parser;

use af_db::{RegistryDb, StateDb};
use af_orchestrator::Config;
use af_worktree::GitService;

use app_state::AppState;

/// The Dashboard Server: the browser's single entry point into one
/// project's builders, or (with `--serve-file`) a disposable single-file
/// annotation viewer.
#[derive(Debug, Parser)]
struct Args {
    /// Project root to serve. Defaults to the current directory.
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Overrides the port-registry-assigned base port for this project.
    #[arg(long)]
    base_port: Option<u16>,

    /// Path to the web-terminal bridge binary. Defaults to `af-bridge` on
    /// `$PATH`.
    #[arg(long)]
    bridge_bin: Option<PathBuf>,

    /// Binds to all interfaces instead of loopback only. The server enforces
    /// no authentication; this is unsafe outside a trusted network.
    #[arg(long)]
    allow_insecure_remote: bool,

    /// Internal: re-exec mode used by `af_supervisor::spawn_file_viewer` to
    /// serve a single annotation file on its own loopback port.
    #[arg(long)]
    serve_file: Option<String>,

    /// Port to bind in `--serve-file` mode.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init();

    if let Some(file_path) = args.serve_file.clone() {
        return serve_annotation(file_path, args.port.unwrap_or(0)).await;
    }

    run_dashboard(args).await
}

async fn run_dashboard(args: Args) -> anyhow::Result<()> {
    let project_root = match args.project_root {
        Some(p) => p,
        None => std::env::current_dir()?,
    }
    .canonicalize()?;

    let bridge_bin = args
        .bridge_bin
        .unwrap_or_else(|| PathBuf::from("af-bridge"));

    let registry = Arc::new(RegistryDb::open_default().await?);
    registry.cleanup_stale().await.ok();

    let project_path_str = project_root.display().to_string();
    let pid = std::process::id();
    let base_port = match args.base_port {
        Some(p) => p,
        None => registry.get_or_allocate(&project_path_str, pid).await?,
    };

    let config = Arc::new(Config::new(project_root.clone(), base_port, bridge_bin));

    let state_db = Arc::new(StateDb::open(&project_root).await?);
    let git = Arc::new(
        GitService::open(&project_root)
            .map_err(|e| anyhow::anyhow!("{} is not a git repository: {e}", project_root.display()))?,
    );

    let app_state = AppState::new(state_db, registry.clone(), config, git);

    let host = if args.allow_insecure_remote { "0.0.0.0" } else { "127.0.0.1" };
    if args.allow_insecure_remote {
        tracing::warn!(
            "--allow-insecure-remote: binding to all interfaces with no authentication"
        );
    }

    let listener = tokio::net::TcpListener::bind((host, base_port)).await?;
    tracing::info!(
        "Dashboard serving http://{host}:{base_port} for {}",
        project_root.display()
    );

    if !cfg!(debug_assertions) {
        let url = format!("http://127.0.0.1:{base_port}");
        tokio::task::spawn_blocking(move || {
            if let Err(e) = open::that(&url) {
                tracing::warn!("failed to open browser automatically: {e}");
            }
        });
    }

    let router = routes::router(app_state);
    // `shutdown_signal` can be awaited concurrently by more than one task —
    // both the listener below (which stops accepting as soon as it fires)
    // and the `shutdown_signal().await` a few lines down (which starts this
    // function's own 2s drain clock) observe the same Ctrl+C/SIGTERM.
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    shutdown_signal().await;
    tracing::info!("shutdown signal received, draining WebSocket proxies for up to 2s");

    match tokio::time::timeout(Duration::from_secs(2), server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!("server task ended with error: {e}"),
        Ok(Err(e)) => tracing::error!("server task panicked: {e}"),
        Err(_) => tracing::warn!("drain grace period elapsed, forcing exit"),
    }

    registry.unregister(&project_path_str).await.ok();
    Ok(())
}

/// A disposable single-route server for one annotation file, re-exec'd by
/// `af_supervisor::spawn_file_viewer` rather than spawned as its own crate —
/// a file viewer is one route and doesn't warrant a separate binary.
async fn serve_annotation(file_path: String, port: u16) -> anyhow::Result<()> {
    let path = PathBuf::from(file_path);
    let route_path = path.clone();

    let app = axum::Router::new().route(
        "/",
        axum::routing::get(move || {
            let path = route_path.clone();
            async move {
                match tokio::fs::read(&path).await {
                    Ok(bytes) => (axum::http::StatusCode::OK, bytes).into_response(),
                    Err(e) => (
                        axum::http::StatusCode::NOT_FOUND,
                        format!("cannot read file: {e}"),
                    )
                        .into_response(),
                }
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    tracing::info!(
        "annotation viewer serving {} on 127.0.0.1:{}",
        path.display(),
        listener.local_addr()?.port()
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Ctrl+C or SIGTERM, grounded on `davidrudduck-vk-swarm`'s
/// `server::shutdown_signal`.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
            } else {
                tracing::error!("failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        };
        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
