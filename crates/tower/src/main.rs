use std::sync::Arc;

use clap::Parser;

use af_db::RegistryDb;
use af_tower::{router, TowerState, DEFAULT_TOWER_PORT};

/// `af-tower`: lists every running Agent Farm instance on this host by
/// reading the Port Registry and probing each dashboard. One process per
/// host, started independently of any project's `af start`.
#[derive(Debug, Parser)]
struct Args {
    #[arg(long, default_value_t = DEFAULT_TOWER_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let registry = RegistryDb::open_default().await?;
    let state = TowerState::new(Arc::new(registry));

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", args.port)).await?;
    tracing::info!("Tower server listening on http://127.0.0.1:{}", args.port);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
