//! Console + optional rolling file logging, the same shape as
//! `davidrudduck-vk-swarm`'s `server::file_logging`: a console layer is
//! always on, and setting `AGENT_FARM_FILE_LOGGING=1` adds a daily-rotating
//! file layer under `~/.agent-farm/logs`. The returned guard must be held
//! for the process lifetime or the file layer's background writer thread
//! drops its buffered lines on exit.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub fn init() -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = tracing_subscriber::fmt::layer().with_filter(filter);

    let file_logging_enabled = std::env::var("AGENT_FARM_FILE_LOGGING")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    if !file_logging_enabled {
        tracing_subscriber::registry().with(console_layer).init();
        return None;
    }

    let log_dir = match af_utils::assets::log_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("failed to resolve log directory, file logging disabled: {e}");
            tracing_subscriber::registry().with(console_layer).init();
            return None;
        }
    };

    let appender = tracing_appender::rolling::daily(&log_dir, "af-server.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
    Some(guard)
}
