//! Process supervision: the tmux multiplexer adapter and the web-terminal
//! bridge process lifecycle that sits between a tmux session and the
//! Dashboard Server's reverse proxy.

mod bridge;
mod error;
pub mod tmux;

pub use bridge::{kill_gracefully, spawn as spawn_bridge, spawn_file_viewer, GRACEFUL_SHUTDOWN_TIMEOUT};
pub use error::{Result, SupervisorError};
pub use tmux::SessionConfig;
