//! Business logic gluing the state store, the tmux supervisor, and the
//! worktree manager into the operator-facing operations: start, stop,
//! spawn, cleanup, send, rename, status, and ports.

mod config;
mod error;
mod ops;
pub mod ports;

pub use config::{Config, DEFAULT_PORT_SCAN_RETRIES};
pub use error::{OrchestratorError, Result};
pub use ops::{
    cleanup, cleanup_util, close_tab, open_file, parse_send_target, rename, send, spawn,
    spawn_util, start, status, stop, ports_cleanup, ports_list, SendOptions, SendTarget,
    SpawnRequest, MAX_TABS,
};
pub use ports::{ANNOTATION_OFFSET, ARCHITECT_OFFSET, BUILDER_OFFSET, UTIL_OFFSET};
