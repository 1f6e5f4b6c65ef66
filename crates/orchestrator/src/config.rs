//! The per-invocation configuration value every orchestrator operation takes
//! explicitly, instead of reading from a process-wide mutable singleton.
//! Built once in `af`'s `main` (or once at startup in `af-server`) and
//! threaded through every call from there.

use std::path::PathBuf;

/// Default number of candidate ports tried before a spawn gives up, per
/// spec.md's design note resolving the retry-count open question.
pub const DEFAULT_PORT_SCAN_RETRIES: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub project_root: PathBuf,
    /// First port of this project's block; builders/utils/the architect are
    /// allocated sequentially above it.
    pub base_port: u16,
    pub port_scan_retries: u32,
    /// Path to the web-terminal bridge binary `af-supervisor::Bridge` spawns.
    pub bridge_bin: PathBuf,
    pub default_cols: u16,
    pub default_rows: u16,
    /// The command the architect's multiplexer session runs, recorded
    /// verbatim as `Architect::command` (spec.md §3). Defaults to the
    /// operator's login shell.
    pub architect_command: String,
}

impl Config {
    pub fn new(project_root: PathBuf, base_port: u16, bridge_bin: PathBuf) -> Self {
        Self {
            project_root,
            base_port,
            port_scan_retries: DEFAULT_PORT_SCAN_RETRIES,
            bridge_bin,
            default_cols: 120,
            default_rows: 32,
            architect_command: std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string()),
        }
    }

    /// Directory name of the project root, used in canonical tmux session
    /// names (`builder-<project>-<id>`). Falls back to `"project"` for a
    /// root with no final path component (e.g. `/`).
    pub fn project_name(&self) -> String {
        self.project_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    }
}
