//! Lifecycle of a web-terminal bridge process: the small per-terminal
//! process that attaches to a tmux session and exposes it over a loopback
//! HTTP+WebSocket port for the Dashboard Server to proxy to.
//!
//! The Orchestrator that spawns a bridge is itself short-lived (§4.5): it
//! spawns the bridge, records its pid in the State Store, and exits. The
//! bridge must outlive that spawn, so it is started detached — stdio
//! redirected away from the orchestrator's own handles and never held as a
//! `tokio::process::Child` with `kill_on_drop`, which would tear the bridge
//! down the moment the spawning process exits. Liveness and shutdown from
//! then on are pid-based, since the `Child` that created it is long gone by
//! the time anything needs to stop it.
//!
//! The graceful-shutdown sequence (SIGTERM, poll, SIGKILL after a timeout)
//! is grounded on `davidrudduck-vk-swarm`'s
//! `local-deployment::command::kill_process_group`, simplified from a
//! process-group kill to a single-pid kill since a bridge here is one
//! process, not a tree.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::time::sleep;

use crate::error::{Result, SupervisorError};
use af_utils::liveness::is_alive;

/// How long to wait after SIGTERM before escalating to SIGKILL.
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Spawns `bridge_bin --session <session_name> --port <port>` rooted at
/// `cwd`, detached from the spawning process, and returns its pid. The
/// bridge binary itself lives outside this crate's scope (it's wired in
/// `af-server`'s terminal routes); this only owns process lifecycle.
///
/// The child's stdio is fully detached (`Stdio::null()`) and `kill_on_drop`
/// is left at its default of `false` — the returned `Child` handle is
/// dropped immediately after reading its pid, which on Unix does not signal
/// the process. Once the spawning orchestrator exits, the bridge is
/// reparented to the host's init/subreaper, which reaps it on exit.
pub fn spawn(bridge_bin: &Path, session_name: &str, port: u16, cwd: &Path) -> Result<u32> {
    let mut child = std::process::Command::new(bridge_bin)
        .arg("--session")
        .arg(session_name)
        .arg("--port")
        .arg(port.to_string())
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    // A detached child can still exit immediately (bad binary, bad args);
    // give it a moment and surface that instead of returning a dead pid.
    std::thread::sleep(Duration::from_millis(20));
    if let Ok(Some(status)) = child.try_wait() {
        return Err(SupervisorError::TmuxFailed(format!(
            "bridge process exited immediately ({status})"
        )));
    }

    Ok(child.id())
}

/// Spawns a short-lived annotation viewer: the current executable re-invoked
/// with `--serve-file <path> --port <port>`, detached exactly like a
/// terminal bridge. Grounded on `davidrudduck-vk-swarm`'s
/// `spawn_mcp_http_server`, which spawns its auxiliary HTTP server as a
/// separate named binary; here the same self-re-exec trick targets the
/// Dashboard Server's own binary instead, since an annotation viewer is a
/// tiny single-route server and doesn't warrant a whole extra crate.
pub fn spawn_file_viewer(file_path: &str, port: u16) -> Result<u32> {
    let exe = std::env::current_exe().map_err(SupervisorError::Io)?;
    let mut child = std::process::Command::new(&exe)
        .arg("--serve-file")
        .arg(file_path)
        .arg("--port")
        .arg(port.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    std::thread::sleep(Duration::from_millis(20));
    if let Ok(Some(status)) = child.try_wait() {
        return Err(SupervisorError::TmuxFailed(format!(
            "annotation viewer exited immediately ({status})"
        )));
    }
    Ok(child.id())
}

/// SIGTERM, poll for exit via `kill(pid, None)`, SIGKILL if it hasn't exited
/// within `GRACEFUL_SHUTDOWN_TIMEOUT`. Pid-based rather than `Child`-based:
/// the orchestrator invocation that kills a bridge is almost never the one
/// that spawned it.
pub async fn kill_gracefully(pid: u32) -> Result<()> {
    let nix_pid = Pid::from_raw(pid as i32);
    if kill(nix_pid, Signal::SIGTERM).is_err() {
        // Already gone.
        return Ok(());
    }

    let deadline = tokio::time::Instant::now() + GRACEFUL_SHUTDOWN_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if !is_alive(pid) {
            return Ok(());
        }
        sleep(POLL_INTERVAL).await;
    }

    if is_alive(pid) {
        let _ = kill(nix_pid, Signal::SIGKILL);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_a_real_detached_process() {
        let dir = tempfile::tempdir().unwrap();
        // `sleep` stands in for the bridge binary in this test; only process
        // lifecycle is under test here, not the bridge's own wire protocol.
        let pid = spawn(Path::new("sleep"), "ignored-session", 0, dir.path());
        // `sleep --session ... --port 0` fails arg parsing for the real
        // `sleep` binary, so assert only that spawning itself doesn't panic
        // and either succeeds with a pid or reports the immediate exit.
        match pid {
            Ok(pid) => {
                assert!(pid > 0);
            }
            Err(SupervisorError::TmuxFailed(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[tokio::test]
    async fn kill_gracefully_on_a_real_process() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        kill_gracefully(pid).await.unwrap();
        let _ = child.kill().await;
        assert!(!is_alive(pid));
    }
}
