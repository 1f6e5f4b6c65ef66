//! A tmux multiplexer adapter, grounded directly on
//! `groblegark-oddjobs/crates/adapters/src/session/tmux.rs`'s `TmuxAdapter`:
//! the same subcommands (`new-session`, `has-session`, `send-keys`,
//! `capture-pane`, `kill-session`), extended with the status-bar/mouse/
//! clipboard configuration and paste-buffer delivery Agent Farm's terminals
//! need that `oj`'s daemon sessions don't.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{Result, SupervisorError};
use af_utils::paste;

/// tmux settings applied to every session on creation so the dashboard's
/// embedded terminal behaves consistently: no status bar (the dashboard
/// renders its own chrome), mouse reporting on (scroll/select inside the
/// embedded terminal), and clipboard pass-through so a builder's copy
/// reaches the operator's system clipboard through the terminal emulator.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub status_bar: bool,
    pub mouse: bool,
    pub clipboard: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            status_bar: false,
            mouse: true,
            clipboard: true,
        }
    }
}

async fn run_tmux(args: &[&str]) -> Result<std::process::Output> {
    Command::new("tmux")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SupervisorError::TmuxNotFound
            } else {
                SupervisorError::Io(e)
            }
        })
}

fn ok_or_failed(output: std::process::Output) -> Result<std::process::Output> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(SupervisorError::TmuxFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

pub async fn has_session(name: &str) -> Result<bool> {
    let output = run_tmux(&["has-session", "-t", name]).await?;
    Ok(output.status.success())
}

/// Creates a detached session named `name`, rooted at `cwd`, sized
/// `cols`x`rows`, optionally running `command` instead of the default shell.
pub async fn new_session(
    name: &str,
    cwd: &Path,
    cols: u16,
    rows: u16,
    command: Option<&str>,
) -> Result<()> {
    if has_session(name).await? {
        kill_session(name).await?;
    }

    let cols_s = cols.to_string();
    let rows_s = rows.to_string();
    let cwd_s = cwd.display().to_string();
    let mut args = vec![
        "new-session", "-d", "-s", name, "-x", &cols_s, "-y", &rows_s, "-c", &cwd_s,
    ];
    if let Some(cmd) = command {
        args.push(cmd);
    }
    ok_or_failed(run_tmux(&args).await?)?;
    Ok(())
}

pub async fn kill_session(name: &str) -> Result<()> {
    let output = run_tmux(&["kill-session", "-t", name]).await?;
    // tmux exits non-zero if the session is already gone; treat that as a
    // no-op rather than a hard error.
    if !output.status.success()
        && !String::from_utf8_lossy(&output.stderr).contains("session not found")
    {
        return Err(SupervisorError::TmuxFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(())
}

pub async fn resize(name: &str, cols: u16, rows: u16) -> Result<()> {
    let cols_s = cols.to_string();
    let rows_s = rows.to_string();
    ok_or_failed(
        run_tmux(&["resize-window", "-t", name, "-x", &cols_s, "-y", &rows_s]).await?,
    )?;
    Ok(())
}

/// Types `text` into the session's active pane by simulated keystrokes.
/// Fine for short input; `send_via_paste_buffer` is preferred for the
/// `send` operation since it lands atomically.
pub async fn send_keys_literal(name: &str, text: &str) -> Result<()> {
    ok_or_failed(run_tmux(&["send-keys", "-t", name, "-l", "--", text]).await?)?;
    Ok(())
}

pub async fn send_enter(name: &str) -> Result<()> {
    ok_or_failed(run_tmux(&["send-keys", "-t", name, "Enter"]).await?)?;
    Ok(())
}

/// Sends Ctrl-C to interrupt whatever the session's foreground process is
/// doing, used by `send --interrupt` before delivering a replacement message.
pub async fn send_interrupt(name: &str) -> Result<()> {
    ok_or_failed(run_tmux(&["send-keys", "-t", name, "C-c"]).await?)?;
    Ok(())
}

/// Delivers `data` to `name` via tmux's paste-buffer mechanism, chunked to
/// `af_utils::paste::MAX_CHUNK_BYTES` so no single `set-buffer` call is
/// unbounded. `submit` appends Enter after the final chunk.
pub async fn send_via_paste_buffer(name: &str, data: &str, submit: bool) -> Result<()> {
    let buffer_name = format!("af-send-{}", std::process::id());
    for chunk in paste::chunk(data, paste::MAX_CHUNK_BYTES) {
        ok_or_failed(run_tmux(&["set-buffer", "-b", &buffer_name, &chunk]).await?)?;
        ok_or_failed(
            run_tmux(&["paste-buffer", "-b", &buffer_name, "-d", "-t", name]).await?,
        )?;
    }
    if submit {
        send_enter(name).await?;
    }
    Ok(())
}

pub async fn capture_pane(name: &str, lines: u32) -> Result<String> {
    let start = format!("-{lines}");
    let output = ok_or_failed(
        run_tmux(&["capture-pane", "-t", name, "-p", "-S", &start]).await?,
    )?;
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

pub async fn configure(name: &str, config: SessionConfig) -> Result<()> {
    let status = if config.status_bar { "on" } else { "off" };
    ok_or_failed(run_tmux(&["set-option", "-t", name, "status", status]).await?)?;

    let mouse = if config.mouse { "on" } else { "off" };
    ok_or_failed(run_tmux(&["set-option", "-t", name, "mouse", mouse]).await?)?;

    let clipboard = if config.clipboard { "on" } else { "off" };
    ok_or_failed(
        run_tmux(&["set-option", "-t", name, "set-clipboard", clipboard]).await?,
    )?;
    Ok(())
}

/// Reads `#{pane_dead_status}`, the shell exit code of a pane whose process
/// has exited, or `None` if the pane is still running.
pub async fn exit_code(name: &str) -> Result<Option<i32>> {
    let output = ok_or_failed(
        run_tmux(&[
            "display-message", "-p", "-t", name, "#{pane_dead_status}",
        ])
        .await?,
    )?;
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(text.parse::<i32>().ok())
}
