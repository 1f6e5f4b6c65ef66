//! The operations of the orchestrator's public contract: start, stop, spawn,
//! cleanup, send, rename, status, and ports. Each is a thin composition of
//! `af-db` (state), `af-supervisor` (tmux + bridge processes), and
//! `af-worktree` (git), mirroring the service-layer composition style used
//! throughout vibe-kanban's `crates/services/src/services/*` modules: a
//! service function takes its collaborators by reference and returns a
//! typed error.

use std::time::SystemTime;

use af_core::{
    ids::short_id, Architect, Builder, BuilderStatus, BuilderType, TerminalId, UtilityTerminal,
};
use af_db::{RegistryDb, StateDb};
use af_supervisor::{tmux, SessionConfig};
use af_worktree::GitService;

use crate::config::Config;
use crate::error::{OrchestratorError, Result};
use crate::ports::{find_free_port, ANNOTATION_OFFSET, ARCHITECT_OFFSET, BUILDER_OFFSET, UTIL_OFFSET};

/// Dashboard tab limit from spec.md's external interface contract.
pub const MAX_TABS: usize = 20;

fn next_id() -> String {
    let seed = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
        ^ (std::process::id() as u64);
    short_id(seed)
}

async fn used_ports(state: &StateDb) -> Result<Vec<u16>> {
    let snapshot = state.load_state().await?;
    let mut ports: Vec<u16> = snapshot.builders.iter().map(|b| b.port).collect();
    ports.extend(snapshot.utils.iter().map(|u| u.port));
    if let Some(a) = snapshot.architect {
        ports.push(a.port);
    }
    Ok(ports)
}

/// Starts the architect terminal: one per project, rooted at the project
/// root with no worktree. Refuses if an architect row already exists (the
/// State Store, not the tmux session, is the source of truth — a row with a
/// dead bridge is cleared by the liveness sweep, not by `start`) or if the
/// dashboard's own port (`base+0`) is already bound by something else.
pub async fn start(cfg: &Config, state: &StateDb) -> Result<Architect> {
    let snapshot = state.load_state().await?;
    if snapshot.architect.is_some() {
        return Err(OrchestratorError::ArchitectAlreadyRunning);
    }
    if !crate::ports::is_port_free(cfg.base_port) {
        return Err(OrchestratorError::BasePortBound(cfg.base_port));
    }

    let used = used_ports(state).await?;
    let port = find_free_port(cfg, ARCHITECT_OFFSET, &used)?;
    let session = format!("af-architect-{port}");

    tmux::new_session(
        &session,
        &cfg.project_root,
        cfg.default_cols,
        cfg.default_rows,
        Some(&cfg.architect_command),
    )
    .await?;
    tmux::configure(&session, SessionConfig::default()).await?;

    let pid = match af_supervisor::spawn_bridge(&cfg.bridge_bin, &session, port, &cfg.project_root)
    {
        Ok(pid) => pid,
        Err(e) => {
            tmux::kill_session(&session).await.ok();
            return Err(e.into());
        }
    };

    let architect = Architect {
        port,
        pid,
        command: cfg.architect_command.clone(),
        session,
        started_at: chrono::Utc::now(),
    };
    state.set_architect(&architect).await?;
    Ok(architect)
}

/// Tears down the architect, every builder, and every utility terminal.
/// Worktrees and the port-registry claim are left in place: `stop` ends
/// terminals, it doesn't discard work or give up the project's port block
/// (per spec.md, the block stays owned by this path for stability across
/// restarts — only an explicit `ports cleanup` reclaims a stale one).
pub async fn stop(state: &StateDb) -> Result<()> {
    let snapshot = state.load_state().await?;

    if let Some(architect) = &snapshot.architect {
        af_supervisor::kill_gracefully(architect.pid).await.ok();
        tmux::kill_session(&architect.session).await.ok();
    }
    for b in &snapshot.builders {
        af_supervisor::kill_gracefully(b.pid).await.ok();
        tmux::kill_session(&b.session).await.ok();
    }
    for u in &snapshot.utils {
        af_supervisor::kill_gracefully(u.pid).await.ok();
        tmux::kill_session(&u.session).await.ok();
    }

    state.clear().await?;
    Ok(())
}

pub struct SpawnRequest {
    pub builder_type: BuilderType,
    pub name: String,
    pub task_text: Option<String>,
    pub protocol_name: Option<String>,
    pub tracking_issue: Option<i64>,
    /// Project-relative paths to call out in the initial prompt as context
    /// the builder should read first. Purely textual: nothing here touches
    /// the filesystem beyond what `write_scratch_files` already writes.
    pub files: Vec<String>,
    /// Skips writing `.builder-role.md`'s default role definition, leaving
    /// it empty for an operator who wants to hand-author the role
    /// themselves before the builder's launch script runs.
    pub no_role: bool,
    /// The builder's id, when the caller already knows it — spec.md §3
    /// requires spec builders to carry a zero-padded numeric id
    /// (`af_core::spec_builder_id`), not the short alphanumeric hash every
    /// other builder type gets. `None` falls back to a generated short id.
    pub builder_id: Option<String>,
}

/// Creates a builder: allocates a port, optionally creates a worktree,
/// branch, and scratch files (every type but `Shell`), starts its tmux
/// session and bridge, and records it in the state store. Retries the whole
/// attempt — including the worktree step, so a failed bridge never leaves an
/// orphaned worktree behind — up to `Config::port_scan_retries` times on a
/// port conflict discovered between the scan and the `tmux new-session`
/// call, per spec.md §4.5's "kill the partially started bridge and retry
/// with a fresh snapshot" rule.
pub async fn spawn(
    cfg: &Config,
    state: &StateDb,
    git: &GitService,
    req: SpawnRequest,
) -> Result<Builder> {
    let mut last_err = None;

    for _ in 0..cfg.port_scan_retries {
        let id = req.builder_id.clone().unwrap_or_else(next_id);
        let session = format!("af-builder-{}-{id}", cfg.project_name());

        let used = used_ports(state).await?;
        let port = match find_free_port(cfg, BUILDER_OFFSET, &used) {
            Ok(p) => p,
            Err(e) => {
                last_err = Some(e);
                continue;
            }
        };

        match try_spawn_builder(cfg, state, git, &req, &id, &session, port).await {
            Ok(builder) => return Ok(builder),
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or(OrchestratorError::PortsExhausted(cfg.port_scan_retries)))
}

async fn try_spawn_builder(
    cfg: &Config,
    state: &StateDb,
    git: &GitService,
    req: &SpawnRequest,
    id: &str,
    session: &str,
    port: u16,
) -> Result<Builder> {
    let mut launch_script = None;
    let (worktree_path, branch) = if req.builder_type.has_worktree() {
        git.prune_stale_worktrees().ok();
        let branch = format!("builder/{id}");
        let wt_path = af_utils::assets::builders_dir(&cfg.project_root)
            .map_err(af_utils::PathError::Io)?
            .join(id);
        git.create_worktree(id, &branch, &wt_path)?;

        if req.builder_type.has_initial_prompt() {
            let role = if req.no_role {
                String::new()
            } else {
                default_role_definition(req.builder_type)
            };
            let launch = default_launch_command(req.builder_type);
            let prompt = prompt_with_files(req.task_text.as_deref(), &req.files);
            launch_script = Some(af_worktree::GitService::write_scratch_files(
                &wt_path,
                prompt.as_deref(),
                &role,
                &launch,
            )?);
        }
        (Some(wt_path.display().to_string()), Some(branch))
    } else {
        (None, None)
    };

    let cwd = worktree_path
        .as_deref()
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| cfg.project_root.clone());

    // The launch script written above is the mandatory detour for any
    // command whose arguments may contain shell metacharacters (role
    // prompts routinely do) — run it directly so the session actually picks
    // up the initial prompt/role instead of opening a bare shell.
    let command = launch_script.as_ref().map(|p| p.display().to_string());
    tmux::new_session(
        session,
        &cwd,
        cfg.default_cols,
        cfg.default_rows,
        command.as_deref(),
    )
    .await?;
    tmux::configure(session, SessionConfig::default()).await?;

    let pid = match af_supervisor::spawn_bridge(&cfg.bridge_bin, session, port, &cwd) {
        Ok(pid) => pid,
        Err(e) => {
            tmux::kill_session(session).await.ok();
            if let Some(path) = &worktree_path {
                git.cleanup_worktree(id, std::path::Path::new(path), true).ok();
            }
            return Err(e.into());
        }
    };

    let builder = Builder {
        id: id.to_string(),
        name: req.name.clone(),
        port,
        pid,
        session: session.to_string(),
        builder_type: req.builder_type,
        status: BuilderStatus::Spawning,
        phase: String::new(),
        worktree_path,
        branch,
        task_text: req.task_text.clone(),
        protocol_name: req.protocol_name.clone(),
        tracking_issue: req.tracking_issue,
        created_at: chrono::Utc::now(),
    };
    state.upsert_builder(&builder).await?;
    Ok(builder)
}

/// Appends a "Files:" section naming `files` to `task_text`, if any were
/// given, so the initial prompt tells the builder what to read first.
/// Returns `None` only when there's neither a task nor any files, matching
/// the no-initial-prompt case `write_scratch_files` already handles.
fn prompt_with_files(task_text: Option<&str>, files: &[String]) -> Option<String> {
    if files.is_empty() {
        return task_text.map(str::to_string);
    }
    let listing = files.iter().map(|f| format!("- {f}")).collect::<Vec<_>>().join("\n");
    Some(match task_text {
        Some(text) => format!("{text}\n\nFiles:\n{listing}"),
        None => format!("Files:\n{listing}"),
    })
}

fn default_role_definition(builder_type: BuilderType) -> String {
    match builder_type {
        BuilderType::Spec => "You are a builder implementing a spec-driven task.".to_string(),
        BuilderType::Task => "You are a builder implementing a single tracked task.".to_string(),
        BuilderType::Protocol => "You are a builder following a fixed protocol.".to_string(),
        BuilderType::Worktree => String::new(),
        BuilderType::Shell => String::new(),
    }
}

fn default_launch_command(builder_type: BuilderType) -> String {
    match builder_type {
        BuilderType::Shell => "exec \"$SHELL\"".to_string(),
        _ => "exec \"$SHELL\" -i \"$(dirname \"$0\")/role.md\"".to_string(),
    }
}

/// Creates a utility terminal. When `worktree` is set, it gets its own git
/// worktree/branch exactly like a builder of type `Worktree` would, but
/// skips the initial-prompt/role scratch files spec.md §4.4 reserves for
/// code-producing builders — a worktree-shell is for ad hoc exploration,
/// not an agent role. Retries on id/port collision using
/// `StateDb::try_add_util`'s boolean-not-error contract.
pub async fn spawn_util(
    cfg: &Config,
    state: &StateDb,
    git: &GitService,
    name: String,
    worktree: bool,
) -> Result<UtilityTerminal> {
    let mut last_err = None;
    for _ in 0..cfg.port_scan_retries {
        let used = used_ports(state).await?;
        let port = match find_free_port(cfg, UTIL_OFFSET, &used) {
            Ok(p) => p,
            Err(e) => {
                last_err = Some(e);
                continue;
            }
        };
        let id = next_id();
        let session = format!("af-util-{id}");

        let worktree_path = if worktree {
            git.prune_stale_worktrees().ok();
            let branch = format!("util/{id}");
            let wt_path = af_utils::assets::builders_dir(&cfg.project_root)
                .map_err(af_utils::PathError::Io)?
                .join(&id);
            git.create_worktree(&id, &branch, &wt_path)?;
            Some(wt_path)
        } else {
            None
        };
        let cwd = worktree_path.clone().unwrap_or_else(|| cfg.project_root.clone());

        if let Err(e) =
            tmux::new_session(&session, &cwd, cfg.default_cols, cfg.default_rows, None).await
        {
            if let Some(path) = &worktree_path {
                git.cleanup_worktree(&id, path, true).ok();
            }
            return Err(e.into());
        }
        tmux::configure(&session, SessionConfig::default()).await?;

        let pid = match af_supervisor::spawn_bridge(&cfg.bridge_bin, &session, port, &cwd) {
            Ok(pid) => pid,
            Err(e) => {
                tmux::kill_session(&session).await.ok();
                if let Some(path) = &worktree_path {
                    git.cleanup_worktree(&id, path, true).ok();
                }
                return Err(e.into());
            }
        };

        let util = UtilityTerminal {
            id,
            name: name.clone(),
            port,
            pid,
            session: session.clone(),
            worktree_path: worktree_path.map(|p| p.display().to_string()),
            created_at: chrono::Utc::now(),
        };

        if state.try_add_util(&util).await? {
            return Ok(util);
        }

        // Id collision against a concurrent spawn: tear this attempt down
        // and retry with a fresh snapshot.
        af_supervisor::kill_gracefully(pid).await.ok();
        if let Some(path) = &util.worktree_path {
            git.cleanup_worktree(&util.id, std::path::Path::new(path), true).ok();
        }
        tmux::kill_session(&session).await.ok();
    }
    Err(last_err.unwrap_or(OrchestratorError::PortsExhausted(cfg.port_scan_retries)))
}

/// Kills a builder's session and deletes its worktree (refusing on
/// uncommitted changes unless `force`), then removes it from the state
/// store.
pub async fn cleanup(state: &StateDb, git: &GitService, id: &str, force: bool) -> Result<()> {
    let snapshot = state.load_state().await?;
    let builder = snapshot
        .builders
        .into_iter()
        .find(|b| b.id == id)
        .ok_or_else(|| OrchestratorError::NoSuchTerminal(id.to_string()))?;

    // Step 1: refuse on uncommitted changes before touching anything live.
    if let Some(path) = &builder.worktree_path {
        let path = std::path::Path::new(path);
        if !force && path.exists() && git.has_uncommitted_changes(path)? {
            return Err(af_worktree::WorktreeError::DirtyWorktree(path.display().to_string()).into());
        }
    }

    // Steps 2-3: bridge, then multiplexer session.
    af_supervisor::kill_gracefully(builder.pid).await.ok();
    tmux::kill_session(&builder.session).await.ok();

    // Steps 4-5: worktree, then branch.
    if let Some(path) = &builder.worktree_path {
        git.cleanup_worktree(&builder.id, std::path::Path::new(path), force)?;
    }
    if let Some(branch) = &builder.branch {
        git.delete_branch(branch, force).ok();
    }

    // Step 6: the row.
    state.delete_builder(id).await?;

    // Step 7: prune worktree metadata again now that it's gone.
    git.prune_stale_worktrees().ok();
    Ok(())
}

/// Kills a utility terminal's bridge and multiplexer session and removes its
/// row — the utility-terminal analog of `cleanup` (which only handles
/// worktree-bearing builders).
pub async fn cleanup_util(state: &StateDb, id: &str) -> Result<()> {
    let snapshot = state.load_state().await?;
    let util = snapshot
        .utils
        .into_iter()
        .find(|u| u.id == id)
        .ok_or_else(|| OrchestratorError::NoSuchTerminal(id.to_string()))?;

    af_supervisor::kill_gracefully(util.pid).await.ok();
    tmux::kill_session(&util.session).await.ok();
    state.delete_util(id).await?;
    Ok(())
}

pub async fn rename(state: &StateDb, id: &str, name: &str) -> Result<()> {
    state.rename_builder(id, name).await?;
    Ok(())
}

pub async fn status(state: &StateDb) -> Result<af_db::FarmState> {
    Ok(state.load_state().await?)
}

pub enum SendTarget {
    Architect,
    Builder(String),
    Util(String),
    All,
}

#[derive(Default)]
pub struct SendOptions {
    pub interrupt: bool,
    pub no_submit: bool,
    pub sender: Option<String>,
    /// Skips `[<sender>]\n...\n` framing and delivers `message` byte-for-byte,
    /// per spec.md §8's "round-trip for send" property.
    pub raw: bool,
}

/// Delivers `message` to the target terminal(s) via tmux's paste-buffer
/// mechanism. `--all` fans the same message out to every builder.
pub async fn send(state: &StateDb, target: SendTarget, message: &str, opts: SendOptions) -> Result<()> {
    let snapshot = state.load_state().await?;

    let sessions: Vec<String> = match target {
        SendTarget::Architect => snapshot
            .architect
            .map(|a| a.session)
            .into_iter()
            .collect(),
        SendTarget::Builder(id) => snapshot
            .builders
            .into_iter()
            .find(|b| b.id == id)
            .map(|b| b.session)
            .ok_or_else(|| OrchestratorError::NoSuchTerminal(id.clone()))
            .map(|s| vec![s])?,
        SendTarget::Util(id) => snapshot
            .utils
            .into_iter()
            .find(|u| u.id == id)
            .map(|u| u.session)
            .ok_or_else(|| OrchestratorError::NoSuchTerminal(id.clone()))
            .map(|s| vec![s])?,
        SendTarget::All => snapshot.builders.into_iter().map(|b| b.session).collect(),
    };

    let body = if opts.raw {
        message.to_string()
    } else {
        af_utils::paste::frame_message(opts.sender.as_deref(), message)
    };

    for session in sessions {
        if opts.interrupt {
            tmux::send_interrupt(&session).await.ok();
        }
        tmux::send_via_paste_buffer(&session, &body, !opts.no_submit).await?;
    }
    Ok(())
}

pub async fn ports_list(registry: &RegistryDb) -> Result<Vec<af_core::PortAllocation>> {
    Ok(registry.list_all().await?)
}

pub async fn ports_cleanup(registry: &RegistryDb) -> Result<Vec<String>> {
    Ok(registry.cleanup_stale().await?)
}

/// Opens an annotation viewer for `file_path`: allocates a port in the
/// project's annotation range and spawns the viewer process bound to it.
/// The Dashboard Server's `/api/tabs/file` route is a client of this
/// operation, not an independent mutator of the State Store, per spec.md's
/// Port Registry/State Store ownership note.
pub async fn open_file(
    cfg: &Config,
    state: &StateDb,
    file_path: String,
    parent: Option<af_core::TerminalRef>,
) -> Result<af_core::Annotation> {
    let used = used_ports(state).await?;
    let port = find_free_port(cfg, ANNOTATION_OFFSET, &used)?;
    let pid = af_supervisor::spawn_file_viewer(&file_path, port)?;

    let annotation = af_core::Annotation {
        id: next_id(),
        file_path,
        port,
        pid,
        parent,
        created_at: chrono::Utc::now(),
    };
    state.upsert_annotation(&annotation).await?;
    Ok(annotation)
}

/// Closes an annotation tab: kills its viewer process and removes its row.
pub async fn close_tab(state: &StateDb, id: &str) -> Result<()> {
    let snapshot = state.load_state().await?;
    if let Some(a) = snapshot.annotations.into_iter().find(|a| a.id == id) {
        af_supervisor::kill_gracefully(a.pid).await.ok();
    }
    state.delete_annotation(id).await?;
    Ok(())
}

/// Parses a `send` CLI target string (`"architect"`, `"builder-0001"`,
/// `"util-ab12"`, or the literal `"all"`) into a `SendTarget`.
pub fn parse_send_target(raw: &str) -> Result<SendTarget> {
    if raw == "all" {
        return Ok(SendTarget::All);
    }
    match raw.parse::<TerminalId>() {
        Ok(TerminalId::Architect) => Ok(SendTarget::Architect),
        Ok(TerminalId::Builder(id)) => Ok(SendTarget::Builder(id)),
        Ok(TerminalId::Util(id)) => Ok(SendTarget::Util(id)),
        Err(_) => Err(OrchestratorError::NoSuchTerminal(raw.to_string())),
    }
}
