//! Implementations of `af`'s subcommands. Each opens exactly the stores and
//! collaborators its operation needs, per spec.md §9's "explicit
//! configuration value constructed once per invocation" design note — there
//! is no long-lived CLI process, so nothing is cached across commands.

use std::path::{Path, PathBuf};

use af_core::{BuilderType, TerminalId};
use af_db::{RegistryDb, StateDb};
use af_orchestrator::{Config, SendOptions, SendTarget, SpawnRequest};
use af_worktree::GitService;

async fn open_project(project_root: &Path) -> anyhow::Result<(Config, StateDb, RegistryDb)> {
    let registry = RegistryDb::open_default().await?;
    registry.cleanup_stale().await.ok();

    let project_path_str = project_root.display().to_string();
    let base_port = registry
        .get_or_allocate(&project_path_str, std::process::id())
        .await?;

    let cfg = Config::new(project_root.to_path_buf(), base_port, PathBuf::from("af-bridge"));
    let state = StateDb::open(project_root).await?;
    Ok((cfg, state, registry))
}

fn open_git(project_root: &Path) -> anyhow::Result<GitService> {
    GitService::open(project_root)
        .map_err(|e| anyhow::anyhow!("{} is not a git repository: {e}", project_root.display()))
}

pub async fn start(project_root: &Path) -> anyhow::Result<()> {
    let (cfg, state, _registry) = open_project(project_root).await?;
    let architect = af_orchestrator::start(&cfg, &state).await?;
    println!(
        "architect started: session={} port={}",
        architect.session, architect.port
    );
    Ok(())
}

pub async fn stop(project_root: &Path) -> anyhow::Result<()> {
    let (_cfg, state, _registry) = open_project(project_root).await?;
    af_orchestrator::stop(&state).await?;
    println!("stopped");
    Ok(())
}

pub async fn status(project_root: &Path) -> anyhow::Result<()> {
    let (_cfg, state, _registry) = open_project(project_root).await?;
    let snapshot = af_orchestrator::status(&state).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

pub struct SpawnArgs {
    pub project: Option<String>,
    pub task: Option<String>,
    pub protocol: Option<String>,
    pub shell: bool,
    pub worktree: bool,
    pub files: Option<String>,
    pub no_role: bool,
}

/// Shortens a free-text task description to a name short enough for a tmux
/// session suffix and the dashboard's tab label.
fn truncate_name(text: &str) -> String {
    const MAX: usize = 40;
    let trimmed = text.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut end = MAX;
        while end > 0 && !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    }
}

pub async fn spawn(project_root: &Path, args: SpawnArgs) -> anyhow::Result<()> {
    let modes_selected = [
        args.project.is_some(),
        args.task.is_some(),
        args.protocol.is_some(),
        args.shell,
        args.worktree,
    ]
    .iter()
    .filter(|selected| **selected)
    .count();
    if modes_selected != 1 {
        anyhow::bail!(
            "spawn requires exactly one of --project, --task, --protocol, --shell, --worktree"
        );
    }

    let (builder_type, name, task_text, protocol_name, builder_id) = if let Some(id) = &args.project {
        let spec_id = id
            .parse::<u32>()
            .map(af_core::spec_builder_id)
            .unwrap_or_else(|_| id.clone());
        (BuilderType::Spec, spec_id.clone(), None, None, Some(spec_id))
    } else if let Some(text) = &args.task {
        (BuilderType::Task, truncate_name(text), Some(text.clone()), None, None)
    } else if let Some(proto) = &args.protocol {
        (BuilderType::Protocol, proto.clone(), None, Some(proto.clone()), None)
    } else if args.shell {
        (BuilderType::Shell, "shell".to_string(), None, None, None)
    } else {
        (BuilderType::Worktree, "worktree".to_string(), None, None, None)
    };

    let files: Vec<String> = args
        .files
        .as_deref()
        .map(|list| {
            list.split(',')
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let (cfg, state, _registry) = open_project(project_root).await?;
    let git = open_git(project_root)?;

    let builder = af_orchestrator::spawn(
        &cfg,
        &state,
        &git,
        SpawnRequest {
            builder_type,
            name,
            task_text,
            protocol_name,
            tracking_issue: None,
            files,
            no_role: args.no_role,
            builder_id,
        },
    )
    .await?;

    println!(
        "builder {} spawned: session={} port={} worktree={}",
        builder.id,
        builder.session,
        builder.port,
        builder.worktree_path.as_deref().unwrap_or("-")
    );
    Ok(())
}

pub async fn cleanup(project_root: &Path, id: &str, force: bool) -> anyhow::Result<()> {
    let (_cfg, state, _registry) = open_project(project_root).await?;
    let git = open_git(project_root)?;
    af_orchestrator::cleanup(&state, &git, id, force).await?;
    println!("cleaned up {id}");
    Ok(())
}

pub async fn util(project_root: &Path, name: Option<String>, worktree: bool) -> anyhow::Result<()> {
    let (cfg, state, _registry) = open_project(project_root).await?;
    let git = open_git(project_root)?;
    let name = name.unwrap_or_else(|| "shell".to_string());
    let util = af_orchestrator::spawn_util(&cfg, &state, &git, name, worktree).await?;
    println!(
        "utility util-{} spawned: session={} port={}",
        util.id, util.session, util.port
    );
    Ok(())
}

pub async fn open(project_root: &Path, file: &str) -> anyhow::Result<()> {
    let (cfg, state, _registry) = open_project(project_root).await?;
    let resolved = af_utils::resolve_project_path(project_root, file)?;
    let annotation = af_orchestrator::open_file(&cfg, &state, resolved.display().to_string(), None)
        .await?;
    println!(
        "annotation {} opened on http://127.0.0.1:{}",
        annotation.id, annotation.port
    );
    Ok(())
}

pub struct SendArgs {
    pub builder: Option<String>,
    pub all: bool,
    pub message: String,
    pub file: bool,
    pub interrupt: bool,
    pub raw: bool,
    pub no_enter: bool,
}

/// Parses `send`'s positional target: the literal `architect`, a prefixed
/// `builder-<id>`/`util-<id>`, or a bare id shorthand for `builder-<id>` —
/// the common case, since most `send` targets are builders.
fn parse_target(raw: &str) -> SendTarget {
    match raw.parse::<TerminalId>() {
        Ok(TerminalId::Architect) => SendTarget::Architect,
        Ok(TerminalId::Builder(id)) => SendTarget::Builder(id),
        Ok(TerminalId::Util(id)) => SendTarget::Util(id),
        Err(_) => SendTarget::Builder(raw.to_string()),
    }
}

pub async fn send(project_root: &Path, args: SendArgs) -> anyhow::Result<()> {
    if args.all && args.builder.is_some() {
        anyhow::bail!("send takes either a target or --all, not both");
    }
    let target = if args.all {
        SendTarget::All
    } else {
        let raw = args
            .builder
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("send requires a target or --all"))?;
        parse_target(raw)
    };

    let body = if args.file {
        std::fs::read_to_string(&args.message)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", args.message))?
    } else {
        args.message.clone()
    };

    let (_cfg, state, _registry) = open_project(project_root).await?;
    let opts = SendOptions {
        interrupt: args.interrupt,
        no_submit: args.no_enter,
        sender: if args.raw { None } else { Some("architect".to_string()) },
        raw: args.raw,
    };
    af_orchestrator::send(&state, target, &body, opts).await?;
    println!("sent");
    Ok(())
}

pub async fn rename(project_root: &Path, id: &str, name: &str) -> anyhow::Result<()> {
    let (_cfg, state, _registry) = open_project(project_root).await?;
    af_orchestrator::rename(&state, id, name).await?;
    println!("renamed {id} -> {name}");
    Ok(())
}

pub async fn ports_list() -> anyhow::Result<()> {
    let registry = RegistryDb::open_default().await?;
    let allocations = af_orchestrator::ports_list(&registry).await?;
    if allocations.is_empty() {
        println!("no port allocations");
        return Ok(());
    }
    for a in allocations {
        println!(
            "base={:<6} pid={:<8} last_seen={} {}",
            a.base_port, a.pid, a.last_seen_at, a.project_path
        );
    }
    Ok(())
}

pub async fn ports_cleanup() -> anyhow::Result<()> {
    let registry = RegistryDb::open_default().await?;
    let removed = af_orchestrator::ports_cleanup(&registry).await?;
    if removed.is_empty() {
        println!("no stale allocations");
    } else {
        for path in removed {
            println!("removed {path}");
        }
    }
    Ok(())
}

/// Prints the SSH tunnel an operator runs on their own machine to reach this
/// project's dashboard, per spec.md's remote-access model: Agent Farm itself
/// only ever binds loopback, so reaching it remotely is entirely the
/// operator's external tunnel, not a feature this crate implements.
pub async fn tunnel(project_root: &Path) -> anyhow::Result<()> {
    let registry = RegistryDb::open_default().await?;
    let project_path_str = project_root.display().to_string();
    let alloc = registry
        .find_by_project(&project_path_str)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no port allocation for this project yet; run `af start` first"))?;

    println!(
        "ssh -N -L {0}:127.0.0.1:{0} <remote-host>",
        alloc.base_port
    );
    println!("then browse http://127.0.0.1:{}", alloc.base_port);
    Ok(())
}
