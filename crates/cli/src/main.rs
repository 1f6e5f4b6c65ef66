//! `af`: the command-line surface for spec.md §6 — start/stop/status,
//! spawn/cleanup/util/open, send/rename, ports, tunnel, and the supplemented
//! `doctor` diagnostics command. Grounded on
//! `groblegark-oddjobs/crates/cli/src/main.rs`'s `Cli`/`Commands` derive
//! shape and its `run()` dispatch-then-print-`[error]` top level, simplified
//! since Agent Farm has no daemon to connect to: every command talks
//! directly to the State Store, Port Registry, and Worktree Manager for the
//! project rooted at the current directory, per spec.md §6's "only cwd and
//! $HOME are consulted" rule.

mod commands;
mod doctor;
mod viewer;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Agent Farm: spawn, monitor, and tear down a project's builder terminals.
#[derive(Debug, Parser)]
#[command(name = "af", version, about = "Agent Farm orchestrator CLI")]
struct Cli {
    /// Internal: re-exec mode used by `open` to serve a single annotation
    /// file on its own loopback port, mirroring `af-server`'s `--serve-file`.
    #[arg(long, hide = true, global = true)]
    serve_file: Option<String>,

    #[arg(long, hide = true, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Starts the architect terminal for the project rooted at the cwd.
    Start,
    /// Stops every terminal (architect, builders, utilities) for this project.
    Stop,
    /// Prints the full state snapshot: architect, builders, utils, annotations.
    Status,
    /// Spawns a new builder terminal.
    Spawn {
        /// Spec-numbered builder (gets a worktree, initial prompt, and role).
        #[arg(long)]
        project: Option<String>,
        /// Task-driven builder with free-text initial prompt.
        #[arg(long)]
        task: Option<String>,
        /// Protocol-following builder.
        #[arg(long)]
        protocol: Option<String>,
        /// Bare shell builder: project root, no worktree, no initial prompt.
        #[arg(long)]
        shell: bool,
        /// Worktree builder: its own worktree/branch, no role or prompt.
        #[arg(long)]
        worktree: bool,
        /// Comma-separated project-relative paths to call out in the prompt.
        #[arg(long, value_name = "LIST")]
        files: Option<String>,
        /// Skip writing the default role definition into the worktree.
        #[arg(long)]
        no_role: bool,
    },
    /// Tears down a builder: its bridge, session, worktree, and branch.
    Cleanup {
        /// The builder id to clean up.
        #[arg(long)]
        project: String,
        /// Discard uncommitted changes instead of refusing.
        #[arg(long)]
        force: bool,
    },
    /// Opens a bare utility terminal (a shell with no builder lifecycle).
    Util {
        #[arg(long)]
        name: Option<String>,
        /// Gives the utility its own worktree/branch, like a worktree builder.
        #[arg(long)]
        worktree: bool,
    },
    /// Opens a file in an annotation viewer tab.
    Open {
        /// Project-relative path to the file.
        file: String,
    },
    /// Delivers a message to a terminal's multiplexer session.
    Send {
        /// Target terminal id (`architect`, `builder-<id>`, `util-<id>`, or
        /// a bare builder id). Omit when using `--all`.
        builder: Option<String>,
        /// Fan the message out to every running builder.
        #[arg(long)]
        all: bool,
        /// The message body, or (with `--file`) a path whose contents are
        /// read and used as the body.
        message: String,
        /// Treat `message` as a file path and read its contents.
        #[arg(long)]
        file: bool,
        /// Send Ctrl-C to the target before delivering the message.
        #[arg(long)]
        interrupt: bool,
        /// Skip `[sender]` framing; deliver the body byte-for-byte.
        #[arg(long)]
        raw: bool,
        /// Don't submit (no trailing Enter) after the paste.
        #[arg(long)]
        no_enter: bool,
    },
    /// Renames a builder or utility terminal.
    Rename {
        /// The terminal id to rename.
        id: String,
        /// The new display name.
        name: String,
    },
    /// Port Registry inspection and maintenance.
    Ports {
        #[command(subcommand)]
        command: PortsCommand,
    },
    /// Prints the SSH tunnel command to reach this project's dashboard
    /// remotely, per spec.md's "external encrypted tunnel" remote-access model.
    Tunnel,
    /// Read-only environment health report: tmux, git, the bridge binary,
    /// and current port-registry occupancy. Always exits 0.
    Doctor,
}

#[derive(Debug, Subcommand)]
enum PortsCommand {
    /// Lists every project's claimed port block.
    List,
    /// Removes registry rows whose project directory no longer exists.
    Cleanup,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Some(file_path) = cli.serve_file {
        if let Err(e) = viewer::serve(file_path, cli.port.unwrap_or(0)).await {
            eprintln!("[error] {e}");
            std::process::exit(1);
        }
        return;
    }

    let Some(command) = cli.command else {
        eprintln!("[error] no command given (try `af --help`)");
        std::process::exit(1);
    };

    if let Err(e) = dispatch(command).await {
        eprintln!("[error] {e}");
        std::process::exit(1);
    }
}

async fn dispatch(command: Commands) -> anyhow::Result<()> {
    let project_root = project_root()?;

    match command {
        Commands::Start => commands::start(&project_root).await,
        Commands::Stop => commands::stop(&project_root).await,
        Commands::Status => commands::status(&project_root).await,
        Commands::Spawn {
            project,
            task,
            protocol,
            shell,
            worktree,
            files,
            no_role,
        } => {
            commands::spawn(
                &project_root,
                commands::SpawnArgs {
                    project,
                    task,
                    protocol,
                    shell,
                    worktree,
                    files,
                    no_role,
                },
            )
            .await
        }
        Commands::Cleanup { project, force } => commands::cleanup(&project_root, &project, force).await,
        Commands::Util { name, worktree } => commands::util(&project_root, name, worktree).await,
        Commands::Open { file } => commands::open(&project_root, &file).await,
        Commands::Send {
            builder,
            all,
            message,
            file,
            interrupt,
            raw,
            no_enter,
        } => {
            commands::send(
                &project_root,
                commands::SendArgs {
                    builder,
                    all,
                    message,
                    file,
                    interrupt,
                    raw,
                    no_enter,
                },
            )
            .await
        }
        Commands::Rename { id, name } => commands::rename(&project_root, &id, &name).await,
        Commands::Ports { command } => match command {
            PortsCommand::List => commands::ports_list().await,
            PortsCommand::Cleanup => commands::ports_cleanup().await,
        },
        Commands::Tunnel => commands::tunnel(&project_root).await,
        Commands::Doctor => doctor::run(&project_root).await,
    }
}

fn project_root() -> anyhow::Result<PathBuf> {
    std::env::current_dir()?
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("cannot resolve current directory: {e}"))
}
