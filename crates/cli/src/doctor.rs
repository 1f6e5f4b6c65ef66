//! `af doctor`: the supplemented diagnostics command (SPEC_FULL.md §6.1).
//! Read-only environment checks in the shape of vibe-kanban's
//! `routes::diagnostics` and `oj`'s `status` command — reports, never
//! asserts, so it always exits 0 regardless of what it finds.

use std::path::{Path, PathBuf};

pub async fn run(project_root: &Path) -> anyhow::Result<()> {
    println!("Agent Farm doctor — {}", project_root.display());
    check_tmux().await;
    check_git(project_root);
    check_bridge();
    check_ports().await;
    Ok(())
}

async fn check_tmux() {
    match tokio::process::Command::new("tmux").arg("-V").output().await {
        Ok(out) if out.status.success() => {
            println!("[ok]   tmux: {}", String::from_utf8_lossy(&out.stdout).trim());
        }
        Ok(out) => println!(
            "[warn] tmux exited non-zero: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        ),
        Err(e) => println!("[fail] tmux not found on PATH: {e}"),
    }
}

fn check_git(project_root: &Path) {
    match af_worktree::GitService::open(project_root) {
        Ok(_) => println!("[ok]   git repository detected"),
        Err(e) => println!("[warn] not a git repository: {e}"),
    }
}

fn check_bridge() {
    match which_on_path("af-bridge") {
        Some(path) => println!("[ok]   af-bridge found at {}", path.display()),
        None => println!("[warn] af-bridge not found on PATH; start/spawn will fail until it is"),
    }
}

async fn check_ports() {
    match af_db::RegistryDb::open_default().await {
        Ok(registry) => match registry.list_all().await {
            Ok(rows) => println!("[ok]   port registry: {} project(s) claimed", rows.len()),
            Err(e) => println!("[warn] could not read port registry: {e}"),
        },
        Err(e) => println!("[warn] could not open port registry: {e}"),
    }
}

fn which_on_path(bin: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(bin))
        .find(|p| p.is_file())
}
