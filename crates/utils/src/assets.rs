//! Resolves the two asset directories Agent Farm writes into: the
//! host-global directory (`~/.agent-farm`, holding the port registry and
//! logs) and the per-project directory (`<project_root>/.agent-farm`,
//! holding the state store and worktrees). Mirrors the directory-resolution
//! role of vibe-kanban's `utils::assets` module.

use std::io;
use std::path::{Path, PathBuf};

pub const HOST_DIR_NAME: &str = ".agent-farm";
pub const PROJECT_DIR_NAME: &str = ".agent-farm";

/// `~/.agent-farm`, created if missing.
pub fn host_dir() -> io::Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory"))?;
    let dir = home.join(HOST_DIR_NAME);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// `<project_root>/.agent-farm`, created if missing.
pub fn project_dir(project_root: &Path) -> io::Result<PathBuf> {
    let dir = project_root.join(PROJECT_DIR_NAME);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// `<project_root>/.builders`, the parent directory under which
/// `af-worktree` creates one subdirectory per builder (spec.md's project
/// filesystem layout: `.builders/<id>/`).
pub fn builders_dir(project_root: &Path) -> io::Result<PathBuf> {
    let dir = project_root.join(".builders");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// `~/.agent-farm/logs`, the rolling log directory the ambient logging setup
/// writes into.
pub fn log_dir() -> io::Result<PathBuf> {
    let dir = host_dir()?.join("logs");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_dir_is_created_under_root() {
        let root = tempfile::tempdir().unwrap();
        let dir = project_dir(root.path()).unwrap();
        assert!(dir.exists());
        assert_eq!(dir, root.path().join(".agent-farm"));
    }

    #[test]
    fn builders_dir_is_a_project_root_sibling_of_dot_agent_farm() {
        let root = tempfile::tempdir().unwrap();
        let dir = builders_dir(root.path()).unwrap();
        assert!(dir.exists());
        assert_eq!(dir, root.path().join(".builders"));
    }
}
