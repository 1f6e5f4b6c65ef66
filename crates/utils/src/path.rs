//! Path traversal defense for every endpoint that takes a project-relative
//! path from the operator (file viewer open/read, worktree path résolution).
//! Grounded on the error taxonomy of vibe-kanban's
//! `routes::filesystem::FilesystemError` (`DirectoryDoesNotExist`,
//! `PathIsNotDirectory`, `PathTraversalNotAllowed`), reimplemented here since
//! the service module itself wasn't in the retrieval pack.

use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("path escapes project root: {0}")]
    Traversal(String),

    #[error("path does not exist: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves `requested` (a URL-decoded, project-relative path as sent by the
/// dashboard) against `project_root`, rejecting anything that would escape
/// it.
///
/// Defense in depth, applied in order:
/// 1. percent-decode
/// 2. reject an absolute path
/// 3. reject any `..` component
/// 4. join to `project_root` and canonicalize
/// 5. re-check the canonical path still has `project_root` as a prefix
///    (catches a symlink inside the project pointing back out of it)
pub fn resolve_project_path(project_root: &Path, requested: &str) -> Result<PathBuf, PathError> {
    let decoded = urlencoding::decode(requested)
        .map_err(|_| PathError::Traversal(requested.to_string()))?;
    let decoded = decoded.trim_start_matches('/');

    let candidate = Path::new(decoded);
    if candidate.is_absolute() {
        return Err(PathError::Traversal(requested.to_string()));
    }
    if candidate
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(PathError::Traversal(requested.to_string()));
    }

    let joined = project_root.join(candidate);
    let canonical_root = project_root
        .canonicalize()
        .map_err(|_| PathError::NotFound(project_root.display().to_string()))?;
    let canonical = joined
        .canonicalize()
        .map_err(|_| PathError::NotFound(joined.display().to_string()))?;

    if !canonical.starts_with(&canonical_root) {
        return Err(PathError::Traversal(requested.to_string()));
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn accepts_a_plain_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.md"), "hi").unwrap();

        let resolved = resolve_project_path(dir.path(), "notes.md").unwrap();
        assert_eq!(resolved.file_name().unwrap(), "notes.md");
    }

    #[test]
    fn rejects_dot_dot_segments() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_project_path(dir.path(), "../outside.txt").unwrap_err();
        assert!(matches!(err, PathError::Traversal(_)));
    }

    #[test]
    fn rejects_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_project_path(dir.path(), "/etc/passwd").unwrap_err();
        assert!(matches!(err, PathError::Traversal(_)));
    }

    #[test]
    fn rejects_percent_encoded_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_project_path(dir.path(), "..%2f..%2fetc%2fpasswd").unwrap_err();
        assert!(matches!(err, PathError::Traversal(_)));
    }

    #[test]
    fn rejects_symlink_escaping_root() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "nope").unwrap();

        #[cfg(unix)]
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        #[cfg(unix)]
        {
            let err = resolve_project_path(dir.path(), "link/secret.txt").unwrap_err();
            assert!(matches!(err, PathError::Traversal(_)));
        }
    }
}
