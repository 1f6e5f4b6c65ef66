use af_core::ErrorClass;

#[derive(Debug, thiserror::Error)]
pub enum WorktreeError {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worktree {0} has uncommitted changes; use --force to discard them")]
    DirtyWorktree(String),

    #[error("worktree {0} already exists")]
    AlreadyExists(String),

    #[error("no such worktree: {0}")]
    NotFound(String),
}

impl WorktreeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            WorktreeError::DirtyWorktree(_) => ErrorClass::Conflict,
            WorktreeError::AlreadyExists(_) => ErrorClass::Conflict,
            WorktreeError::NotFound(_) => ErrorClass::Operator,
            WorktreeError::Git(_) | WorktreeError::Io(_) => ErrorClass::Corruption,
        }
    }
}

pub type Result<T> = std::result::Result<T, WorktreeError>;
