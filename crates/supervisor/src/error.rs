use af_core::ErrorClass;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("tmux is not on PATH")]
    TmuxNotFound,

    #[error("tmux command failed: {0}")]
    TmuxFailed(String),

    #[error("no such session: {0}")]
    NoSuchSession(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SupervisorError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SupervisorError::TmuxNotFound | SupervisorError::Io(_) => ErrorClass::Corruption,
            SupervisorError::TmuxFailed(_) => ErrorClass::Upstream,
            SupervisorError::NoSuchSession(_) => ErrorClass::Operator,
        }
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
