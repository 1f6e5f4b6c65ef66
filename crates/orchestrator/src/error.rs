use af_core::ErrorClass;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Db(#[from] af_db::DbError),

    #[error(transparent)]
    Supervisor(#[from] af_supervisor::SupervisorError),

    #[error(transparent)]
    Worktree(#[from] af_worktree::WorktreeError),

    #[error("path error: {0}")]
    Path(#[from] af_utils::PathError),

    #[error("no available port after {0} attempts")]
    PortsExhausted(u32),

    #[error("no such terminal: {0}")]
    NoSuchTerminal(String),

    #[error("an architect is already running for this project")]
    ArchitectAlreadyRunning,

    #[error("base port {0} is already bound by something else")]
    BasePortBound(u16),

    #[error("the dashboard already has {0} tabs open (limit {1})")]
    TabLimitReached(usize, usize),
}

impl OrchestratorError {
    pub fn class(&self) -> ErrorClass {
        match self {
            OrchestratorError::Db(e) => e.class(),
            OrchestratorError::Supervisor(e) => e.class(),
            OrchestratorError::Worktree(e) => e.class(),
            OrchestratorError::Path(_) => ErrorClass::PathTraversal,
            OrchestratorError::PortsExhausted(_) => ErrorClass::Exhausted,
            OrchestratorError::NoSuchTerminal(_) => ErrorClass::Operator,
            OrchestratorError::TabLimitReached(_, _) => ErrorClass::Conflict,
            OrchestratorError::ArchitectAlreadyRunning => ErrorClass::Conflict,
            OrchestratorError::BasePortBound(_) => ErrorClass::Conflict,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
