//! git2-based worktree and branch lifecycle for builders.

mod error;
mod git_service;

pub use error::{Result, WorktreeError};
pub use git_service::GitService;
