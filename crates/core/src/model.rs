//! Domain entities: Architect, Builder, Utility Terminal, Annotation, and
//! Port Allocation, plus the shared error taxonomy that the orchestrator and
//! dashboard server both classify their failures into.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a builder, reported to the dashboard and used to pick
/// the status-bar color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuilderStatus {
    Spawning,
    Implementing,
    Blocked,
    PrReady,
    Complete,
}

impl Default for BuilderStatus {
    fn default() -> Self {
        BuilderStatus::Spawning
    }
}

/// The five spawn modes a builder can be created with. Only `Spec` and
/// `Task` get an associated worktree and branch; `Shell` builders run in the
/// project root with no git side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuilderType {
    Spec,
    Task,
    Protocol,
    Shell,
    Worktree,
}

impl BuilderType {
    /// Whether builders of this type get their own git worktree and branch.
    pub fn has_worktree(self) -> bool {
        !matches!(self, BuilderType::Shell)
    }

    /// Whether builders of this type get an initial prompt/role scratch
    /// file written into their worktree. Worktree-shell utilities get a
    /// worktree but no initial prompt (spec.md §4.4).
    pub fn has_initial_prompt(self) -> bool {
        matches!(
            self,
            BuilderType::Spec | BuilderType::Task | BuilderType::Protocol
        )
    }
}

/// The single architect terminal: one per running instance, spawned in the
/// project root with no worktree of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Architect {
    pub port: u16,
    pub pid: u32,
    /// The command the architect's multiplexer session runs, as recorded at
    /// spawn time (spec.md §3's "command string" attribute). Defaulted so
    /// legacy `state.json` files written before this field existed still
    /// deserialize during migration.
    #[serde(default)]
    pub command: String,
    pub session: String,
    pub started_at: DateTime<Utc>,
}

/// A builder terminal: a multiplexer session running an agent process, tied
/// to a worktree (unless it's a shell builder) and tracked through its
/// lifecycle in the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Builder {
    pub id: String,
    pub name: String,
    pub port: u16,
    pub pid: u32,
    pub session: String,
    pub builder_type: BuilderType,
    pub status: BuilderStatus,
    pub phase: String,
    pub worktree_path: Option<String>,
    pub branch: Option<String>,
    pub task_text: Option<String>,
    pub protocol_name: Option<String>,
    pub tracking_issue: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A utility terminal: a bare shell the operator opened for ad hoc work,
/// outside the builder lifecycle and exempt from the liveness autocleanup
/// sweep's builder-only scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilityTerminal {
    pub id: String,
    pub name: String,
    pub port: u16,
    pub pid: u32,
    pub session: String,
    pub worktree_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An open file-viewer tab in the dashboard, optionally anchored to a
/// builder or utility terminal so it closes when its parent does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    pub file_path: String,
    /// Loopback port of this viewer's own short-lived HTTP server, within
    /// the project's `B+50..B+69` annotation-viewer range.
    pub port: u16,
    /// Process id of the viewer server, for liveness checks and the
    /// autocleanup sweep.
    pub pid: u32,
    pub parent: Option<TerminalRef>,
    pub created_at: DateTime<Utc>,
}

/// A lightweight reference to the terminal an annotation is anchored to,
/// stored alongside it instead of the full `TerminalId` enum so it survives
/// round-tripping through JSON/SQLite without format churn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalRef {
    pub kind: TerminalKind,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalKind {
    Architect,
    Builder,
    Util,
}

/// A row in the host-global port registry: one running instance's claim on
/// a block of ports, keyed by project path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortAllocation {
    pub project_path: String,
    pub base_port: u16,
    pub pid: u32,
    pub registered_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// The error taxonomy of spec.md §7, shared so the dashboard server's
/// `ApiError` and the CLI's exit-code mapping classify failures the same
/// way regardless of which crate raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Operator mistake: bad argument, unknown id, missing file.
    Operator,
    /// A resource the operation needed was already taken (port, session name).
    Conflict,
    /// Retries were exhausted (port scan, spawn retry budget).
    Exhausted,
    /// A downstream process or proxied connection failed.
    Upstream,
    /// Detected state corruption (legacy migration failure, bad DB row).
    Corruption,
    /// A path escaped its allowed root.
    PathTraversal,
}

impl ErrorClass {
    /// The HTTP status the Dashboard Server's `ApiError` maps this class to.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorClass::Operator => 400,
            ErrorClass::Conflict => 409,
            ErrorClass::Exhausted => 503,
            ErrorClass::Upstream => 502,
            ErrorClass::Corruption => 500,
            // spec.md §7 item 6 / §8: path-traversal rejection is always 400.
            ErrorClass::PathTraversal => 400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_type_worktree_flag() {
        assert!(BuilderType::Spec.has_worktree());
        assert!(BuilderType::Task.has_worktree());
        assert!(BuilderType::Protocol.has_worktree());
        assert!(BuilderType::Worktree.has_worktree());
        assert!(!BuilderType::Shell.has_worktree());
    }

    #[test]
    fn status_serializes_kebab_case() {
        let s = serde_json::to_string(&BuilderStatus::PrReady).unwrap();
        assert_eq!(s, "\"pr-ready\"");
    }

    #[test]
    fn error_class_status_codes() {
        assert_eq!(ErrorClass::Operator.http_status(), 400);
        assert_eq!(ErrorClass::Conflict.http_status(), 409);
        assert_eq!(ErrorClass::PathTraversal.http_status(), 400);
    }
}
