//! Process-liveness checks used by the state store's autocleanup sweep and
//! the port registry's `cleanup_stale`. `kill(pid, None)` is the standard
//! POSIX way to probe a process without signaling it; vibe-kanban's
//! `InstanceRegistry` uses the same probe (there via `kill -0` shelling out)
//! before trusting a recorded pid.

use nix::sys::signal::kill;
use nix::unistd::Pid;

/// True if a process with this pid exists and is reachable by this user.
/// A pid that has been reused by an unrelated process after the original
/// died will read as "alive" — this is an inherent limitation of pid-based
/// liveness and matches the tradeoff vibe-kanban's registry accepts.
pub fn is_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_alive(std::process::id()));
    }

    #[test]
    fn pid_zero_is_never_alive() {
        assert!(!is_alive(0));
    }

    #[test]
    fn an_implausible_pid_is_not_alive() {
        assert!(!is_alive(999_999_999));
    }
}
