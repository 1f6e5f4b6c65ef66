//! Port scanning for spawn: pick the first free candidate within a project's
//! 100-port block, starting at the role's offset from the base port and
//! scanning upward through the rest of the block if that offset (and
//! everything above it up to the block boundary) is already taken. Ranges
//! are starting points, not hard limits, per spec.md's port-block layout.

use crate::config::Config;
use crate::error::{OrchestratorError, Result};

/// The architect terminal bridge's fixed offset from the project base port.
pub const ARCHITECT_OFFSET: u16 = 1;
/// Starting offset for builder terminal bridges (range: `+10..+29`).
pub const BUILDER_OFFSET: u16 = 10;
/// Starting offset for utility terminal bridges (range: `+30..+49`).
pub const UTIL_OFFSET: u16 = 30;
/// Starting offset for annotation viewers (range: `+50..+69`).
pub const ANNOTATION_OFFSET: u16 = 50;
/// Upper bound of a project's port block (`+70..+99` stays reserved).
const BLOCK_CEILING: u16 = 99;

/// True if nothing on the host currently has `port` bound on loopback.
pub fn is_port_free(port: u16) -> bool {
    std::net::TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// Scans `base_port + offset ..= base_port + BLOCK_CEILING` for the first
/// port that is neither already recorded in `used_ports` nor bound by
/// something else on the host.
pub fn find_free_port(cfg: &Config, offset: u16, used_ports: &[u16]) -> Result<u16> {
    let start = cfg.base_port.saturating_add(offset);
    let end = cfg.base_port.saturating_add(BLOCK_CEILING);
    let mut candidate = start;
    let mut tried = 0u32;
    while candidate <= end {
        if !used_ports.contains(&candidate) && is_port_free(candidate) {
            return Ok(candidate);
        }
        candidate += 1;
        tried += 1;
    }
    Err(OrchestratorError::PortsExhausted(tried.max(cfg.port_scan_retries)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn architect_port_is_base_plus_one() {
        let cfg = Config::new("/tmp".into(), 20000, "/bin/true".into());
        let port = find_free_port(&cfg, ARCHITECT_OFFSET, &[]).unwrap();
        assert_eq!(port, 20001);
    }

    #[test]
    fn builder_scan_starts_at_offset_ten() {
        let cfg = Config::new("/tmp".into(), 20100, "/bin/true".into());
        let port = find_free_port(&cfg, BUILDER_OFFSET, &[]).unwrap();
        assert!(port >= 20110);
    }

    #[test]
    fn skips_ports_already_in_use_by_state() {
        let cfg = Config::new("/tmp".into(), 20200, "/bin/true".into());
        let used = vec![20210, 20211, 20212];
        let port = find_free_port(&cfg, BUILDER_OFFSET, &used).unwrap();
        assert!(!used.contains(&port));
        assert!(port >= 20210);
    }

    #[test]
    fn exhausts_when_the_whole_block_is_taken() {
        let cfg = Config::new("/tmp".into(), 20300, "/bin/true".into());
        let used: Vec<u16> = (20300..=20399).collect();
        let err = find_free_port(&cfg, UTIL_OFFSET, &used).unwrap_err();
        assert!(matches!(err, OrchestratorError::PortsExhausted(_)));
    }
}
