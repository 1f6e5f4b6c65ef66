//! Identifier schemes for the runtime entities in spec §3.
//!
//! Spec builders get zero-padded numeric ids (`"0009"`) so they line up with
//! the spec/task numbering convention used by the out-of-scope scaffolding
//! commands; task/protocol/shell/worktree builders, utilities, and
//! annotations get short alphanumeric ids since they have no natural numeric
//! identity.

use std::fmt;

/// Width of a zero-padded spec builder id, e.g. `"0009"`.
pub const SPEC_ID_WIDTH: usize = 4;

/// Format a spec number as a zero-padded builder id.
pub fn spec_builder_id(n: u32) -> String {
    format!("{n:0width$}", width = SPEC_ID_WIDTH)
}

/// Generate a short (8 hex char) alphanumeric id from entropy supplied by the
/// caller (a counter, a pid, a timestamp) — callers own randomness so this
/// stays deterministic and testable.
pub fn short_id(seed: u64) -> String {
    // FNV-1a over the seed bytes, then hex-encode the low 32 bits. This is
    // not cryptographic; it only needs to be unlikely to collide among the
    // handful of concurrently-live builders on one host.
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in seed.to_le_bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{:08x}", hash as u32)
}

/// A terminal identifier as it appears in `/terminal/<id>` and in `send`'s
/// target argument: the literal `architect`, `builder-<id>`, or `util-<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TerminalId {
    Architect,
    Builder(String),
    Util(String),
}

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalId::Architect => write!(f, "architect"),
            TerminalId::Builder(id) => write!(f, "builder-{id}"),
            TerminalId::Util(id) => write!(f, "util-{id}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized terminal id: {0}")]
pub struct ParseTerminalIdError(String);

impl std::str::FromStr for TerminalId {
    type Err = ParseTerminalIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "architect" {
            return Ok(TerminalId::Architect);
        }
        if let Some(id) = s.strip_prefix("builder-") {
            if id.is_empty() {
                return Err(ParseTerminalIdError(s.to_string()));
            }
            return Ok(TerminalId::Builder(id.to_string()));
        }
        if let Some(id) = s.strip_prefix("util-") {
            if id.is_empty() {
                return Err(ParseTerminalIdError(s.to_string()));
            }
            return Ok(TerminalId::Util(id.to_string()));
        }
        Err(ParseTerminalIdError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_id_is_zero_padded() {
        assert_eq!(spec_builder_id(9), "0009");
        assert_eq!(spec_builder_id(1234), "1234");
    }

    #[test]
    fn short_id_is_deterministic() {
        assert_eq!(short_id(42), short_id(42));
        assert_ne!(short_id(42), short_id(43));
        assert_eq!(short_id(42).len(), 8);
    }

    #[test]
    fn terminal_id_round_trips() {
        assert_eq!(
            "architect".parse::<TerminalId>().unwrap(),
            TerminalId::Architect
        );
        assert_eq!(
            "builder-0009".parse::<TerminalId>().unwrap(),
            TerminalId::Builder("0009".into())
        );
        assert_eq!(
            "util-ab12cd34".parse::<TerminalId>().unwrap(),
            TerminalId::Util("ab12cd34".into())
        );
        assert!("bogus".parse::<TerminalId>().is_err());
        assert!("builder-".parse::<TerminalId>().is_err());
    }

    #[test]
    fn terminal_id_display_matches_wire_format() {
        assert_eq!(TerminalId::Architect.to_string(), "architect");
        assert_eq!(TerminalId::Builder("7".into()).to_string(), "builder-7");
        assert_eq!(TerminalId::Util("7".into()).to_string(), "util-7");
    }
}
