//! Inbound control commands from dashboard clients.

use pmdash_core::ProcessId;
use serde::{Deserialize, Serialize};

/// A control command issued by a connected dashboard client.
///
/// Wire shape: `{"type": "restart", "id": 3}` for single-target kinds,
/// `{"type": "restart-all"}` for bulk kinds. Unrecognized `type` values
/// deserialize to [`DashboardCommand::Unknown`] so a garbled client can
/// never crash the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DashboardCommand {
    /// Start one stopped process
    Start {
        /// Target process id
        id: ProcessId,
    },

    /// Stop one process
    Stop {
        /// Target process id
        id: ProcessId,
    },

    /// Restart one process
    Restart {
        /// Target process id
        id: ProcessId,
    },

    /// Reset one process's restart counter
    Reset {
        /// Target process id
        id: ProcessId,
    },

    /// Truncate one process's stdout and stderr log files
    Clear {
        /// Target process id
        id: ProcessId,
    },

    /// Start every managed process
    StartAll,

    /// Stop every managed process
    StopAll,

    /// Restart every managed process
    RestartAll,

    /// Reset every managed process's restart counter
    ResetAll,

    /// Any command kind this protocol version does not know.
    ///
    /// Ignored by the dispatcher.
    #[serde(other)]
    Unknown,
}

impl DashboardCommand {
    /// Parses a raw inbound frame.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Returns the single-target id, if this command has one.
    pub fn target(&self) -> Option<ProcessId> {
        match self {
            Self::Start { id }
            | Self::Stop { id }
            | Self::Restart { id }
            | Self::Reset { id }
            | Self::Clear { id } => Some(*id),
            _ => None,
        }
    }

    /// Returns true for the `*-all` fan-out kinds.
    pub fn is_bulk(&self) -> bool {
        matches!(
            self,
            Self::StartAll | Self::StopAll | Self::RestartAll | Self::ResetAll
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_target() {
        let cmd = DashboardCommand::parse(r#"{"type":"restart","id":3}"#).unwrap();
        assert_eq!(
            cmd,
            DashboardCommand::Restart {
                id: ProcessId::new(3)
            }
        );
        assert_eq!(cmd.target(), Some(ProcessId::new(3)));
        assert!(!cmd.is_bulk());
    }

    #[test]
    fn test_parse_bulk() {
        let cmd = DashboardCommand::parse(r#"{"type":"stop-all"}"#).unwrap();
        assert_eq!(cmd, DashboardCommand::StopAll);
        assert_eq!(cmd.target(), None);
        assert!(cmd.is_bulk());
    }

    #[test]
    fn test_parse_clear() {
        let cmd = DashboardCommand::parse(r#"{"type":"clear","id":9}"#).unwrap();
        assert_eq!(
            cmd,
            DashboardCommand::Clear {
                id: ProcessId::new(9)
            }
        );
    }

    #[test]
    fn test_unknown_kind_is_ignored_not_an_error() {
        let cmd = DashboardCommand::parse(r#"{"type":"self-destruct","id":1}"#).unwrap();
        assert_eq!(cmd, DashboardCommand::Unknown);
    }

    #[test]
    fn test_missing_id_is_an_error() {
        assert!(DashboardCommand::parse(r#"{"type":"restart"}"#).is_err());
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(DashboardCommand::parse("not json").is_err());
        assert!(DashboardCommand::parse(r#"{"id":3}"#).is_err());
    }

    #[test]
    fn test_serialize_matches_wire_shape() {
        let json = serde_json::to_value(DashboardCommand::StartAll).unwrap();
        assert_eq!(json["type"], "start-all");

        let json = serde_json::to_value(DashboardCommand::Reset {
            id: ProcessId::new(4),
        })
        .unwrap();
        assert_eq!(json["type"], "reset");
        assert_eq!(json["id"], 4);
    }
}
