//! Raw process entries as reported by the process manager.
//!
//! A `ProcessEntry` is read-only input: the daemon never mutates manager
//! state through it, it only derives views (see [`crate::view`]) and
//! addresses commands by [`ProcessId`].

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exec mode strings that mark a horizontally scaled (clustered) process.
const CLUSTER_MODES: [&str; 2] = ["cluster_mode", "cluster"];

/// Stable numeric identity of a managed process.
///
/// This is the process manager's own id, not an OS pid. It is the key
/// every dashboard command addresses a process by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProcessId(u32);

impl ProcessId {
    /// Creates a new process id.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ProcessId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the process manager's runtime listing.
///
/// Owned by the manager; the daemon reconstructs these from a fresh
/// listing on every sync cycle and never persists them.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessEntry {
    /// Manager-assigned numeric id
    pub id: ProcessId,

    /// Logical application name
    pub name: String,

    /// Execution mode string, passed through opaquely (e.g. "fork_mode",
    /// "cluster_mode")
    pub exec_mode: String,

    /// Per-instance index for clustered processes
    pub instance: Option<u32>,

    /// Lifecycle status, passed through opaquely (e.g. "online",
    /// "stopped", "errored", "launching")
    pub status: String,

    /// Number of times the manager has restarted this process
    pub restarts: u32,

    /// When the current incarnation started
    pub uptime_start: Option<DateTime<Utc>>,

    /// CPU usage percentage
    pub cpu_percent: f64,

    /// Resident memory in bytes
    pub memory_bytes: u64,

    /// Path to the stdout log file
    pub out_log_path: Option<PathBuf>,

    /// Path to the stderr log file
    pub err_log_path: Option<PathBuf>,

    /// Entry belongs to the manager's own instrumentation layer.
    ///
    /// Invariant: flagged entries never appear in any client-facing view
    /// and are never targeted by bulk commands.
    pub is_module: bool,
}

impl ProcessEntry {
    /// Returns true if this process runs in cluster mode.
    pub fn is_cluster(&self) -> bool {
        CLUSTER_MODES.contains(&self.exec_mode.as_str())
    }

    /// Name shown to dashboard clients.
    ///
    /// Clustered processes with an instance index render as
    /// `"{name}-{instance}"` so horizontally scaled instances of one
    /// logical app stay distinguishable. Everything else renders as the
    /// plain name.
    pub fn display_name(&self) -> String {
        match self.instance {
            Some(instance) if self.is_cluster() => format!("{}-{}", self.name, instance),
            _ => self.name.clone(),
        }
    }
}
