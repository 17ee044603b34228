//! Derived per-process views pushed to dashboard clients.
//!
//! A `ProcessView` exists for the duration of one sync cycle: it is built
//! from a fresh manager listing, serialized into a snapshot envelope, and
//! discarded. Nothing is reconciled across cycles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::process::{ProcessEntry, ProcessId};

/// Formats resident memory bytes for display, e.g. `"12.36 MB"`.
pub fn format_memory(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// Client-facing view of one managed process.
///
/// Two variants share this shape (spelled out in the wire format):
/// - the full view carries `uptime` and `logs`
/// - the state view omits both, for the high-frequency refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessView {
    /// Manager-assigned id, the key for all commands
    pub id: ProcessId,

    /// Display name (instance-suffixed for clustered processes)
    pub name: String,

    /// Lifecycle status, opaque passthrough
    pub status: String,

    /// Restart counter
    pub restart: u32,

    /// Start time of the current incarnation, as a ms-epoch number
    #[serde(
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub uptime: Option<DateTime<Utc>>,

    /// CPU usage percentage
    pub cpu: f64,

    /// Formatted resident memory, e.g. "12.36 MB"
    pub memory: String,

    /// Execution mode, opaque passthrough
    #[serde(rename = "type")]
    pub exec_mode: String,

    /// Tail of the stdout log (full view only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub logs: Option<String>,
}

impl ProcessView {
    /// Builds the full view, including uptime and the tailed log output.
    pub fn full(entry: &ProcessEntry, logs: String) -> Self {
        Self {
            id: entry.id,
            name: entry.display_name(),
            status: entry.status.clone(),
            restart: entry.restarts,
            uptime: entry.uptime_start,
            cpu: entry.cpu_percent,
            memory: format_memory(entry.memory_bytes),
            exec_mode: entry.exec_mode.clone(),
            logs: Some(logs),
        }
    }

    /// Builds the lightweight state view: no uptime, no logs, no I/O.
    pub fn state(entry: &ProcessEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.display_name(),
            status: entry.status.clone(),
            restart: entry.restarts,
            uptime: None,
            cpu: entry.cpu_percent,
            memory: format_memory(entry.memory_bytes),
            exec_mode: entry.exec_mode.clone(),
            logs: None,
        }
    }
}
