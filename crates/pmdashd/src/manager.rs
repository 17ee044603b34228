//! The process-manager port.
//!
//! The daemon depends on exactly six manager operations; everything else
//! about the manager is opaque. The trait is object-safe so the snapshot
//! reader and dispatcher hold `Arc<dyn ProcessManager>` and tests can
//! substitute in-memory fakes.

use async_trait::async_trait;
use pmdash_core::{ProcessEntry, ProcessId};
use thiserror::Error;

/// Lifecycle and inspection operations the daemon needs from the
/// process manager.
///
/// Every operation either resolves or fails with a [`ManagerError`];
/// callers treat the error as opaque beyond logging it.
#[async_trait]
pub trait ProcessManager: Send + Sync {
    /// Enumerates all managed processes with their runtime metadata.
    async fn list(&self) -> Result<Vec<ProcessEntry>, ManagerError>;

    /// Starts a stopped process.
    async fn start(&self, id: ProcessId) -> Result<(), ManagerError>;

    /// Stops a process.
    async fn stop(&self, id: ProcessId) -> Result<(), ManagerError>;

    /// Restarts a process.
    async fn restart(&self, id: ProcessId) -> Result<(), ManagerError>;

    /// Resets a process's restart counter.
    async fn reset(&self, id: ProcessId) -> Result<(), ManagerError>;

    /// Returns the listing entries for one process id.
    async fn describe(&self, id: ProcessId) -> Result<Vec<ProcessEntry>, ManagerError>;
}

/// Errors surfaced by process-manager operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The manager CLI could not be spawned at all.
    #[error("failed to run {command}: {error}")]
    Spawn {
        command: String,
        #[source]
        error: std::io::Error,
    },

    /// The manager CLI ran but reported failure.
    #[error("{command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    /// The manager produced a listing the daemon could not parse.
    #[error("failed to parse process listing: {0}")]
    Parse(String),
}
