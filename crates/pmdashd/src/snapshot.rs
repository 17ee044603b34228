//! Shapes raw manager listings into the two snapshot views.
//!
//! Every build starts from a fresh `list()` call. Instrumentation-only
//! entries are filtered before anything else happens, so they can never
//! reach a client. A failed listing fails the whole build (the caller
//! skips that cycle); a failed log read is isolated to its one process.

use std::sync::Arc;

use futures_util::future;
use pmdash_core::{ProcessEntry, ProcessView};
use tracing::warn;

use crate::logs;
use crate::manager::{ManagerError, ProcessManager};

/// Builds full and state-only snapshots from the process manager.
pub struct SnapshotReader {
    manager: Arc<dyn ProcessManager>,
}

impl SnapshotReader {
    /// Creates a reader over the given manager.
    pub fn new(manager: Arc<dyn ProcessManager>) -> Self {
        Self { manager }
    }

    /// Builds the full snapshot: every dashboard-visible process with its
    /// tailed log output.
    ///
    /// Log tails are loaded concurrently; the resulting views keep the
    /// manager's listing order. A tail that cannot be read is replaced by
    /// an inline marker so one broken log file never blocks the other
    /// processes' update.
    pub async fn build_full(&self) -> Result<Vec<ProcessView>, ManagerError> {
        let entries = self.dashboard_entries().await?;
        let views = future::join_all(entries.iter().map(|entry| self.full_view(entry))).await;
        Ok(views)
    }

    /// Builds the state-only snapshot directly from the listing: no
    /// uptime, no logs, no file I/O.
    pub async fn build_state(&self) -> Result<Vec<ProcessView>, ManagerError> {
        let entries = self.dashboard_entries().await?;
        Ok(entries.iter().map(ProcessView::state).collect())
    }

    /// Lists the manager and drops instrumentation-only entries.
    async fn dashboard_entries(&self) -> Result<Vec<ProcessEntry>, ManagerError> {
        let entries = self.manager.list().await?;
        Ok(entries.into_iter().filter(|e| !e.is_module).collect())
    }

    async fn full_view(&self, entry: &ProcessEntry) -> ProcessView {
        let logs = match &entry.out_log_path {
            Some(path) => match logs::read_tail(path, logs::TAIL_LINES).await {
                Ok(tail) => tail,
                Err(e) => {
                    warn!(
                        id = %entry.id,
                        path = %path.display(),
                        error = %e,
                        "Failed to read log tail"
                    );
                    format!("[log unavailable: {e}]")
                }
            },
            None => String::new(),
        };

        ProcessView::full(entry, logs)
    }
}
