//! Routes inbound client commands onto process-manager operations.
//!
//! Every mutation that succeeds is followed by exactly one refresh
//! request, so clients see the new state before the next periodic tick.
//! A failed mutation is logged and triggers nothing: there is no error
//! channel to clients, and the next periodic cycle reconverges them.

use std::sync::Arc;

use futures_util::future;
use pmdash_core::ProcessId;
use pmdash_protocol::DashboardCommand;
use tracing::{debug, error, info, warn};

use crate::logs;
use crate::manager::{ManagerError, ProcessManager};
use crate::sync::SyncHandle;

/// The four lifecycle verbs shared by single-target and bulk commands.
#[derive(Debug, Clone, Copy)]
enum Action {
    Start,
    Stop,
    Restart,
    Reset,
}

impl Action {
    fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Reset => "reset",
        }
    }

    async fn apply(
        self,
        manager: &dyn ProcessManager,
        id: ProcessId,
    ) -> Result<(), ManagerError> {
        match self {
            Self::Start => manager.start(id).await,
            Self::Stop => manager.stop(id).await,
            Self::Restart => manager.restart(id).await,
            Self::Reset => manager.reset(id).await,
        }
    }
}

/// Validates and executes dashboard commands.
pub struct CommandDispatcher {
    manager: Arc<dyn ProcessManager>,
    sync: SyncHandle,
}

impl CommandDispatcher {
    /// Creates a dispatcher over the given manager and sync handle.
    pub fn new(manager: Arc<dyn ProcessManager>, sync: SyncHandle) -> Self {
        Self { manager, sync }
    }

    /// Executes one inbound command.
    ///
    /// Never fails from the caller's point of view: every outcome is
    /// logged here, and malformed or unknown commands are dropped.
    pub async fn handle(&self, command: DashboardCommand) {
        match command {
            DashboardCommand::Start { id } => self.single(Action::Start, id).await,
            DashboardCommand::Stop { id } => self.single(Action::Stop, id).await,
            DashboardCommand::Restart { id } => self.single(Action::Restart, id).await,
            DashboardCommand::Reset { id } => self.single(Action::Reset, id).await,
            DashboardCommand::Clear { id } => self.clear_logs(id).await,
            DashboardCommand::StartAll => self.bulk(Action::Start).await,
            DashboardCommand::StopAll => self.bulk(Action::Stop).await,
            DashboardCommand::RestartAll => self.bulk(Action::Restart).await,
            DashboardCommand::ResetAll => self.bulk(Action::Reset).await,
            DashboardCommand::Unknown => {
                debug!("Ignoring unknown dashboard command");
            }
        }
    }

    /// Applies one verb to one process.
    async fn single(&self, action: Action, id: ProcessId) {
        match action.apply(self.manager.as_ref(), id).await {
            Ok(()) => {
                info!(action = action.name(), id = %id, "Process command applied");
                self.sync.request_refresh();
            }
            Err(e) => {
                // No refresh on failure: clients keep the last known
                // state until the next periodic tick.
                error!(
                    action = action.name(),
                    id = %id,
                    error = %e,
                    "Process command failed"
                );
            }
        }
    }

    /// Applies one verb to every dashboard-visible process.
    ///
    /// Sub-operations run concurrently and are logged individually; no
    /// failure aborts the rest. The single trailing refresh is requested
    /// only after every sub-operation has settled.
    async fn bulk(&self, action: Action) {
        let entries = match self.manager.list().await {
            Ok(entries) => entries,
            Err(e) => {
                error!(
                    action = action.name(),
                    error = %e,
                    "Bulk command aborted: process listing failed"
                );
                return;
            }
        };

        let targets: Vec<ProcessId> = entries
            .iter()
            .filter(|e| !e.is_module)
            .map(|e| e.id)
            .collect();

        let results = future::join_all(targets.iter().map(|&id| async move {
            (id, action.apply(self.manager.as_ref(), id).await)
        }))
        .await;

        for (id, result) in results {
            match result {
                Ok(()) => info!(action = action.name(), id = %id, "Process command applied"),
                Err(e) => error!(
                    action = action.name(),
                    id = %id,
                    error = %e,
                    "Process command failed"
                ),
            }
        }

        self.sync.request_refresh();
    }

    /// Truncates both log files of one process.
    ///
    /// The two truncations are attempted independently, so one failing
    /// never blocks the other.
    async fn clear_logs(&self, id: ProcessId) {
        let described = match self.manager.describe(id).await {
            Ok(described) => described,
            Err(e) => {
                error!(id = %id, error = %e, "Clear logs aborted: describe failed");
                return;
            }
        };

        let entry = match described.into_iter().next() {
            Some(entry) => entry,
            None => {
                warn!(id = %id, "Clear logs aborted: process not found");
                return;
            }
        };

        for path in [entry.out_log_path, entry.err_log_path]
            .into_iter()
            .flatten()
        {
            match logs::truncate_log(&path).await {
                Ok(()) => info!(id = %id, path = %path.display(), "Log file cleared"),
                Err(e) => warn!(
                    id = %id,
                    path = %path.display(),
                    error = %e,
                    "Failed to truncate log file"
                ),
            }
        }

        self.sync.request_refresh();
    }
}
