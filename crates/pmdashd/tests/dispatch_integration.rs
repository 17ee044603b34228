//! End-to-end tests for command handling: inbound frame → dispatcher →
//! manager mutation → on-demand resync → broadcast.
//!
//! The periodic cadence is set far out (60s) so every broadcast after
//! the startup pair is attributable to a command.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::Message;
use pmdash_core::{ProcessEntry, ProcessId};
use pmdash_protocol::DashboardCommand;
use pmdashd::dispatch::CommandDispatcher;
use pmdashd::hub::{BroadcastHub, CLIENT_CHANNEL_CAPACITY};
use pmdashd::manager::{ManagerError, ProcessManager};
use pmdashd::snapshot::SnapshotReader;
use pmdashd::sync::SyncScheduler;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// Periodic cadence pushed out of the way of the tests.
const SLOW_TICK: Duration = Duration::from_secs(60);

/// Maximum time to wait for an expected broadcast.
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Time to wait when asserting that nothing arrives.
const QUIET_PERIOD: Duration = Duration::from_millis(150);

// ============================================================================
// Test Helpers
// ============================================================================

/// Stateful in-memory manager: mutations change the listing the next
/// sync will observe, like a real process manager.
struct LiveManager {
    entries: Mutex<Vec<ProcessEntry>>,
    fail_all: bool,
}

impl LiveManager {
    fn new(entries: Vec<ProcessEntry>) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(entries),
            fail_all: false,
        })
    }

    fn rejecting(entries: Vec<ProcessEntry>) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(entries),
            fail_all: true,
        })
    }

    fn set_status(&self, id: ProcessId, status: &str) -> Result<(), ManagerError> {
        if self.fail_all {
            return Err(ManagerError::Parse("mutation rejected".to_string()));
        }
        let mut entries = self.entries.lock().unwrap();
        for entry in entries.iter_mut() {
            if entry.id == id {
                entry.status = status.to_string();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessManager for LiveManager {
    async fn list(&self) -> Result<Vec<ProcessEntry>, ManagerError> {
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn start(&self, id: ProcessId) -> Result<(), ManagerError> {
        self.set_status(id, "online")
    }

    async fn stop(&self, id: ProcessId) -> Result<(), ManagerError> {
        self.set_status(id, "stopped")
    }

    async fn restart(&self, id: ProcessId) -> Result<(), ManagerError> {
        if self.fail_all {
            return Err(ManagerError::Parse("mutation rejected".to_string()));
        }
        let mut entries = self.entries.lock().unwrap();
        for entry in entries.iter_mut() {
            if entry.id == id {
                entry.restarts += 1;
                entry.status = "online".to_string();
            }
        }
        Ok(())
    }

    async fn reset(&self, id: ProcessId) -> Result<(), ManagerError> {
        if self.fail_all {
            return Err(ManagerError::Parse("mutation rejected".to_string()));
        }
        let mut entries = self.entries.lock().unwrap();
        for entry in entries.iter_mut() {
            if entry.id == id {
                entry.restarts = 0;
            }
        }
        Ok(())
    }

    async fn describe(&self, id: ProcessId) -> Result<Vec<ProcessEntry>, ManagerError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.iter().filter(|e| e.id == id).cloned().collect())
    }
}

fn entry(id: u32, name: &str) -> ProcessEntry {
    ProcessEntry {
        id: ProcessId::new(id),
        name: name.to_string(),
        exec_mode: "fork_mode".to_string(),
        instance: None,
        status: "online".to_string(),
        restarts: 1,
        uptime_start: None,
        cpu_percent: 0.0,
        memory_bytes: 0,
        out_log_path: None,
        err_log_path: None,
        is_module: false,
    }
}

/// The full command path: one subscriber, slow periodic ticks.
struct TestStack {
    dispatcher: CommandDispatcher,
    rx: mpsc::Receiver<Message>,
    cancel_token: CancellationToken,
}

impl TestStack {
    async fn spawn(manager: Arc<LiveManager>) -> Self {
        let hub = BroadcastHub::new();
        let reader = SnapshotReader::new(manager.clone() as Arc<dyn ProcessManager>);
        let cancel_token = CancellationToken::new();

        let (tx, rx) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);
        hub.subscribe(tx).await;

        let sync_handle = SyncScheduler::spawn(
            reader,
            hub.clone(),
            SLOW_TICK,
            SLOW_TICK,
            cancel_token.clone(),
        );
        let dispatcher =
            CommandDispatcher::new(manager as Arc<dyn ProcessManager>, sync_handle);

        let mut stack = Self {
            dispatcher,
            rx,
            cancel_token,
        };
        stack.drain_startup().await;
        stack
    }

    /// Consumes the immediate first full + state broadcasts.
    async fn drain_startup(&mut self) {
        let _ = self.recv_json().await;
        let _ = self.recv_json().await;
    }

    async fn recv_json(&mut self) -> serde_json::Value {
        let message = timeout(RECV_TIMEOUT, self.rx.recv())
            .await
            .expect("timed out waiting for broadcast")
            .expect("broadcast channel closed");

        match message {
            Message::Text(text) => serde_json::from_str(&text).expect("parse envelope"),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    async fn assert_quiet(&mut self) {
        let quiet = timeout(QUIET_PERIOD, self.rx.recv()).await;
        assert!(quiet.is_err(), "unexpected broadcast");
    }
}

impl Drop for TestStack {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_stop_command_end_to_end() {
    let manager = LiveManager::new(vec![
        entry(3, "api"),
        {
            let mut m = entry(7, "pm2-logrotate");
            m.is_module = true;
            m
        },
    ]);
    let mut stack = TestStack::spawn(manager).await;

    // The raw frame a dashboard client would send.
    let command = DashboardCommand::parse(r#"{"type":"stop","id":3}"#).unwrap();
    stack.dispatcher.handle(command).await;

    let update = stack.recv_json().await;
    assert_eq!(update["type"], "update");

    let data = update["data"].as_array().expect("data array");
    // Instrumentation entry is excluded; process 3 reflects the stop.
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], 3);
    assert_eq!(data[0]["status"], "stopped");
}

#[tokio::test]
async fn test_successful_restart_broadcasts_updated_counter() {
    let manager = LiveManager::new(vec![entry(3, "api")]);
    let mut stack = TestStack::spawn(manager).await;

    stack
        .dispatcher
        .handle(DashboardCommand::Restart {
            id: ProcessId::new(3),
        })
        .await;

    let update = stack.recv_json().await;
    assert_eq!(update["type"], "update");
    assert_eq!(update["data"][0]["restart"], 2);

    // Exactly one broadcast for one command.
    stack.assert_quiet().await;
}

#[tokio::test]
async fn test_failed_command_broadcasts_nothing() {
    let manager = LiveManager::rejecting(vec![entry(3, "api")]);
    let mut stack = TestStack::spawn(manager).await;

    stack
        .dispatcher
        .handle(DashboardCommand::Restart {
            id: ProcessId::new(3),
        })
        .await;

    // Clients keep the last-known state until the next periodic tick.
    stack.assert_quiet().await;
}

#[tokio::test]
async fn test_bulk_stop_updates_every_visible_process() {
    let manager = LiveManager::new(vec![entry(0, "api"), entry(1, "worker")]);
    let mut stack = TestStack::spawn(manager).await;

    stack.dispatcher.handle(DashboardCommand::StopAll).await;

    let update = stack.recv_json().await;
    let data = update["data"].as_array().expect("data array");
    assert_eq!(data.len(), 2);
    assert!(data.iter().all(|view| view["status"] == "stopped"));

    stack.assert_quiet().await;
}

#[tokio::test]
async fn test_unknown_frame_is_dropped_without_broadcast() {
    let manager = LiveManager::new(vec![entry(0, "api")]);
    let mut stack = TestStack::spawn(manager).await;

    let command = DashboardCommand::parse(r#"{"type":"reboot-universe"}"#).unwrap();
    stack.dispatcher.handle(command).await;

    stack.assert_quiet().await;
}
