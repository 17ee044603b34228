//! Sync scheduling: two periodic snapshot ticks plus on-demand refreshes.
//!
//! The scheduler owns both snapshot cadences and processes every sync on
//! one task, so invocations are serialized: a slow cycle can never
//! publish its result over a newer one. Command handlers request an
//! immediate full sync through the [`SyncHandle`]; requests arriving
//! while one is already queued are coalesced.

use std::time::Duration;

use pmdash_protocol::SnapshotEnvelope;
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::hub::BroadcastHub;
use crate::snapshot::SnapshotReader;

/// Default cadence of the full snapshot (views with log tails).
pub const DEFAULT_FULL_SYNC_INTERVAL: Duration = Duration::from_millis(1500);

/// Default cadence of the lightweight state snapshot.
pub const DEFAULT_STATE_SYNC_INTERVAL: Duration = Duration::from_millis(1500);

/// Queue depth for on-demand refresh requests. One slot is enough: a
/// pending refresh already covers any request made before it runs.
const REFRESH_QUEUE: usize = 1;

/// Requests an immediate full sync from the scheduler.
///
/// Cheap to clone; handed to the command dispatcher.
#[derive(Clone)]
pub struct SyncHandle {
    refresh_tx: mpsc::Sender<()>,
}

impl SyncHandle {
    pub(crate) fn new(refresh_tx: mpsc::Sender<()>) -> Self {
        Self { refresh_tx }
    }

    /// Asks the scheduler to run a full sync-and-broadcast now, without
    /// touching the periodic timers.
    ///
    /// Never blocks: if a refresh is already queued it absorbs this
    /// request, and if the scheduler is gone the request is dropped.
    pub fn request_refresh(&self) {
        let _ = self.refresh_tx.try_send(());
    }
}

/// Drives the periodic and on-demand sync cycles.
pub struct SyncScheduler {
    reader: SnapshotReader,
    hub: BroadcastHub,
    full_interval: Duration,
    state_interval: Duration,
    refresh_rx: mpsc::Receiver<()>,
    cancel_token: CancellationToken,
}

impl SyncScheduler {
    /// Creates a scheduler with explicit cadences, returning it together
    /// with the handle command handlers use to request refreshes.
    pub fn new(
        reader: SnapshotReader,
        hub: BroadcastHub,
        full_interval: Duration,
        state_interval: Duration,
        cancel_token: CancellationToken,
    ) -> (Self, SyncHandle) {
        let (refresh_tx, refresh_rx) = mpsc::channel(REFRESH_QUEUE);
        let scheduler = Self {
            reader,
            hub,
            full_interval,
            state_interval,
            refresh_rx,
            cancel_token,
        };
        (scheduler, SyncHandle::new(refresh_tx))
    }

    /// Creates and spawns a scheduler on a background task.
    pub fn spawn(
        reader: SnapshotReader,
        hub: BroadcastHub,
        full_interval: Duration,
        state_interval: Duration,
        cancel_token: CancellationToken,
    ) -> SyncHandle {
        let (scheduler, handle) = Self::new(reader, hub, full_interval, state_interval, cancel_token);
        tokio::spawn(scheduler.run());
        handle
    }

    /// Runs the scheduling loop until cancelled.
    ///
    /// Both intervals fire immediately on startup, which doubles as the
    /// initial push to any already-connected client.
    pub async fn run(mut self) {
        let mut full_tick = interval(self.full_interval);
        let mut state_tick = interval(self.state_interval);

        info!(
            full_interval_ms = self.full_interval.as_millis() as u64,
            state_interval_ms = self.state_interval.as_millis() as u64,
            "Sync scheduler started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => {
                    info!("Sync scheduler shutting down");
                    break;
                }

                Some(()) = self.refresh_rx.recv() => {
                    self.full_sync().await;
                }

                _ = full_tick.tick() => {
                    self.full_sync().await;
                }

                _ = state_tick.tick() => {
                    self.state_sync().await;
                }
            }
        }
    }

    /// One full sync-and-broadcast cycle.
    ///
    /// A failed listing skips the cycle entirely: no broadcast, clients
    /// keep the last snapshot until the next successful cycle.
    async fn full_sync(&self) {
        match self.reader.build_full().await {
            Ok(views) => self.hub.broadcast(&SnapshotEnvelope::update(views)).await,
            Err(e) => {
                warn!(error = %e, "Skipping full sync cycle: process listing failed");
            }
        }
    }

    /// One state-only sync-and-broadcast cycle.
    async fn state_sync(&self) {
        match self.reader.build_state().await {
            Ok(views) => self.hub.broadcast(&SnapshotEnvelope::state(views)).await,
            Err(e) => {
                warn!(error = %e, "Skipping state sync cycle: process listing failed");
            }
        }
    }
}
