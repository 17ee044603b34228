//! pmdash Daemon - Process-manager polling and snapshot broadcast server
//!
//! This crate provides the core infrastructure for the pmdash daemon:
//! - `manager` / `pm2` - the process-manager port and its pm2 CLI client
//! - `logs` - best-effort log tail reads and truncation
//! - `snapshot` - shaping manager listings into client-facing views
//! - `hub` - the subscriber set and snapshot fan-out
//! - `sync` - periodic and on-demand sync scheduling
//! - `dispatch` - inbound client commands mapped onto manager operations
//! - `server` - the WebSocket endpoint clients connect to
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       pmdashd daemon                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌───────────────┐  ticks  ┌────────────────┐    list()    │
//! │  │ SyncScheduler │────────▶│ SnapshotReader │───────────┐  │
//! │  └───────▲───────┘         └───────┬────────┘           │  │
//! │          │ refresh                 │ views              ▼  │
//! │  ┌───────┴───────────┐     ┌───────▼──────┐     ┌─────────┐│
//! │  │ CommandDispatcher │     │ BroadcastHub │     │ process ││
//! │  └───────▲───────────┘     └───────┬──────┘     │ manager ││
//! │          │ commands                │ envelopes  └────▲────┘│
//! │  ┌───────┴────────────────────────▼────────┐  mutations│  │
//! │  │       DashboardServer (WebSocket)       │───────────┘  │
//! │  └─────────────────────────────────────────┘              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate avoids `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, and `todo!()`. Failures in the polling
//! and dispatch paths are caught and logged; nothing short of startup
//! failure takes the daemon down.

pub mod dispatch;
pub mod hub;
pub mod logs;
pub mod manager;
pub mod pm2;
pub mod server;
pub mod snapshot;
pub mod sync;
