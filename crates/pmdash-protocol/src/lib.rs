//! pmdash Protocol - Wire protocol for the dashboard channel
//!
//! This crate provides the message types exchanged over the persistent
//! client channel: inbound control commands and outbound snapshot
//! envelopes.

pub mod command;
pub mod envelope;

pub use command::DashboardCommand;
pub use envelope::SnapshotEnvelope;
