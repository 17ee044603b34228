//! Outbound snapshot envelopes pushed to subscribed clients.

use pmdash_core::ProcessView;
use serde::{Deserialize, Serialize};

/// A typed snapshot pushed unsolicited on every sync cycle.
///
/// Wire shape: `{"type": "update", "data": [...]}` for the full snapshot
/// (views carry uptime and tailed logs), `{"type": "statepm2", "data":
/// [...]}` for the lightweight state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum SnapshotEnvelope {
    /// Full snapshot, including tailed log output
    Update(Vec<ProcessView>),

    /// State-only snapshot for the high-frequency refresh
    #[serde(rename = "statepm2")]
    State(Vec<ProcessView>),
}

impl SnapshotEnvelope {
    /// Wraps a full snapshot.
    pub fn update(views: Vec<ProcessView>) -> Self {
        Self::Update(views)
    }

    /// Wraps a state-only snapshot.
    pub fn state(views: Vec<ProcessView>) -> Self {
        Self::State(views)
    }

    /// The views carried by either variant.
    pub fn views(&self) -> &[ProcessView] {
        match self {
            Self::Update(views) | Self::State(views) => views,
        }
    }
}
