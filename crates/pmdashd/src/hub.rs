//! Subscriber set and snapshot fan-out.
//!
//! Each connected dashboard client registers an outbound channel; the
//! hub serializes a snapshot envelope once and pushes the identical
//! payload to every subscriber. A subscriber whose channel has closed is
//! treated as disconnected and removed, without affecting delivery to
//! the rest.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::Message;
use pmdash_protocol::SnapshotEnvelope;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, warn};

/// Identifies one subscriber for the lifetime of its connection.
pub type SubscriberId = u64;

/// Outbound queue depth per subscriber.
pub const CLIENT_CHANNEL_CAPACITY: usize = 32;

type SubscriberMap = Arc<RwLock<HashMap<SubscriberId, mpsc::Sender<Message>>>>;

/// Fan-out hub for snapshot broadcasts.
///
/// Cheap to clone; all clones share one subscriber set.
#[derive(Clone)]
pub struct BroadcastHub {
    subscribers: SubscriberMap,
    counter: Arc<AtomicU64>,
}

impl BroadcastHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Registers a subscriber's outbound channel and returns its id.
    pub async fn subscribe(&self, sender: mpsc::Sender<Message>) -> SubscriberId {
        let id = self.counter.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().await.insert(id, sender);
        debug!(subscriber = id, "Subscriber added");
        id
    }

    /// Removes a subscriber (connection closed).
    pub async fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.write().await.remove(&id).is_some() {
            debug!(subscriber = id, "Subscriber removed");
        }
    }

    /// Returns the number of connected subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Serializes the envelope once and sends it to every subscriber.
    ///
    /// A subscriber with a full queue skips this snapshot (the next one
    /// supersedes it anyway); a subscriber whose channel has closed is
    /// removed as an implicit disconnect. Neither affects the others.
    pub async fn broadcast(&self, envelope: &SnapshotEnvelope) {
        let json = match serde_json::to_string(envelope) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Failed to serialize snapshot envelope");
                return;
            }
        };

        let subscribers: Vec<(SubscriberId, mpsc::Sender<Message>)> = self
            .subscribers
            .read()
            .await
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect();

        let mut closed = Vec::new();
        for (id, sender) in subscribers {
            match sender.try_send(Message::Text(json.clone())) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber = id, "Subscriber queue full, skipping snapshot");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(subscriber = id, "Subscriber channel closed during broadcast");
                    closed.push(id);
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in closed {
                subscribers.remove(&id);
                debug!(subscriber = id, "Removed disconnected subscriber");
            }
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> SnapshotEnvelope {
        SnapshotEnvelope::state(Vec::new())
    }

    fn text(message: Message) -> String {
        match message {
            Message::Text(text) => text,
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let hub = BroadcastHub::new();
        let (tx1, mut rx1) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);
        let (tx2, mut rx2) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);
        let (tx3, mut rx3) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);

        hub.subscribe(tx1).await;
        hub.subscribe(tx2).await;
        hub.subscribe(tx3).await;

        hub.broadcast(&envelope()).await;

        let a = text(rx1.recv().await.unwrap());
        let b = text(rx2.recv().await.unwrap());
        let c = text(rx3.recv().await.unwrap());

        // Byte-identical payloads
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(a.contains("\"type\":\"statepm2\""));
    }

    #[tokio::test]
    async fn test_closed_subscriber_removed_others_delivered() {
        let hub = BroadcastHub::new();
        let (tx1, rx1) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);
        let (tx2, mut rx2) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);

        hub.subscribe(tx1).await;
        hub.subscribe(tx2).await;
        drop(rx1);

        hub.broadcast(&envelope()).await;

        assert!(rx2.recv().await.is_some());
        assert_eq!(hub.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let hub = BroadcastHub::new();
        let (tx, mut rx) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);

        let id = hub.subscribe(tx).await;
        assert_eq!(hub.subscriber_count().await, 1);

        hub.unsubscribe(id).await;
        assert_eq!(hub.subscriber_count().await, 0);

        hub.broadcast(&envelope()).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_queue_skips_without_removal() {
        let hub = BroadcastHub::new();
        let (tx, mut rx) = mpsc::channel(1);

        hub.subscribe(tx).await;
        hub.broadcast(&envelope()).await;
        // Queue is now full; this snapshot is skipped for the subscriber.
        hub.broadcast(&envelope()).await;

        assert_eq!(hub.subscriber_count().await, 1);
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }
}
