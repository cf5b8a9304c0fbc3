//! Delta fan-out to every connected viewer.
//!
//! A single `tokio::sync::broadcast` channel carries cell deltas. Each viewer
//! holds its own receiver, so per-connection order equals publish order. A
//! viewer that falls more than `capacity` events behind observes
//! `RecvError::Lagged` and must resynchronize from a fresh snapshot.

use crate::protocol::ServerEvent;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct Fanout {
    tx: broadcast::Sender<Arc<ServerEvent>>,
}

impl Fanout {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a delta. Returns how many viewers will receive it.
    pub fn publish(&self, event: ServerEvent) -> usize {
        debug_assert!(event.is_delta(), "only deltas go through the fan-out");
        // No receivers is not an error: nobody is watching.
        self.tx.send(Arc::new(event)).unwrap_or(0)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ServerEvent>> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn viewer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
