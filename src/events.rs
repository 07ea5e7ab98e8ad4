use crate::notification::Notification;
use dashmap::DashMap;
use tokio::sync::broadcast;

/// Event key under which signing failures are published.
pub const INVALID_SIGNING_KEY: &str = "InvalidSigningKey";

/// Asynchronous error conditions observable on a client instance.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The gateway rejected a notification with a structured reason.
    Rejected { reason: String, status: u16, notification: Notification },
    /// The provider token could not be signed; sends proceed without a
    /// credential until the key is fixed.
    SigningFailed { detail: String },
}

impl ClientEvent {
    /// The reason string this event is keyed by for scoped subscriptions.
    pub fn key(&self) -> &str {
        match self {
            Self::Rejected { reason, .. } => reason,
            Self::SigningFailed { .. } => INVALID_SIGNING_KEY,
        }
    }
}

/// Per-client observer registry: one catch-all channel plus a lazily created
/// channel per reason key. Lagging or absent subscribers never block emission.
#[derive(Debug)]
pub(crate) struct EventBus {
    all: broadcast::Sender<ClientEvent>,
    by_reason: DashMap<String, broadcast::Sender<ClientEvent>>,
    capacity: usize,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (all, _) = broadcast::channel(capacity);
        Self { all, by_reason: DashMap::new(), capacity }
    }

    pub(crate) fn subscribe_all(&self) -> broadcast::Receiver<ClientEvent> {
        self.all.subscribe()
    }

    pub(crate) fn subscribe(&self, reason: &str) -> broadcast::Receiver<ClientEvent> {
        self.by_reason
            .entry(reason.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        if let Some(tx) = self.by_reason.get(event.key()) {
            let _ = tx.send(event.clone());
        }
        let _ = self.all.send(event);
    }
}
