//! In-process fan-out of stored events.
//!
//! One broadcast channel per event type plus a firehose channel. Notification
//! is fire-and-forget: a send with no live receivers is dropped, a lagging
//! receiver misses events. The bus never feeds back into the write path.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;

use flagtrail_common::EventType;

use crate::types::StoredEvent;

const CHANNEL_CAPACITY: usize = 256;

pub struct EventBus {
    by_type: RwLock<HashMap<EventType, broadcast::Sender<StoredEvent>>>,
    all: broadcast::Sender<StoredEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (all, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            by_type: RwLock::new(HashMap::new()),
            all,
        }
    }

    /// Receiver for events of one type. The channel is created on first
    /// subscription and kept for the lifetime of the bus.
    pub fn subscribe(&self, event_type: EventType) -> broadcast::Receiver<StoredEvent> {
        let mut by_type = self.by_type.write().expect("event bus lock poisoned");
        by_type
            .entry(event_type)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Receiver for every stored event regardless of type.
    pub fn subscribe_all(&self) -> broadcast::Receiver<StoredEvent> {
        self.all.subscribe()
    }

    /// Deliver an event to subscribers. Never blocks, never errors.
    pub fn notify(&self, event: &StoredEvent) {
        // SendError just means nobody is listening.
        let _ = self.all.send(event.clone());

        let by_type = self.by_type.read().expect("event bus lock poisoned");
        if let Some(sender) = by_type.get(&event.event_type) {
            let _ = sender.send(event.clone());
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
