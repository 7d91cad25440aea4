//! Append-only audit log for feature-flag changes.
//!
//! Every mutating action in the system is recorded as an immutable event
//! row in Postgres. The store assigns ids and timestamps; consumers read
//! pages back through equality filters or free-text search, and in-process
//! subscribers get notified per event type after each successful write.

pub mod bus;
pub mod service;
pub mod store;
pub mod types;

pub use bus::EventBus;
pub use service::{EventService, HistoryEntry, SearchParams};
pub use store::EventStore;
pub use types::{BaseEvent, EventFilter, EventList, EventSearch, StoredEvent};
