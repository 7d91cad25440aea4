//! Core types for the event store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flagtrail_common::{EventType, Tag, DEFAULT_CREATED_BY, SYSTEM_USER_ID};

/// An event as stored in Postgres. Returned by all read methods.
///
/// Rows are immutable: there is no update path, only insert, read, and
/// administrative delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: i64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub created_by: String,
    pub created_by_user_id: i64,
    pub created_at: DateTime<Utc>,
    pub data: Option<serde_json::Value>,
    pub pre_data: Option<serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub feature_name: Option<String>,
    pub project: Option<String>,
    pub environment: Option<String>,
}

/// An event to be appended. The caller builds this; the store assigns
/// `id` and `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default = "default_created_by")]
    pub created_by: String,
    #[serde(default = "default_created_by_user_id")]
    pub created_by_user_id: i64,
    pub data: Option<serde_json::Value>,
    pub pre_data: Option<serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub feature_name: Option<String>,
    pub project: Option<String>,
    pub environment: Option<String>,
}

fn default_created_by() -> String {
    DEFAULT_CREATED_BY.to_string()
}

fn default_created_by_user_id() -> i64 {
    SYSTEM_USER_ID
}

impl BaseEvent {
    pub fn new(event_type: EventType, created_by: impl Into<String>, user_id: i64) -> Self {
        Self {
            event_type,
            created_by: created_by.into(),
            created_by_user_id: user_id,
            data: None,
            pre_data: None,
            tags: Vec::new(),
            feature_name: None,
            project: None,
            environment: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_pre_data(mut self, pre_data: serde_json::Value) -> Self {
        self.pre_data = Some(pre_data);
        self
    }

    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_feature(mut self, feature_name: impl Into<String>) -> Self {
        self.feature_name = Some(feature_name.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }
}

/// Search over the event log. All filters are optional and combine with AND.
#[derive(Debug, Clone)]
pub struct EventSearch {
    /// Exact-match on the event type tag.
    pub event_type: Option<EventType>,
    /// Exact-match on the project.
    pub project: Option<String>,
    /// Exact-match on the feature name.
    pub feature: Option<String>,
    /// Exact-match on the recorded author.
    pub created_by: Option<String>,
    /// Lower bound (inclusive) on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Upper bound (inclusive) on `created_at`.
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive substring match across type, created_by, data and
    /// pre_data (serialized as text).
    pub query: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for EventSearch {
    fn default() -> Self {
        Self {
            event_type: None,
            project: None,
            feature: None,
            created_by: None,
            from: None,
            to: None,
            query: None,
            limit: 100,
            offset: 0,
        }
    }
}

impl EventSearch {
    pub fn with_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = Some(feature.into());
        self
    }

    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn page(mut self, limit: i64, offset: i64) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// Equality-only filter for the fixed-cap read paths.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub event_type: Option<EventType>,
    pub project: Option<String>,
    pub feature_name: Option<String>,
    pub environment: Option<String>,
    pub created_by: Option<String>,
}

/// A page of events plus the total matching count, for paging UIs.
#[derive(Debug, Clone, Serialize)]
pub struct EventList {
    pub events: Vec<StoredEvent>,
    pub total: i64,
}
