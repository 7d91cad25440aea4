//! EventStore — append-only audit log backed by Postgres.
//!
//! The store exclusively owns persistence: callers hand over a `BaseEvent`
//! and the database assigns `id` (BIGSERIAL, strictly increasing in insert
//! order) and `created_at`. Rows are immutable once written; the only
//! destructive operations are the administrative deletes.

use std::sync::Arc;

use anyhow::Result;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::warn;

use flagtrail_common::EventType;

use crate::bus::EventBus;
use crate::types::{BaseEvent, EventFilter, EventSearch, StoredEvent};

const EVENT_COLUMNS: &str = "id, type, created_by, created_by_user_id, created_at, \
     data, pre_data, tags, feature_name, project, environment";

/// Hard cap on the fixed read paths, matching `search_events`' default page.
const GET_EVENTS_CAP: i64 = 100;

/// Append-only event store. The audit log's single source of truth.
#[derive(Clone)]
pub struct EventStore {
    pool: PgPool,
    bus: Arc<EventBus>,
}

impl EventStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            bus: Arc::new(EventBus::new()),
        }
    }

    /// Share one bus across stores (e.g. a transactional store instance).
    pub fn with_bus(pool: PgPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Append one event. On success, subscribers keyed by the event's type
    /// are notified fire-and-forget. A persistence failure is logged and the
    /// event is dropped; callers must not assume the write was durable.
    pub async fn store(&self, event: BaseEvent) {
        match self.insert_one(&event).await {
            Ok(stored) => self.bus.notify(&stored),
            Err(e) => {
                warn!(error = %e, event_type = %event.event_type, "Failed to store event");
            }
        }
    }

    /// Append a batch in one insert. Subscribers are notified per event only
    /// after the whole batch is written. An empty batch is a no-op: no rows,
    /// no notifications.
    pub async fn batch_store(&self, events: Vec<BaseEvent>) {
        if events.is_empty() {
            return;
        }
        match self.insert_batch(&events).await {
            Ok(stored) => {
                for event in &stored {
                    self.bus.notify(event);
                }
            }
            Err(e) => {
                warn!(error = %e, count = events.len(), "Failed to store event batch");
            }
        }
    }

    /// A page of events matching `search`, newest first (`created_at` with
    /// `id` as tiebreaker). Returns an empty page on a failed query.
    pub async fn search_events(&self, search: &EventSearch) -> Vec<StoredEvent> {
        match self.try_search_events(search).await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Event search failed");
                Vec::new()
            }
        }
    }

    /// Total number of rows matching the same filter set as `search_events`.
    pub async fn search_events_count(&self, search: &EventSearch) -> Result<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM events WHERE TRUE");
        push_search_filters(&mut qb, search);
        let (count,): (i64,) = qb.build_query_as().fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Equality-filtered fetch, newest first, capped at 100 rows. Returns an
    /// empty list rather than an error on a failed query.
    pub async fn get_events(&self, filter: &EventFilter) -> Vec<StoredEvent> {
        match self.try_get_events(filter).await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Event fetch failed");
                Vec::new()
            }
        }
    }

    pub async fn get_all(&self, filter: &EventFilter) -> Vec<StoredEvent> {
        self.get_events(filter).await
    }

    /// Read a single event by id.
    pub async fn get(&self, id: i64) -> Result<Option<StoredEvent>> {
        let row = sqlx::query_as::<_, StoredEvent>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn exists(&self, id: i64) -> Result<bool> {
        let (present,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM events WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Ok(present)
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// The latest assigned event id, or 0 if the table is empty. Pollers use
    /// this as a cheap revision cursor.
    pub async fn latest_revision_id(&self) -> Result<i64> {
        let (max,): (Option<i64>,) = sqlx::query_as("SELECT MAX(id) FROM events")
            .fetch_one(&self.pool)
            .await?;

        Ok(max.unwrap_or(0))
    }

    /// Administrative/test-only hard delete.
    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Administrative/test-only hard delete of every event.
    pub async fn delete_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM events").execute(&self.pool).await?;

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn insert_one(&self, event: &BaseEvent) -> Result<StoredEvent> {
        let stored = sqlx::query_as::<_, StoredEvent>(&format!(
            r#"
            INSERT INTO events (type, created_by, created_by_user_id, data, pre_data, tags, feature_name, project, environment)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(event.event_type.as_str())
        .bind(&event.created_by)
        .bind(event.created_by_user_id)
        .bind(&event.data)
        .bind(&event.pre_data)
        .bind(tags_to_json(event))
        .bind(&event.feature_name)
        .bind(&event.project)
        .bind(&event.environment)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn insert_batch(&self, events: &[BaseEvent]) -> Result<Vec<StoredEvent>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO events (type, created_by, created_by_user_id, data, pre_data, tags, feature_name, project, environment) ",
        );
        qb.push_values(events, |mut b, event| {
            b.push_bind(event.event_type.as_str())
                .push_bind(&event.created_by)
                .push_bind(event.created_by_user_id)
                .push_bind(&event.data)
                .push_bind(&event.pre_data)
                .push_bind(tags_to_json(event))
                .push_bind(&event.feature_name)
                .push_bind(&event.project)
                .push_bind(&event.environment);
        });
        qb.push(format!(" RETURNING {EVENT_COLUMNS}"));

        let stored = qb
            .build_query_as::<StoredEvent>()
            .fetch_all(&self.pool)
            .await?;

        Ok(stored)
    }

    async fn try_search_events(&self, search: &EventSearch) -> Result<Vec<StoredEvent>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE TRUE"
        ));
        push_search_filters(&mut qb, search);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(search.limit);
        qb.push(" OFFSET ");
        qb.push_bind(search.offset);

        let events = qb
            .build_query_as::<StoredEvent>()
            .fetch_all(&self.pool)
            .await?;

        Ok(events)
    }

    async fn try_get_events(&self, filter: &EventFilter) -> Result<Vec<StoredEvent>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE TRUE"
        ));
        if let Some(event_type) = filter.event_type {
            qb.push(" AND type = ").push_bind(event_type.as_str());
        }
        if let Some(project) = &filter.project {
            qb.push(" AND project = ").push_bind(project);
        }
        if let Some(feature_name) = &filter.feature_name {
            qb.push(" AND feature_name = ").push_bind(feature_name);
        }
        if let Some(environment) = &filter.environment {
            qb.push(" AND environment = ").push_bind(environment);
        }
        if let Some(created_by) = &filter.created_by {
            qb.push(" AND created_by = ").push_bind(created_by);
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(GET_EVENTS_CAP);

        let events = qb
            .build_query_as::<StoredEvent>()
            .fetch_all(&self.pool)
            .await?;

        Ok(events)
    }
}

fn push_search_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, search: &'a EventSearch) {
    if let Some(event_type) = search.event_type {
        qb.push(" AND type = ").push_bind(event_type.as_str());
    }
    if let Some(project) = &search.project {
        qb.push(" AND project = ").push_bind(project);
    }
    if let Some(feature) = &search.feature {
        qb.push(" AND feature_name = ").push_bind(feature);
    }
    if let Some(created_by) = &search.created_by {
        qb.push(" AND created_by = ").push_bind(created_by);
    }
    if let Some(from) = search.from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = search.to {
        qb.push(" AND created_at <= ").push_bind(to);
    }
    if let Some(query) = &search.query {
        let pattern = format!("%{query}%");
        qb.push(" AND (type ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR created_by ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR data::text ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR pre_data::text ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn tags_to_json(event: &BaseEvent) -> serde_json::Value {
    serde_json::to_value(&event.tags).unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
}

// ---------------------------------------------------------------------------
// sqlx::FromRow for StoredEvent
// ---------------------------------------------------------------------------

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredEvent {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;

        let type_str: String = row.try_get("type")?;
        let event_type = type_str
            .parse::<EventType>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "type".to_string(),
                source: Box::new(e),
            })?;

        let tags: Option<serde_json::Value> = row.try_get("tags")?;
        let tags = tags
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "tags".to_string(),
                source: Box::new(e),
            })?
            .unwrap_or_default();

        Ok(StoredEvent {
            id: row.try_get("id")?,
            event_type,
            created_by: row.try_get("created_by")?,
            created_by_user_id: row.try_get("created_by_user_id")?,
            created_at: row.try_get("created_at")?,
            data: row.try_get("data")?,
            pre_data: row.try_get("pre_data")?,
            tags,
            feature_name: row.try_get("feature_name")?,
            project: row.try_get("project")?,
            environment: row.try_get("environment")?,
        })
    }
}
