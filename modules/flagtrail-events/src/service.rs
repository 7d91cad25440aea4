//! Service layer fronting the store: user-facing search parameters, paged
//! listings, and per-feature change history.

use anyhow::Result;
use chrono::NaiveDate;
use serde::Deserialize;

use flagtrail_common::{EventType, FlagtrailError};
use flagtrail_diff::{diff, render, render_payload};

use crate::store::EventStore;
use crate::types::{BaseEvent, EventFilter, EventList, EventSearch, StoredEvent};

/// Search parameters as they arrive from the outside world. Dates are plain
/// `YYYY-MM-DD` strings; the type tag is its wire form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub query: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub project: Option<String>,
    pub feature: Option<String>,
    pub created_by: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl SearchParams {
    /// Validate and convert into the store's search shape. `from` marks the
    /// start of its day, `to` the end of its day.
    pub fn into_search(self) -> std::result::Result<EventSearch, FlagtrailError> {
        let event_type = self
            .event_type
            .as_deref()
            .map(str::parse::<EventType>)
            .transpose()?;

        let from = self
            .from
            .as_deref()
            .map(|s| parse_date(s).map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc()))
            .transpose()?;
        let to = self
            .to
            .as_deref()
            .map(|s| parse_date(s).map(end_of_day))
            .transpose()?;

        Ok(EventSearch {
            event_type,
            project: self.project,
            feature: self.feature,
            created_by: self.created_by,
            from,
            to,
            query: self.query,
            limit: self.limit.unwrap_or(100).clamp(1, 1000),
            offset: self.offset.unwrap_or(0).max(0),
        })
    }
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, FlagtrailError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| FlagtrailError::Validation(format!("invalid date: {s}")))
}

fn end_of_day(d: NaiveDate) -> chrono::DateTime<chrono::Utc> {
    let last_instant = chrono::NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
        .expect("valid clock time");
    d.and_time(last_instant).and_utc()
}

/// One event in a feature's history, with its rendered change lines.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HistoryEntry {
    pub event: StoredEvent,
    pub changes: Vec<String>,
}

pub struct EventService {
    store: EventStore,
}

impl EventService {
    pub fn new(store: EventStore) -> Self {
        Self { store }
    }

    pub fn event_store(&self) -> &EventStore {
        &self.store
    }

    /// The most recent events (store cap of 100) plus the total count.
    pub async fn list_events(&self) -> Result<EventList> {
        let total = self.store.count().await?;
        let events = self.store.get_events(&EventFilter::default()).await;
        Ok(EventList { events, total })
    }

    /// Recent events narrowed by equality filters, plus the total count of
    /// the whole log.
    pub async fn list_filtered(&self, filter: &EventFilter) -> Result<EventList> {
        let total = self.store.count().await?;
        let events = self.store.get_events(filter).await;
        Ok(EventList { events, total })
    }

    /// Full search: validates the params, then returns the page and the
    /// total match count.
    pub async fn search(&self, params: SearchParams) -> Result<EventList, FlagtrailError> {
        let search = params.into_search()?;
        let total = self
            .store
            .search_events_count(&search)
            .await
            .map_err(|e| FlagtrailError::Database(e.to_string()))?;
        let events = self.store.search_events(&search).await;
        Ok(EventList { events, total })
    }

    pub async fn record(&self, event: BaseEvent) {
        self.store.store(event).await;
    }

    pub async fn record_batch(&self, events: Vec<BaseEvent>) {
        self.store.batch_store(events).await;
    }

    /// A feature's events, newest first, each with rendered change lines:
    /// the structural diff of `pre_data` against `data` when both are
    /// present, otherwise the pretty-printed payload.
    pub async fn feature_history(&self, feature_name: &str) -> Vec<HistoryEntry> {
        let filter = EventFilter {
            feature_name: Some(feature_name.to_string()),
            ..EventFilter::default()
        };

        self.store
            .get_events(&filter)
            .await
            .into_iter()
            .map(|event| {
                let changes = match (&event.pre_data, &event.data) {
                    (Some(pre), Some(data)) => render(&diff(pre, data)),
                    (None, Some(data)) => vec![render_payload(data)],
                    (Some(pre), None) => vec![render_payload(pre)],
                    (None, None) => Vec::new(),
                };
                HistoryEntry { event, changes }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_params_convert_dates_to_day_bounds() {
        let params = SearchParams {
            from: Some("2024-03-01".to_string()),
            to: Some("2024-03-02".to_string()),
            ..SearchParams::default()
        };

        let search = params.into_search().unwrap();
        assert_eq!(
            search.from.unwrap().to_rfc3339(),
            "2024-03-01T00:00:00+00:00"
        );
        assert_eq!(
            search.to.unwrap().to_rfc3339(),
            "2024-03-02T23:59:59.999999+00:00"
        );
    }

    #[test]
    fn search_params_reject_bad_date() {
        let params = SearchParams {
            from: Some("03/01/2024".to_string()),
            ..SearchParams::default()
        };

        assert!(params.into_search().is_err());
    }

    #[test]
    fn search_params_reject_unknown_type() {
        let params = SearchParams {
            event_type: Some("feature-exploded".to_string()),
            ..SearchParams::default()
        };

        assert!(params.into_search().is_err());
    }

    #[test]
    fn search_params_parse_known_type() {
        let params = SearchParams {
            event_type: Some("feature-strategy-update".to_string()),
            ..SearchParams::default()
        };

        let search = params.into_search().unwrap();
        assert_eq!(search.event_type, Some(EventType::FeatureStrategyUpdate));
    }

    #[test]
    fn search_params_default_and_clamp_paging() {
        let search = SearchParams::default().into_search().unwrap();
        assert_eq!(search.limit, 100);
        assert_eq!(search.offset, 0);

        let search = SearchParams {
            limit: Some(100_000),
            offset: Some(-5),
            ..SearchParams::default()
        }
        .into_search()
        .unwrap();
        assert_eq!(search.limit, 1000);
        assert_eq!(search.offset, 0);
    }
}
