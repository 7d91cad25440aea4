//! Integration tests for EventStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use std::time::Duration;

use serde_json::json;
use sqlx::PgPool;
use tokio::time::timeout;

use flagtrail_common::{EventType, Tag};
use flagtrail_events::{BaseEvent, EventFilter, EventSearch, EventStore};

static DB_LOCK: std::sync::OnceLock<std::sync::Arc<tokio::sync::Mutex<()>>> =
    std::sync::OnceLock::new();

/// Get a test database pool, or skip if no test DB is available. Tests share
/// one table and truncate it, so the guard serializes them.
async fn test_pool() -> Option<(tokio::sync::OwnedMutexGuard<()>, PgPool)> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let guard = DB_LOCK
        .get_or_init(|| std::sync::Arc::new(tokio::sync::Mutex::new(())))
        .clone()
        .lock_owned()
        .await;
    let pool = PgPool::connect(&url).await.ok()?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id                  BIGSERIAL    PRIMARY KEY,
            type                TEXT         NOT NULL,
            created_by          TEXT         NOT NULL,
            created_by_user_id  BIGINT       NOT NULL,
            created_at          TIMESTAMPTZ  NOT NULL DEFAULT now(),
            data                JSONB,
            pre_data            JSONB,
            tags                JSONB        NOT NULL DEFAULT '[]'::jsonb,
            feature_name        TEXT,
            project             TEXT,
            environment         TEXT
        )
        "#,
    )
    .execute(&pool)
    .await
    .ok()?;

    // Clean slate for each test
    sqlx::query("TRUNCATE events RESTART IDENTITY")
        .execute(&pool)
        .await
        .ok()?;

    Some((guard, pool))
}

fn feature_created(feature: &str, project: &str) -> BaseEvent {
    BaseEvent::new(EventType::FeatureCreated, "test-user", 1)
        .with_feature(feature)
        .with_project(project)
        .with_data(json!({"name": feature, "enabled": false}))
}

// =========================================================================
// Append behavior
// =========================================================================

#[tokio::test]
async fn store_assigns_increasing_ids_and_timestamps() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);

    for i in 0..5 {
        store
            .store(feature_created(&format!("feature-{i}"), "default"))
            .await;
    }

    // Newest first; reverse to insertion order.
    let mut events = store.get_events(&EventFilter::default()).await;
    events.reverse();
    assert_eq!(events.len(), 5);

    for window in events.windows(2) {
        assert!(window[0].id < window[1].id);
        assert!(window[0].created_at <= window[1].created_at);
    }
}

#[tokio::test]
async fn store_assigns_created_at_never_the_caller() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);

    // BaseEvent has no created_at field at all; assert the store filled one in.
    store.store(feature_created("my-feature", "default")).await;

    let events = store.get_events(&EventFilter::default()).await;
    assert_eq!(events.len(), 1);
    assert!(events[0].created_at.timestamp() > 0);
}

#[tokio::test]
async fn stored_event_round_trips_payloads_and_tags() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);

    let event = BaseEvent::new(EventType::FeatureStrategyUpdate, "alice", 7)
        .with_feature("checkout-redesign")
        .with_project("web")
        .with_environment("production")
        .with_data(json!({"rollout": 75}))
        .with_pre_data(json!({"rollout": 50}))
        .with_tags(vec![Tag::new("simple", "beta")]);

    store.store(event).await;

    let events = store.get_events(&EventFilter::default()).await;
    let stored = &events[0];
    assert_eq!(stored.event_type, EventType::FeatureStrategyUpdate);
    assert_eq!(stored.created_by, "alice");
    assert_eq!(stored.created_by_user_id, 7);
    assert_eq!(stored.data, Some(json!({"rollout": 75})));
    assert_eq!(stored.pre_data, Some(json!({"rollout": 50})));
    assert_eq!(stored.tags, vec![Tag::new("simple", "beta")]);
    assert_eq!(stored.feature_name.as_deref(), Some("checkout-redesign"));
    assert_eq!(stored.project.as_deref(), Some("web"));
    assert_eq!(stored.environment.as_deref(), Some("production"));
}

#[tokio::test]
async fn store_notifies_typed_subscriber() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);
    let mut rx = store.bus().subscribe(EventType::FeatureCreated);

    store.store(feature_created("my-feature", "default")).await;

    let received = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("notification should arrive")
        .unwrap();
    assert_eq!(received.event_type, EventType::FeatureCreated);
    assert_eq!(received.feature_name.as_deref(), Some("my-feature"));
    assert!(received.id > 0);
}

#[tokio::test]
async fn batch_store_writes_all_then_notifies_each() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);
    let mut rx = store.bus().subscribe_all();

    store
        .batch_store(vec![
            feature_created("a", "default"),
            feature_created("b", "default"),
            feature_created("c", "default"),
        ])
        .await;

    assert_eq!(store.count().await.unwrap(), 3);

    for _ in 0..3 {
        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("notification should arrive")
            .unwrap();
        assert!(event.id > 0);
    }
}

#[tokio::test]
async fn batch_store_empty_is_a_no_op() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);
    let mut rx = store.bus().subscribe_all();

    store.batch_store(Vec::new()).await;

    assert_eq!(store.count().await.unwrap(), 0);
    assert!(matches!(
        rx.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}

// =========================================================================
// Search
// =========================================================================

#[tokio::test]
async fn search_by_type_returns_only_that_type_newest_first() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);

    store.store(feature_created("a", "default")).await;
    store
        .store(BaseEvent::new(EventType::ProjectCreated, "test-user", 1).with_project("default"))
        .await;
    store.store(feature_created("b", "default")).await;

    let search = EventSearch::default().with_type(EventType::FeatureCreated);
    let events = store.search_events(&search).await;

    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|e| e.event_type == EventType::FeatureCreated));
    for window in events.windows(2) {
        assert!(window[0].created_at >= window[1].created_at);
        assert!(window[0].id > window[1].id);
    }
}

#[tokio::test]
async fn search_by_project_and_feature_are_exact_matches() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);

    store.store(feature_created("a", "web")).await;
    store.store(feature_created("b", "web")).await;
    store.store(feature_created("a", "mobile")).await;

    let by_project = store
        .search_events(&EventSearch::default().with_project("web"))
        .await;
    assert_eq!(by_project.len(), 2);

    let by_feature = store
        .search_events(&EventSearch::default().with_feature("a"))
        .await;
    assert_eq!(by_feature.len(), 2);

    let both = store
        .search_events(
            &EventSearch::default()
                .with_project("web")
                .with_feature("a"),
        )
        .await;
    assert_eq!(both.len(), 1);

    // Substrings must not match.
    let partial = store
        .search_events(&EventSearch::default().with_project("we"))
        .await;
    assert!(partial.is_empty());
}

#[tokio::test]
async fn search_query_matches_substring_case_insensitively() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);

    store
        .store(
            BaseEvent::new(EventType::FeatureCreated, "test-user", 1)
                .with_data(json!({"id": "Some-Other-Feature"})),
        )
        .await;
    store
        .store(
            BaseEvent::new(EventType::FeatureCreated, "test-user", 1)
                .with_data(json!({"id": "my-feature"})),
        )
        .await;

    let events = store
        .search_events(&EventSearch::default().with_query("some-other"))
        .await;

    assert_eq!(events.len(), 1);
    let matched = &events[0];
    let haystack = format!(
        "{}{}{}{}",
        matched.event_type,
        matched.created_by,
        matched.data.clone().unwrap_or_default(),
        matched.pre_data.clone().unwrap_or_default(),
    );
    assert!(haystack.to_lowercase().contains("some-other"));
}

#[tokio::test]
async fn search_query_matches_pre_data_and_created_by() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);

    store
        .store(
            BaseEvent::new(EventType::FeatureStrategyUpdate, "deploy-bot", 2)
                .with_pre_data(json!({"rollout": "gradual-50"})),
        )
        .await;
    store
        .store(BaseEvent::new(EventType::FeatureCreated, "alice", 3).with_data(json!({"x": 1})))
        .await;

    let by_pre_data = store
        .search_events(&EventSearch::default().with_query("gradual"))
        .await;
    assert_eq!(by_pre_data.len(), 1);

    let by_author = store
        .search_events(&EventSearch::default().with_query("DEPLOY-BOT"))
        .await;
    assert_eq!(by_author.len(), 1);
}

#[tokio::test]
async fn search_combines_query_with_exact_filters() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);

    store
        .store(feature_created("a", "web").with_data(json!({"note": "shared-term"})))
        .await;
    store
        .store(feature_created("b", "mobile").with_data(json!({"note": "shared-term"})))
        .await;

    let events = store
        .search_events(
            &EventSearch::default()
                .with_query("shared-term")
                .with_project("mobile"),
        )
        .await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].project.as_deref(), Some("mobile"));
}

#[tokio::test]
async fn search_pagination_and_count() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);

    let batch: Vec<BaseEvent> = (0..10)
        .map(|i| feature_created(&format!("feature-{i}"), "default"))
        .collect();
    store.batch_store(batch).await;

    let search = EventSearch::default().page(4, 0);
    let page1 = store.search_events(&search).await;
    assert_eq!(page1.len(), 4);

    let page3 = store.search_events(&EventSearch::default().page(4, 8)).await;
    assert_eq!(page3.len(), 2);

    let total = store
        .search_events_count(&EventSearch::default())
        .await
        .unwrap();
    assert_eq!(total, 10);

    // Pages are disjoint and keep the newest-first order across boundaries.
    let page2 = store.search_events(&EventSearch::default().page(4, 4)).await;
    assert!(page1.last().unwrap().id > page2.first().unwrap().id);
}

#[tokio::test]
async fn search_date_bounds_filter_created_at() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);

    store.store(feature_created("a", "default")).await;

    let far_future = EventSearch {
        from: Some(chrono::Utc::now() + chrono::Duration::days(1)),
        ..EventSearch::default()
    };
    assert!(store.search_events(&far_future).await.is_empty());

    let open_window = EventSearch {
        from: Some(chrono::Utc::now() - chrono::Duration::days(1)),
        to: Some(chrono::Utc::now() + chrono::Duration::days(1)),
        ..EventSearch::default()
    };
    assert_eq!(store.search_events(&open_window).await.len(), 1);
}

#[tokio::test]
async fn search_count_matches_filtered_set() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);

    store.store(feature_created("a", "web")).await;
    store.store(feature_created("b", "mobile")).await;
    store.store(feature_created("c", "web")).await;

    let search = EventSearch::default().with_project("web");
    assert_eq!(store.search_events_count(&search).await.unwrap(), 2);
    assert_eq!(store.search_events(&search).await.len(), 2);
}

// =========================================================================
// Fixed-cap reads and point lookups
// =========================================================================

#[tokio::test]
async fn get_events_caps_at_one_hundred_rows() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);

    let batch: Vec<BaseEvent> = (0..120)
        .map(|i| feature_created(&format!("feature-{i}"), "default"))
        .collect();
    store.batch_store(batch).await;

    let events = store.get_events(&EventFilter::default()).await;
    assert_eq!(events.len(), 100);

    // The cap keeps the newest rows.
    let latest = store.latest_revision_id().await.unwrap();
    assert_eq!(events[0].id, latest);
}

#[tokio::test]
async fn get_events_equality_filters_combine() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);

    store.store(feature_created("a", "web")).await;
    store
        .store(
            BaseEvent::new(EventType::FeatureEnvironmentEnabled, "alice", 1)
                .with_feature("a")
                .with_project("web")
                .with_environment("production"),
        )
        .await;

    let filter = EventFilter {
        environment: Some("production".to_string()),
        created_by: Some("alice".to_string()),
        ..EventFilter::default()
    };
    let events = store.get_events(&filter).await;
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].event_type,
        EventType::FeatureEnvironmentEnabled
    );
}

#[tokio::test]
async fn get_and_exists_by_id() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);

    store.store(feature_created("a", "default")).await;
    let id = store.latest_revision_id().await.unwrap();

    let fetched = store.get(id).await.unwrap().unwrap();
    assert_eq!(fetched.id, id);
    assert!(store.exists(id).await.unwrap());

    assert!(store.get(id + 1).await.unwrap().is_none());
    assert!(!store.exists(id + 1).await.unwrap());
}

#[tokio::test]
async fn latest_revision_id_is_zero_on_empty_log() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);

    assert_eq!(store.latest_revision_id().await.unwrap(), 0);
}

// =========================================================================
// Administrative deletes
// =========================================================================

#[tokio::test]
async fn delete_removes_a_single_event() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);

    store.store(feature_created("a", "default")).await;
    store.store(feature_created("b", "default")).await;
    let id = store.latest_revision_id().await.unwrap();

    store.delete(id).await.unwrap();

    assert!(!store.exists(id).await.unwrap());
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn delete_all_empties_the_log() {
    let Some((_guard, pool)) = test_pool().await else {
        return;
    };
    let store = EventStore::new(pool);

    store
        .batch_store(vec![
            feature_created("a", "default"),
            feature_created("b", "default"),
        ])
        .await;

    store.delete_all().await.unwrap();

    assert_eq!(store.count().await.unwrap(), 0);
    assert!(store
        .search_events(&EventSearch::default())
        .await
        .is_empty());
}
