//! REST surface over the event service.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::warn;

use flagtrail_common::FlagtrailError;
use flagtrail_events::{BaseEvent, EventFilter, SearchParams};

use crate::AppState;

// --- Query structs ---

#[derive(Deserialize)]
pub struct EventsQuery {
    project: Option<String>,
    feature: Option<String>,
}

// --- Helpers ---

fn error_response(err: &FlagtrailError) -> axum::response::Response {
    let status = match err {
        FlagtrailError::Validation(_) => StatusCode::BAD_REQUEST,
        FlagtrailError::NotFound(_) => StatusCode::NOT_FOUND,
        FlagtrailError::Database(_) | FlagtrailError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(serde_json::json!({
            "name": err.name(),
            "message": err.to_string(),
        })),
    )
        .into_response()
}

// --- Handlers ---

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "health": "GOOD" }))
}

pub async fn api_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> impl IntoResponse {
    let filter = EventFilter {
        project: params.project,
        feature_name: params.feature,
        ..EventFilter::default()
    };

    match state.events.list_filtered(&filter).await {
        Ok(list) => Json(list).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to list events");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_search_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    match state.events.search(params).await {
        Ok(list) => Json(list).into_response(),
        Err(e) => {
            if matches!(e, FlagtrailError::Database(_)) {
                warn!(error = %e, "Event search failed");
            }
            error_response(&e)
        }
    }
}

pub async fn api_event_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.events.event_store().get(id).await {
        Ok(Some(event)) => Json(serde_json::json!({ "event": event })).into_response(),
        Ok(None) => error_response(&FlagtrailError::NotFound(format!("event {id}"))),
        Err(e) => {
            warn!(error = %e, id, "Failed to load event");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_feature_history(
    State(state): State<Arc<AppState>>,
    Path(feature): Path<String>,
) -> impl IntoResponse {
    let history = state.events.feature_history(&feature).await;
    Json(serde_json::json!({
        "feature": feature,
        "history": history,
    }))
}

/// Ingest one event. Acceptance is not a durability guarantee: the store
/// drops (and logs) events that fail to persist.
pub async fn api_store_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<BaseEvent>,
) -> impl IntoResponse {
    state.events.record(event).await;
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "accepted" })),
    )
}
