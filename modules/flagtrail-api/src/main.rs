use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use flagtrail_common::Config;
use flagtrail_events::{EventService, EventStore};

mod rest;

pub struct AppState {
    pub events: EventService,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("flagtrail=info".parse()?))
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    let state = Arc::new(AppState {
        events: EventService::new(EventStore::new(pool)),
    });

    let app = Router::new()
        .route("/health", get(rest::health))
        .route(
            "/api/events",
            get(rest::api_events).post(rest::api_store_event),
        )
        .route("/api/events/{id}", get(rest::api_event_detail))
        .route("/api/search/events", get(rest::api_search_events))
        .route(
            "/api/features/{feature}/history",
            get(rest::api_feature_history),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!(addr = %addr, "Starting flagtrail API");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
