//! Schema setup for the event log. Idempotent; `--reset` drops first.

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flagtrail-migrate", about = "Create or reset the flagtrail schema")]
struct Args {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Drop the events table before recreating it. Destroys the audit log.
    #[arg(long)]
    reset: bool,
}

const CREATE_EVENTS: &str = r#"
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
"#;

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_events_type ON events (type)",
    "CREATE INDEX IF NOT EXISTS idx_events_project ON events (project)",
    "CREATE INDEX IF NOT EXISTS idx_events_feature_name ON events (feature_name)",
    "CREATE INDEX IF NOT EXISTS idx_events_created_at ON events (created_at DESC)",
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("flagtrail=info".parse()?))
        .init();

    let args = Args::parse();

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&args.database_url)
        .await?;

    if args.reset {
        sqlx::query("DROP TABLE IF EXISTS events")
            .execute(&pool)
            .await?;
        info!("Dropped events table");
    }

    sqlx::query(CREATE_EVENTS).execute(&pool).await?;
    for statement in CREATE_INDEXES {
        sqlx::query(statement).execute(&pool).await?;
    }

    info!("Schema is up to date");
    Ok(())
}
