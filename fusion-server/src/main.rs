use anyhow::Context;
use fusion_events::{HttpRevalidator, PipelineCatalog, RegenerationTrigger, ScriptDispatcher};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod repository;

use config::ServerConfig;
use repository::{PgContentSource, PgPipelineRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fusion_server=debug,fusion_events=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Fusion event dispatcher...");

    let config = ServerConfig::from_env()?;

    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    // Run migrations
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let catalog = Arc::new(PipelineCatalog::new(Arc::new(PgPipelineRepository::new(
        pool.clone(),
    ))));
    let dispatcher = Arc::new(ScriptDispatcher::new(catalog.clone(), &config.events));
    let revalidator = HttpRevalidator::from_config(&config.events)
        .context("Failed to build revalidation client")?;
    let trigger = Arc::new(RegenerationTrigger::new(
        &config.events,
        Arc::new(revalidator),
        Arc::new(PgContentSource::new(pool)),
    ));

    tracing::info!(
        revalidate_url = %config.events.revalidate_url,
        script_timeout_ms = config.events.script_timeout.as_millis() as u64,
        "Side-effect dispatcher ready"
    );

    // Build router with all API endpoints
    let app = api::create_router(api::AppState {
        catalog,
        dispatcher,
        trigger,
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
