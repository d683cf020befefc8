mod config;
mod db;
mod document;
mod errors;
mod oracle;
mod routes;
mod screening;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::document::extractor::PdfTextExtractor;
use crate::oracle::AnthropicOracle;
use crate::routes::build_router;
use crate::screening::hooks::{
    LogMailer, Mailer, NotificationHook, PersistenceHook, ShortlistHook, WebhookMailer,
};
use crate::screening::pipeline::{BatchPipeline, PipelineOptions, RetryPolicy};
use crate::screening::store::ScreeningStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting screener v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL. An unreachable database only costs the persistence hook.
    let db = create_pool(&config.database_url)?;
    if let Err(e) = ensure_schema(&db).await {
        warn!("Could not prepare shortlist table, inserts will fail until it exists: {e:#}");
    }

    // Initialize oracle client
    let oracle = AnthropicOracle::new(config.anthropic_api_key.clone(), &config.oracle_base_url);
    info!("Oracle client initialized (model: {})", oracle::MODEL);

    let mailer: Arc<dyn Mailer> = match &config.notify_webhook_url {
        Some(url) => {
            info!("Shortlist notifications go to {url}");
            Arc::new(WebhookMailer::new(url.clone()))
        }
        None => {
            info!("NOTIFY_WEBHOOK_URL not set, notifications are logged only");
            Arc::new(LogMailer)
        }
    };

    // Persistence runs before notification
    let hooks: Vec<Arc<dyn ShortlistHook>> = vec![
        Arc::new(PersistenceHook::new(db)),
        Arc::new(NotificationHook::new(mailer)),
    ];

    let pipeline = BatchPipeline::new(
        Arc::new(PdfTextExtractor),
        Arc::new(oracle),
        hooks,
        PipelineOptions {
            concurrency: config.screening_concurrency,
            retry: RetryPolicy::new(config.oracle_max_attempts),
        },
    );
    info!(
        "Pipeline ready (concurrency: {}, oracle attempts: {})",
        config.screening_concurrency, config.oracle_max_attempts
    );

    // Build app state
    let state = AppState {
        pipeline,
        screenings: ScreeningStore::new(config.screening_retention),
    };

    // Build router
    let app = build_router(state, config.max_upload_bytes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
