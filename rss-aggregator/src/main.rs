use anyhow::Context;
use clap::Parser;
use rss_aggregator::api::{self, AppState};
use rss_aggregator::utils::url::mask_password;
use rss_aggregator::{
    AppConfig, FetchConfig, Fetcher, PgArticleStore, QueryService, RefreshLoop, RssAggregator,
    SourceRegistry,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: failed to load .env: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,rss_aggregator=debug")),
        )
        .init();

    let config = AppConfig::parse();
    info!("Starting Tech News Aggregator");
    info!(
        "Connecting to database: {}{}",
        mask_password(&config.database_url),
        config
            .db_name
            .as_deref()
            .map(|name| format!(" (database {})", name))
            .unwrap_or_default()
    );

    let store = Arc::new(
        PgArticleStore::connect(
            &config.database_url,
            config.db_name.as_deref(),
            config.max_connections,
        )
        .await
        .context("failed to connect to PostgreSQL")?,
    );
    store
        .migrate()
        .await
        .context("failed to run database migrations")?;

    let registry = SourceRegistry::builtin();
    let fetcher = Fetcher::new(FetchConfig::default()).context("failed to build HTTP client")?;

    let aggregator = Arc::new(RssAggregator::new(registry.clone(), fetcher, store.clone()));
    let queries = Arc::new(QueryService::new(store.clone(), registry));

    let refresh = RefreshLoop::spawn(
        aggregator.clone(),
        config.refresh_interval(),
        !config.skip_initial_refresh,
    );

    let app = api::router(AppState::new(aggregator, queries));
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!("Server listening on http://{}", config.bind);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    refresh.shutdown();
    store.close().await;

    if let Err(e) = &served {
        error!("Server error: {}", e);
    }
    served.context("HTTP server failed")?;

    info!("Tech News Aggregator stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
