//! popera-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use popera_gateway::api;
use popera_gateway::app_state::{AppState, Stores};
use popera_gateway::config::{GatewayConfig, LogFormat, StoreBackend};
use popera_gateway::domain::{BlogStore, CounterStore, EventBus, ReservationStore};
use popera_gateway::persistence::PostgresStore;
use popera_gateway::service::spawn_counter_sweeper;

/// Upper bound on a single request, including confirmation polling.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
    tracing::info!(
        addr = %config.listen_addr,
        backend = ?config.store_backend,
        "starting popera-gateway"
    );

    // Build store layer
    let changefeed = EventBus::new(config.event_bus_capacity);
    let stores = match config.store_backend {
        StoreBackend::Memory => Stores::memory(config.store_read_lag, changefeed),
        StoreBackend::Postgres => {
            let store = PostgresStore::connect(
                &config.database_url,
                config.database_max_connections,
                Duration::from_secs(config.database_connect_timeout_secs),
                changefeed,
            )
            .await
            .context("connecting to postgres")?;
            store.migrate().await.context("running migrations")?;
            let store = Arc::new(store);
            Stores {
                reservations: Arc::clone(&store) as Arc<dyn ReservationStore>,
                blog: Arc::clone(&store) as Arc<dyn BlogStore>,
                counters: store as Arc<dyn CounterStore>,
            }
        }
    };

    let _sweeper = spawn_counter_sweeper(
        Arc::clone(&stores.counters),
        config.counter_sweep_interval,
    );

    // Build application state
    let app_state = AppState::new(stores, &config).context("building application state")?;
    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN is unset; admin endpoints will reject every request");
    }

    // Build router
    let app = api::build_router()
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
