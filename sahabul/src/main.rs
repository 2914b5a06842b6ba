//! Booking service entry point.
//!
//! Loads configuration, connects the Postgres event store, wires the
//! aggregates, and serves the HTTP API with graceful shutdown.

use anyhow::{Context, Result};
use sahabul::auth::StaticSessionVerifier;
use sahabul::bootstrap;
use sahabul::config::Config;
use sahabul::payment_gateway::{HttpPaymentGateway, MockPaymentGateway, PaymentGateway};
use sahabul::server::build_router;
use sahabul_postgres::PostgresEventStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    init_logger(&config)?;

    if let Some(port) = config.server.metrics_port {
        bootstrap::install_metrics_exporter(port)?;
    }

    let event_store = PostgresEventStore::connect(&config.postgres.url)
        .await
        .context("connecting event store")?;
    event_store.migrate().await.context("migrating event store")?;

    let gateway: Arc<dyn PaymentGateway> = match &config.payments.gateway_base_url {
        Some(base_url) => {
            tracing::info!(base_url = %base_url, "Using HTTP payment gateway");
            Arc::new(HttpPaymentGateway::new(base_url.clone()))
        },
        None => {
            tracing::warn!("No gateway configured; using the sandbox gateway");
            Arc::new(MockPaymentGateway::new())
        },
    };

    let verifier = Arc::new(StaticSessionVerifier::from_env());

    let state = bootstrap::build(&config, Arc::new(event_store), gateway, verifier).await?;
    let ledger = Arc::clone(&state.ledger);
    let shutdown_timeout = std::time::Duration::from_secs(config.server.shutdown_timeout);

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("parsing bind address")?;
    let listener = TcpListener::bind(addr).await.context("binding listener")?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    // Drain in-flight effects (pending appends, refund calls) before exit
    if let Err(error) = ledger.shutdown(shutdown_timeout).await {
        tracing::error!(error = %error, "Shutdown drained incompletely");
    }

    Ok(())
}

fn init_logger(config: &Config) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone()));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_target(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .context("initializing tracing subscriber")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
