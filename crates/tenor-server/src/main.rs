//! Tenor Server Binary
//!
//! Fixed-rate, fixed-term lending ledger behind a REST API

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tenor_ledger::{LedgerService, StaticPriceOracle, SystemClock};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tenor_server::{
    api::{self, AppState},
    build_engine,
    config::TenorConfig,
    SERVER_VERSION,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting Tenor ledger server v{}", SERVER_VERSION);

    // Load configuration
    let config = TenorConfig::load()?;
    info!(
        markets = config.markets.len(),
        queue_capacity = config.ledger.queue_capacity,
        "Loaded configuration"
    );

    // Build the engine and hand it to the ledger service
    let oracle = Arc::new(StaticPriceOracle::new());
    let engine = build_engine(&config, oracle.clone(), Arc::new(SystemClock))?;
    let (ledger, service_task) = LedgerService::spawn(engine, config.ledger.queue_capacity);

    let app = api::router(AppState { ledger, oracle });

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("REST API listening on {}", addr);

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for shutdown signal");
        }
        info!("Received shutdown signal");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    // Router dropped: the last handle is gone and the service drains
    let engine = service_task.await?;
    info!(
        consistent = engine.state().is_consistent(),
        "Shutting down Tenor ledger server"
    );
    Ok(())
}
