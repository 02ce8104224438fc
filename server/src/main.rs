//! Cashdesk Server Binary
//!
//! Serves the Cashdesk RPC surface over HTTP.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cashdesk_ledger::{LedgerStore, MemoryStore, PgStore};
use cashdesk_server::{rpc, Cashdesk, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::from_env();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting Cashdesk server");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let store: Arc<dyn LedgerStore> = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.max_connections).await?;
            store.run_migrations().await?;
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory store, data will not survive restart");
            Arc::new(MemoryStore::new())
        }
    };

    let cashdesk = Cashdesk::new(store, &config.admin)?;
    cashdesk.bootstrap().await?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(
        listen_addr = %config.listen_addr,
        listen_port = %config.listen_port,
        "Cashdesk server running"
    );

    axum::serve(listener, rpc::router(cashdesk))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Cashdesk server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
