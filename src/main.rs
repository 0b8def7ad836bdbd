//! zycare-relay server entry point.
//!
//! Starts the Axum HTTP server with the `/ws` relay endpoint and the REST
//! introspection endpoints.

use tracing_subscriber::EnvFilter;

use zycare_relay::app_state::AppState;
use zycare_relay::config::RelayConfig;
use zycare_relay::server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = RelayConfig::from_env()?;
    tracing::info!(
        addr = %config.listen_addr,
        queue_capacity = config.outbound_queue_capacity,
        evict_stale = config.evict_stale_connections,
        "starting zycare-relay"
    );

    // Registry and relay live for the whole process
    let state = AppState::new(&config);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    server::serve(listener, state).await?;

    Ok(())
}
