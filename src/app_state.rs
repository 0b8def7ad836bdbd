//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::domain::RoomRegistry;
use crate::service::RelayService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Relay service for routing socket events.
    pub relay: Arc<RelayService>,
    /// Room registry, shared with the relay service.
    pub registry: Arc<RoomRegistry>,
    /// Capacity of each new connection's outbound queue.
    pub outbound_queue_capacity: usize,
}

impl AppState {
    /// Builds the state for one server process: a fresh registry and the
    /// relay service over it.
    #[must_use]
    pub fn new(config: &RelayConfig) -> Self {
        let registry = Arc::new(RoomRegistry::with_eviction(
            config.evict_stale_connections,
        ));
        let relay = Arc::new(RelayService::new(Arc::clone(&registry)));
        Self {
            relay,
            registry,
            outbound_queue_capacity: config.outbound_queue_capacity,
        }
    }
}
