//! Relay service: decodes client frames, routes them, and fans them out.

use std::sync::Arc;

use crate::domain::routing::{self, Delivery, Route};
use crate::domain::{ClientEvent, ConnectionId, Identity, RoomRegistry};
use crate::error::RelayError;

/// What happened to one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The sender was bound to an identity.
    Bound {
        /// Identity now held by the sender.
        identity: Identity,
        /// Older connections closed because they held the same identity.
        evicted: Vec<ConnectionId>,
    },
    /// The event was fanned out.
    Relayed {
        /// Number of member deliveries queued, across all target rooms.
        deliveries: usize,
    },
}

/// Stateless coordinator between the socket layer and the
/// [`RoomRegistry`].
///
/// Holds no business logic: every event goes through the fixed routing
/// table in [`crate::domain::routing`] and the resulting deliveries are
/// handed to the registry.
#[derive(Debug, Clone)]
pub struct RelayService {
    registry: Arc<RoomRegistry>,
}

impl RelayService {
    /// Creates a new `RelayService` over the given registry.
    #[must_use]
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Returns a reference to the inner [`RoomRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Decodes one text frame from `from` and dispatches it.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::MalformedFrame`] if the text is not a known
    /// event, or any error from [`RelayService::dispatch`].
    pub async fn handle_frame(
        &self,
        from: ConnectionId,
        text: &str,
    ) -> Result<RelayOutcome, RelayError> {
        let event: ClientEvent = serde_json::from_str(text)?;
        self.dispatch(from, event).await
    }

    /// Routes one event from `from`.
    ///
    /// Join events bind the sender; everything else is delivered to the
    /// rooms the routing table names. Rooms without members are skipped
    /// silently.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Unroutable`] if the event names no resolvable
    /// target, or [`RelayError::ConnectionNotFound`] if a join arrives for a
    /// connection that is already gone.
    pub async fn dispatch(
        &self,
        from: ConnectionId,
        event: ClientEvent,
    ) -> Result<RelayOutcome, RelayError> {
        let name = event.name();
        match routing::route(event) {
            Route::Bind(identity) => {
                let evicted = self.registry.bind(from, identity.clone()).await?;
                for stale in &evicted {
                    tracing::info!(connection_id = %stale, %identity, "evicted stale connection");
                }
                tracing::info!(connection_id = %from, %identity, "joined rooms");
                Ok(RelayOutcome::Bound { identity, evicted })
            }
            Route::Deliver(deliveries) => {
                let delivered = self.relay(&deliveries).await;
                tracing::debug!(connection_id = %from, event = name, rooms = deliveries.len(), delivered, "relayed");
                Ok(RelayOutcome::Relayed {
                    deliveries: delivered,
                })
            }
            Route::Reject(reason) => Err(RelayError::Unroutable {
                event: name,
                reason,
            }),
        }
    }

    /// Delivers routed events to the current members of their rooms.
    ///
    /// At-most-once per member; later joiners get nothing.
    pub async fn relay(&self, deliveries: &[Delivery]) -> usize {
        self.registry.deliver_all(deliveries).await
    }
}
