//! Domain layer: identities, rooms, wire events and the routing table.
//!
//! This module holds the server-side relay model: connection and
//! participant identity, room naming, the typed event payloads, the fixed
//! routing table, and the room registry that owns all membership state.

pub mod connection_id;
pub mod event;
pub mod participant;
pub mod payload;
pub mod room;
pub mod room_registry;
pub mod routing;

pub use connection_id::ConnectionId;
pub use event::{CLOSE_REPLACED, ClientEvent, ServerEvent, ServerEventKind};
pub use participant::{Identity, ParticipantId, Role};
pub use room::RoomName;
pub use room_registry::{ConnectionInfo, RoomRegistry, RoomSummary};
pub use routing::{Delivery, Route};
