//! # zycare-relay
//!
//! Real-time event relay between doctors and patients of the ZYCARE
//! telehealth app, plus the client-side socket manager the app drives.
//!
//! The relay is a thin room-based publish/subscribe layer over WebSocket:
//! a client emits a named event, the relay looks it up in a fixed routing
//! table and re-emits it to the members of one or more rooms. There is no
//! persistence, no replay and no acknowledgement.
//!
//! ## Architecture
//!
//! ```text
//! SocketManager (client/)            REST (api/)
//!     │  JSON frames over /ws            │
//!     ▼                                  │
//! WS Handler (ws/) ──────────────────────┤
//!     │                                  │
//!     ├── RelayService (service/)        │
//!     │       └── routing table (domain/)│
//!     │                                  │
//!     └── RoomRegistry (domain/) ◀───────┘
//!             rooms ─▶ connections ─▶ outbound queues
//! ```

pub mod api;
pub mod app_state;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod service;
pub mod ws;
