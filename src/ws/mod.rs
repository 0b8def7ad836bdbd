//! WebSocket layer: upgrade handling and the per-connection loop.
//!
//! The endpoint at `/ws` carries JSON event frames in both directions.
//! Routing is done by [`crate::service::RelayService`].

pub mod connection;
pub mod handler;
