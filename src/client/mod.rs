//! Client side: the socket manager mobile code drives.
//!
//! A [`SocketManager`] keeps exactly one relay connection per app session,
//! rejoins the participant's rooms after every reconnection, and exposes
//! `on`/`off` subscriptions plus one emit helper per relay event.

pub mod manager;
pub mod state;
pub mod subscription;

pub use manager::SocketManager;
pub use state::ConnectionState;
pub use subscription::{Handler, Subscription, SubscriptionRegistry};
