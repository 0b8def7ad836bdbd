//! Service layer: orchestrates routing and delivery over the registry.

pub mod relay_service;

pub use relay_service::{RelayOutcome, RelayService};
