//! Relay and client configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`), with defaults that match the mobile
//! client's expectations.

use std::net::SocketAddr;
use std::time::Duration;

/// Default port the mobile client connects to.
pub const DEFAULT_PORT: u16 = 5000;

/// Top-level relay server configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address to bind the HTTP/WebSocket server to.
    pub listen_addr: SocketAddr,

    /// Capacity of each connection's outbound queue. Events for a member
    /// whose queue is full are dropped for that member.
    pub outbound_queue_capacity: usize,

    /// Close an older connection when a new one binds the same identity.
    pub evict_stale_connections: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            outbound_queue_capacity: 1024,
            evict_stale_connections: true,
        }
    }
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// `LISTEN_ADDR` wins over `PORT`; with neither set the relay binds
    /// `0.0.0.0:5000`.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as a
    /// [`SocketAddr`], or `PORT` is set but is not a valid port.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr = match (std::env::var("LISTEN_ADDR"), std::env::var("PORT")) {
            (Ok(addr), _) => addr.parse()?,
            (Err(_), Ok(port)) => SocketAddr::from(([0, 0, 0, 0], port.parse::<u16>()?)),
            (Err(_), Err(_)) => defaults.listen_addr,
        };

        let outbound_queue_capacity =
            parse_env("OUTBOUND_QUEUE_CAPACITY", defaults.outbound_queue_capacity).max(1);
        let evict_stale_connections =
            parse_env_bool("RELAY_EVICT_STALE", defaults.evict_stale_connections);

        Ok(Self {
            listen_addr,
            outbound_queue_capacity,
            evict_stale_connections,
        })
    }
}

/// Socket manager configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// WebSocket URL of the relay, e.g. `ws://10.0.2.2:5000/ws`.
    pub url: String,

    /// Automatic reconnection attempts after a drop or failed connect.
    pub reconnect_attempts: u32,

    /// Fixed delay before each reconnection attempt.
    pub reconnect_delay: Duration,
}

impl ClientConfig {
    /// Creates a configuration for `url` with the default reconnection
    /// policy: 5 attempts, 1 second apart.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(1),
        }
    }

    /// Overrides the reconnection policy.
    #[must_use]
    pub fn with_reconnect(mut self, attempts: u32, delay: Duration) -> Self {
        self.reconnect_attempts = attempts;
        self.reconnect_delay = delay;
        self
    }

    /// Loads the client configuration from `RELAY_URL`,
    /// `RELAY_RECONNECT_ATTEMPTS` and `RELAY_RECONNECT_DELAY_MS`.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let url = std::env::var("RELAY_URL")
            .unwrap_or_else(|_| format!("ws://127.0.0.1:{DEFAULT_PORT}/ws"));
        let defaults = Self::new(url);
        let attempts = parse_env("RELAY_RECONNECT_ATTEMPTS", defaults.reconnect_attempts);
        let delay_ms = parse_env("RELAY_RECONNECT_DELAY_MS", 1000u64);
        defaults.with_reconnect(attempts, Duration::from_millis(delay_ms))
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().map(|v| v.to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
