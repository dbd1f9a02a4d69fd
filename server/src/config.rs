//! Runtime configuration shared by the registry, orchestrator and supervisor

use std::time::Duration;

/// Tunables for one server process.
///
/// The defaults are what the binary runs with when no flags are given; tests
/// shrink the intervals so whole sessions finish in milliseconds.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `host:port` the accept loop binds to.
    pub bind_addr: String,
    /// How long binding may take before the accept task gives up.
    pub bind_timeout: Duration,
    /// Gap between keepalive `PING` lines on every registered connection.
    pub keepalive_interval: Duration,
    /// Waiting-room poll period, also the length of one countdown tick.
    pub poll_interval: Duration,
    /// Bound on how long the supervisor waits for cancelled tasks.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:12345".to_string(),
            bind_timeout: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(2),
            poll_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}
