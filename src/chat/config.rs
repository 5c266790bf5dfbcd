/// Server configuration — passed explicitly into the listener, never a
/// process-wide global.
use std::time::Duration;

/// Default bind endpoint.
pub const DEFAULT_BIND: &str = "127.0.0.1:55555";

/// Runtime configuration for the chat server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to, `host:port`.
    pub bind_addr: String,
    /// If set, a session with no traffic for this long is closed.
    /// Covers the handshake read too, so a client that connects and
    /// never names itself does not occupy a task forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            idle_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Build a config from the environment.
    ///
    /// - `CHARLA_BIND` — bind address (default `127.0.0.1:55555`)
    /// - `CHARLA_IDLE_TIMEOUT_SECS` — idle timeout in seconds (default off)
    pub fn from_env() -> Self {
        let bind_addr =
            std::env::var("CHARLA_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
        let idle_timeout = std::env::var("CHARLA_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);
        Self {
            bind_addr,
            idle_timeout,
        }
    }
}
