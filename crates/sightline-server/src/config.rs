//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sightline_settings::ServerSettings;

/// Configuration for the Sightline server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent stream sessions; further upgrades get 503.
    pub max_connections: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// How long shutdown waits for sessions to drain.
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// Build from the `server` settings section.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            max_connections: settings.max_connections,
            max_message_size: settings.max_message_size,
            shutdown_timeout_secs: settings.shutdown_timeout_secs,
        }
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Drain timeout as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 64,
            max_message_size: 16 * 1024 * 1024, // 16 MB
            shutdown_timeout_secs: 10,
        }
    }
}
