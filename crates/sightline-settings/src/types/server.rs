//! Network listener and logging settings.

use serde::{Deserialize, Serialize};

/// Server network and connection limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` picks an ephemeral port.
    pub port: u16,
    /// Maximum concurrent stream sessions; further upgrades get 503.
    pub max_connections: usize,
    /// Largest accepted inbound message in bytes.
    pub max_message_size: usize,
    /// Seconds to wait for sessions to drain on shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_connections: 64,
            max_message_size: 16 * 1024 * 1024,
            shutdown_timeout_secs: 10,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit one JSON object per line instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingSettings {
    /// Subscriber format for these settings.
    pub fn format(&self) -> sightline_core::LogFormat {
        if self.json {
            sightline_core::LogFormat::Json
        } else {
            sightline_core::LogFormat::Compact
        }
    }
}
