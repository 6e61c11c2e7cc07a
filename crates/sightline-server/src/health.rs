//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Live stream sessions.
    pub connections: usize,
    /// Whether the pull-mode `/live` endpoint is available.
    pub capture_enabled: bool,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, capture_enabled: bool) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        capture_enabled,
    }
}
