//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup before any metrics are recorded; a second install
/// fails because a global recorder is already set.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// WebSocket sessions opened total (counter, labels: mode).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket sessions closed total (counter, labels: reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket sessions (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// WebSocket session lifetime seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Upgrades refused at the connection limit (counter).
pub const WS_SESSIONS_REJECTED_TOTAL: &str = "ws_sessions_rejected_total";
/// Frames accepted into the pipeline (counter, labels: source).
pub const FRAMES_RECEIVED_TOTAL: &str = "frames_received_total";
/// Frames that produced a response (counter).
pub const FRAMES_PROCESSED_TOTAL: &str = "frames_processed_total";
/// Frames dropped without a response (counter, labels: reason).
pub const FRAMES_SKIPPED_TOTAL: &str = "frames_skipped_total";
/// Per-stage frame latency seconds (histogram, labels: stage).
pub const FRAME_STAGE_DURATION_SECONDS: &str = "frame_stage_duration_seconds";
/// One-shot `/detect` requests (counter, labels: status).
pub const DETECT_REQUESTS_TOTAL: &str = "detect_requests_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_render() {
        // no global install, so tests do not conflict
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = render(&handle);
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTION_DURATION_SECONDS,
            WS_SESSIONS_REJECTED_TOTAL,
            FRAMES_RECEIVED_TOTAL,
            FRAMES_PROCESSED_TOTAL,
            FRAMES_SKIPPED_TOTAL,
            FRAME_STAGE_DURATION_SECONDS,
            DETECT_REQUESTS_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
