//! # sightline
//!
//! Sightline server binary: loads settings, builds the detector, and serves
//! the frame-streaming endpoints until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sightline_core::{DetectionThreshold, ResponseMode};
use sightline_server::{CaptureConfig, FramePipeline, PipelineConfig, ServerConfig, SightlineServer};
use sightline_settings::SightlineSettings;

/// Sightline frame-streaming server.
#[derive(Parser, Debug)]
#[command(name = "sightline", about = "Stream frames, detect objects, return annotations")]
struct Cli {
    /// Settings file (defaults to `~/.sightline/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Confidence cutoff for reported detections, 0.0-1.0.
    #[arg(long, value_parser = parse_threshold)]
    threshold: Option<DetectionThreshold>,

    /// `image_with_detections` or `detections_only`.
    #[arg(long)]
    response_mode: Option<ResponseMode>,

    /// ONNX model path; selects the onnx backend.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Capture source for `/live`; enables pull mode.
    #[arg(long)]
    capture_source: Option<String>,

    /// Maximum concurrent WebSocket sessions.
    #[arg(long)]
    max_connections: Option<usize>,

    /// Log level filter (`RUST_LOG` wins when set).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

fn parse_threshold(raw: &str) -> std::result::Result<DetectionThreshold, String> {
    let value: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    DetectionThreshold::new(value).ok_or_else(|| format!("{value} is outside 0.0-1.0"))
}

impl Cli {
    /// Apply flags on top of the loaded settings. Flags are the highest layer.
    fn apply(self, settings: &mut SightlineSettings) {
        if let Some(host) = self.host {
            settings.server.host = host;
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(max) = self.max_connections {
            settings.server.max_connections = max;
        }
        if let Some(threshold) = self.threshold {
            settings.pipeline.confidence_threshold = threshold;
        }
        if let Some(mode) = self.response_mode {
            settings.pipeline.response_mode = mode;
        }
        if let Some(model) = self.model {
            settings.detector.backend = sightline_settings::DetectorBackend::Onnx;
            settings.detector.model_path = Some(model.to_string_lossy().into_owned());
        }
        if let Some(source) = self.capture_source {
            settings.capture.enabled = true;
            settings.capture.source = source;
        }
        if let Some(level) = self.log_level {
            settings.logging.level = level;
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

fn load(cli: Cli) -> Result<SightlineSettings> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(sightline_settings::settings_path);
    let mut settings = sightline_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(cli)?;

    sightline_core::logging::init_subscriber(&settings.logging.level, settings.logging.format());

    let metrics = sightline_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let detector = match sightline_vision::build_detector(&settings.detector) {
        Ok(detector) => detector,
        Err(e) => {
            tracing::error!(error = %e, "detector unavailable");
            return Err(e).context("Failed to build detector");
        }
    };

    let pipeline = FramePipeline::new(detector, PipelineConfig::from_settings(&settings.pipeline));
    let capture = CaptureConfig::from_settings(&settings.capture);
    let server = SightlineServer::new(
        ServerConfig::from_settings(&settings.server),
        pipeline,
        capture,
        metrics,
    );

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;

    tracing::info!(
        detector = server.pipeline().detector_name(),
        threshold = settings.pipeline.confidence_threshold.value(),
        mode = settings.pipeline.response_mode.as_str(),
        capture = settings.capture.enabled,
        "Sightline listening on http://{addr}"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    if !server.drain().await {
        tracing::warn!(
            live = server.registry().size(),
            "sessions did not drain before the shutdown timeout"
        );
    }
    let _ = handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_settings::DetectorBackend;

    fn settings_file(body: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.json"), body).unwrap();
        dir
    }

    #[test]
    fn cli_defaults_leave_settings_untouched() {
        let cli = Cli::parse_from(["sightline"]);
        let mut settings = SightlineSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.port, SightlineSettings::default().server.port);
        assert!(!settings.capture.enabled);
        assert_eq!(settings.detector.backend, DetectorBackend::Static);
    }

    #[test]
    fn cli_flags_override_settings() {
        let cli = Cli::parse_from([
            "sightline",
            "--port",
            "9001",
            "--threshold",
            "0.5",
            "--response-mode",
            "detections_only",
            "--capture-source",
            "synthetic:64x48",
        ]);
        let mut settings = SightlineSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.port, 9001);
        assert!((settings.pipeline.confidence_threshold.value() - 0.5).abs() < f64::EPSILON);
        assert_eq!(settings.pipeline.response_mode, ResponseMode::DetectionsOnly);
        assert!(settings.capture.enabled);
        assert_eq!(settings.capture.source, "synthetic:64x48");
    }

    #[test]
    fn model_flag_selects_onnx_backend() {
        let cli = Cli::parse_from(["sightline", "--model", "/models/yolo.onnx"]);
        let mut settings = SightlineSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.detector.backend, DetectorBackend::Onnx);
        assert_eq!(settings.detector.model_path.as_deref(), Some("/models/yolo.onnx"));
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["sightline", "--threshold", "1.5"]).is_err());
        assert!(Cli::try_parse_from(["sightline", "--threshold", "abc"]).is_err());
    }

    #[test]
    fn unknown_response_mode_rejected() {
        assert!(Cli::try_parse_from(["sightline", "--response-mode", "everything"]).is_err());
    }

    #[test]
    fn flags_layer_over_settings_file() {
        let dir = settings_file(r#"{"server": {"port": 7000, "host": "10.0.0.1"}}"#);
        let path = dir.path().join("settings.json");
        let cli = Cli::parse_from([
            "sightline",
            "--settings",
            path.to_str().unwrap(),
            "--port",
            "7001",
        ]);
        let settings = load(cli).unwrap();
        assert_eq!(settings.server.host, "10.0.0.1");
        assert_eq!(settings.server.port, 7001);
    }

    #[test]
    fn invalid_combination_fails_validation() {
        let dir = settings_file(r#"{"server": {"max_connections": 4}}"#);
        let path = dir.path().join("settings.json");
        let cli = Cli::parse_from([
            "sightline",
            "--settings",
            path.to_str().unwrap(),
            "--max-connections",
            "0",
        ]);
        assert!(load(cli).is_err());
    }
}
