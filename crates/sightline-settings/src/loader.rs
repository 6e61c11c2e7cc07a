//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SightlineSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `SIGHTLINE_*` environment overrides (highest priority)
//! 4. [`SightlineSettings::validate`]
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use sightline_core::{DetectionThreshold, OutputFormat, Pacing, ResponseMode};
use tracing::debug;

use crate::errors::Result;
use crate::types::{DetectorBackend, SightlineSettings};

/// Env var naming an explicit settings file.
pub const SETTINGS_PATH_ENV: &str = "SIGHTLINE_SETTINGS";

/// Resolve the settings file path.
///
/// `SIGHTLINE_SETTINGS` wins; otherwise `~/.sightline/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(explicit) = std::env::var_os(SETTINGS_PATH_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(explicit);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".sightline").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SightlineSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an invalid value is an
/// error.
pub fn load_settings_from_path(path: &Path) -> Result<SightlineSettings> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

/// Load settings from `path`, resolving env overrides through `lookup`.
pub fn load_settings_with<F>(path: &Path, lookup: F) -> Result<SightlineSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(SightlineSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: SightlineSettings = serde_json::from_value(merged)?;
    apply_env_overrides_with(&mut settings, lookup);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(settings: &mut SightlineSettings) {
    apply_env_overrides_with(settings, |key| std::env::var(key).ok());
}

/// Apply overrides resolved through `lookup`.
///
/// Each variable is parsed strictly; invalid values are ignored with a
/// warning and the file/default value stays in place.
pub fn apply_env_overrides_with<F>(settings: &mut SightlineSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("SIGHTLINE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("SIGHTLINE_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.usize("SIGHTLINE_MAX_CONNECTIONS", 1, 100_000) {
        settings.server.max_connections = v;
    }
    if let Some(v) = env.usize("SIGHTLINE_MAX_MESSAGE_SIZE", 1024, 1 << 30) {
        settings.server.max_message_size = v;
    }
    if let Some(v) = env.u64("SIGHTLINE_SHUTDOWN_TIMEOUT_SECS", 0, 3_600) {
        settings.server.shutdown_timeout_secs = v;
    }

    // ── Pipeline ────────────────────────────────────────────────────
    if let Some(v) = env.parsed("SIGHTLINE_THRESHOLD", parse_threshold) {
        settings.pipeline.confidence_threshold = v;
    }
    if let Some(v) = env.parsed("SIGHTLINE_RESPONSE_MODE", |s| s.parse::<ResponseMode>().ok()) {
        settings.pipeline.response_mode = v;
    }
    if let Some(v) = env.bool("SIGHTLINE_DRAW_OVERLAYS") {
        settings.pipeline.draw_overlays = v;
    }
    if let Some(v) = env.parsed("SIGHTLINE_OUTPUT_FORMAT", |s| s.parse::<OutputFormat>().ok()) {
        settings.pipeline.output_format = v;
    }
    if let Some(v) = env.parsed("SIGHTLINE_JPEG_QUALITY", |s| parse_u8_range(s, 1, 100)) {
        settings.pipeline.jpeg_quality = v;
    }
    if let Some(v) = env.u64("SIGHTLINE_DETECT_TIMEOUT_MS", 1, 600_000) {
        settings.pipeline.detect_timeout_ms = v;
    }

    // ── Capture ─────────────────────────────────────────────────────
    if let Some(v) = env.bool("SIGHTLINE_CAPTURE_ENABLED") {
        settings.capture.enabled = v;
    }
    if let Some(v) = env.string("SIGHTLINE_CAPTURE_SOURCE") {
        settings.capture.source = v;
    }
    if let Some(v) = env.u64("SIGHTLINE_FRAME_INTERVAL_MS", 0, 60_000) {
        settings.capture.frame_interval_ms = v;
    }
    if let Some(v) = env.parsed("SIGHTLINE_PACING", |s| s.parse::<Pacing>().ok()) {
        settings.capture.pacing = v;
    }

    // ── Detector ────────────────────────────────────────────────────
    if let Some(v) = env.parsed("SIGHTLINE_DETECTOR", |s| s.parse::<DetectorBackend>().ok()) {
        settings.detector.backend = v;
    }
    if let Some(v) = env.string("SIGHTLINE_MODEL_PATH") {
        settings.detector.model_path = Some(v);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("SIGHTLINE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("SIGHTLINE_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u8` within a range.
pub fn parse_u8_range(val: &str, min: u8, max: u8) -> Option<u8> {
    let n: u8 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a confidence cutoff in `[0, 1]`.
pub fn parse_threshold(val: &str) -> Option<DetectionThreshold> {
    DetectionThreshold::new(val.trim().parse().ok()?)
}

// ── Env var readers ─────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = (self.lookup)(name)?;
        let result = parse(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid env var, ignoring");
        }
        result
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.parsed(name, parse_bool)
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        self.parsed(name, |v| parse_u16_range(v, min, max))
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        self.parsed(name, |v| parse_u64_range(v, min, max))
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.parsed(name, |v| parse_usize_range(v, min, max))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8000, "host": "0.0.0.0"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"labels": ["a", "b", "c"]});
        let source = serde_json::json!({"labels": ["z"]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["labels"], serde_json::json!(["z"]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── load_settings_with ──────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let path = Path::new("/nonexistent/settings.json");
        let settings = load_settings_with(path, no_env).unwrap();
        assert_eq!(settings, SightlineSettings::default());
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 9090}, "pipeline": {"response_mode": "detections_only"}}"#,
        )
        .unwrap();

        let settings = load_settings_with(&path, no_env).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.max_connections, 64);
        assert_eq!(settings.pipeline.response_mode, ResponseMode::DetectionsOnly);
        assert!(settings.pipeline.draw_overlays);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_with(&path, no_env);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_invalid_value_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"pipeline": {"jpeg_quality": 0}}"#).unwrap();

        let result = load_settings_with(&path, no_env);
        assert!(matches!(result.unwrap_err(), SettingsError::InvalidValue(_)));
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": 9090}}"#).unwrap();

        let env = env_from(&[
            ("SIGHTLINE_PORT", "7000"),
            ("SIGHTLINE_THRESHOLD", "0.5"),
            ("SIGHTLINE_PACING", "fixed_rate"),
            ("SIGHTLINE_OUTPUT_FORMAT", "png"),
            ("SIGHTLINE_CAPTURE_ENABLED", "yes"),
            ("SIGHTLINE_LOG_JSON", "on"),
        ]);
        let settings = load_settings_with(&path, env).unwrap();
        assert_eq!(settings.server.port, 7000);
        assert_eq!(settings.pipeline.confidence_threshold.value(), 0.5);
        assert_eq!(settings.capture.pacing, Pacing::FixedRate);
        assert_eq!(settings.pipeline.output_format, OutputFormat::Png);
        assert!(settings.capture.enabled);
        assert!(settings.logging.json);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = SightlineSettings::default();
        let env = env_from(&[
            ("SIGHTLINE_PORT", "99999"),
            ("SIGHTLINE_THRESHOLD", "1.5"),
            ("SIGHTLINE_RESPONSE_MODE", "everything"),
            ("SIGHTLINE_DRAW_OVERLAYS", "maybe"),
            ("SIGHTLINE_JPEG_QUALITY", "0"),
        ]);
        apply_env_overrides_with(&mut settings, env);
        assert_eq!(settings, SightlineSettings::default());
    }

    #[test]
    fn env_selects_onnx_backend() {
        let mut settings = SightlineSettings::default();
        let env = env_from(&[
            ("SIGHTLINE_DETECTOR", "onnx"),
            ("SIGHTLINE_MODEL_PATH", "/models/yolov8n.onnx"),
        ]);
        apply_env_overrides_with(&mut settings, env);
        assert_eq!(settings.detector.backend, DetectorBackend::Onnx);
        assert_eq!(
            settings.detector.model_path.as_deref(),
            Some("/models/yolov8n.onnx")
        );
    }

    #[test]
    fn empty_env_string_is_ignored() {
        let mut settings = SightlineSettings::default();
        apply_env_overrides_with(&mut settings, env_from(&[("SIGHTLINE_HOST", "")]));
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    // ── parse helpers ───────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in &["true", "1", "yes", "on", "TRUE", "On"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in &["false", "0", "no", "off", "NO"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("2"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("8000", 1, 65535), Some(8000));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u8_range("90", 1, 100), Some(90));
        assert_eq!(parse_u8_range("101", 1, 100), None);
        assert_eq!(parse_u64_range("abc", 0, 10), None);
        assert_eq!(parse_usize_range("64", 1, 100), Some(64));
    }

    #[test]
    fn parse_threshold_bounds() {
        assert_eq!(parse_threshold("0.75").map(DetectionThreshold::value), Some(0.75));
        assert_eq!(parse_threshold(" 1 ").map(DetectionThreshold::value), Some(1.0));
        assert!(parse_threshold("-0.1").is_none());
        assert!(parse_threshold("NaN").is_none());
    }
}
