//! # sightline-settings
//!
//! Layered configuration for the Sightline server.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SightlineSettings::default()`]
//! 2. **Settings file**: `~/.sightline/settings.json`, or the path in
//!    `SIGHTLINE_SETTINGS` (deep-merged over defaults)
//! 3. **Environment variables**: `SIGHTLINE_*` overrides (highest priority)
//!
//! Command-line flags are applied on top by the binary, followed by
//! [`SightlineSettings::validate`].

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, load_settings_with,
    settings_path,
};
pub use types::*;
