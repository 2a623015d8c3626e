//! # scoreline-settings
//!
//! Layered configuration for the Scoreline server.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** - [`ScorelineSettings::default()`]
//! 2. **User file** - `~/.scoreline/settings.json` or an explicit path
//! 3. **Environment variables** - `SCORELINE_*` and `PORT` (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, load_settings_with, settings_path};
pub use types::*;
