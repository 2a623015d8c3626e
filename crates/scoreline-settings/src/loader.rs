//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ScorelineSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{AdmissionMode, AdmissionProvider, LogFormat, ScorelineSettings};

/// Resolve the default settings file path (`~/.scoreline/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".scoreline").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ScorelineSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with process env var overrides.
///
/// A missing file yields defaults. A file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ScorelineSettings> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

/// Load settings from `path`, resolving overrides through `lookup`.
pub fn load_settings_with<F>(path: &Path, lookup: F) -> Result<ScorelineSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(ScorelineSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ScorelineSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, lookup);
    validate(&settings)?;
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

/// Apply `SCORELINE_*` (and `PORT`) overrides.
///
/// Invalid values are logged and ignored, falling back to file/default.
pub fn apply_env_overrides<F>(settings: &mut ScorelineSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| lookup(key).filter(|v| !v.is_empty());

    // ── Server ───────────────────────────────────────────────────────
    if let Some(v) = read("SCORELINE_HOST") {
        settings.server.host = v;
    }
    for key in ["PORT", "SCORELINE_PORT"] {
        if let Some(v) = read(key).and_then(|raw| checked(key, &raw, parse_u16_range(&raw, 1, 65535))) {
            settings.server.port = v;
        }
    }
    if let Some(v) = read("SCORELINE_WS_PATH") {
        settings.server.ws_path = v;
    }
    if let Some(v) = read("SCORELINE_HEARTBEAT_INTERVAL_SECS").and_then(|raw| {
        checked("SCORELINE_HEARTBEAT_INTERVAL_SECS", &raw, parse_u64_range(&raw, 1, 3600))
    }) {
        settings.server.heartbeat_interval_secs = v;
    }

    // ── Admission ────────────────────────────────────────────────────
    if let Some(v) = read("SCORELINE_ADMISSION_MODE")
        .and_then(|raw| checked("SCORELINE_ADMISSION_MODE", &raw, parse_mode(&raw)))
    {
        settings.admission.mode = v;
    }
    if let Some(v) = read("SCORELINE_ADMISSION_PROVIDER")
        .and_then(|raw| checked("SCORELINE_ADMISSION_PROVIDER", &raw, parse_provider(&raw)))
    {
        settings.admission.provider = v;
    }
    if let Some(v) = read("SCORELINE_ADMISSION_KEY") {
        settings.admission.key = Some(v);
    }
    if let Some(v) = read("SCORELINE_ADMISSION_ENDPOINT") {
        settings.admission.endpoint = Some(v);
    }
    if let Some(v) = read("SCORELINE_ADMISSION_TRUST_FORWARDED")
        .and_then(|raw| checked("SCORELINE_ADMISSION_TRUST_FORWARDED", &raw, parse_bool(&raw)))
    {
        settings.admission.trust_forwarded_for = v;
    }

    // ── Logging ──────────────────────────────────────────────────────
    if let Some(v) = read("SCORELINE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("SCORELINE_LOG_FORMAT")
        .and_then(|raw| checked("SCORELINE_LOG_FORMAT", &raw, parse_format(&raw)))
    {
        settings.logging.format = v;
    }
}

/// Reject settings the server cannot run with.
pub fn validate(settings: &ScorelineSettings) -> Result<()> {
    if !settings.server.ws_path.starts_with('/') {
        return Err(SettingsError::InvalidValue(format!(
            "server.wsPath must start with '/': {}",
            settings.server.ws_path
        )));
    }
    if matches!(settings.server.ws_path.as_str(), "/" | "/health") {
        return Err(SettingsError::InvalidValue(format!(
            "server.wsPath collides with a built-in route: {}",
            settings.server.ws_path
        )));
    }
    if settings.server.heartbeat_interval_secs == 0 {
        return Err(SettingsError::InvalidValue(
            "server.heartbeatIntervalSecs must be positive".into(),
        ));
    }
    if settings.server.send_queue_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "server.sendQueueCapacity must be positive".into(),
        ));
    }
    for (name, window) in [
        ("http", settings.admission.http),
        ("upgrade", settings.admission.upgrade),
    ] {
        if window.max_requests == 0 || window.interval_secs == 0 {
            return Err(SettingsError::InvalidValue(format!(
                "admission.{name} window must have positive maxRequests and intervalSecs"
            )));
        }
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

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

/// Parse a boolean flag.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse an admission mode. Accepts `DRY_RUN` spelling as well.
pub fn parse_mode(val: &str) -> Option<AdmissionMode> {
    match val.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
        "live" => Some(AdmissionMode::Live),
        "dryrun" => Some(AdmissionMode::DryRun),
        "disabled" | "off" => Some(AdmissionMode::Disabled),
        _ => None,
    }
}

/// Parse an admission provider name.
pub fn parse_provider(val: &str) -> Option<AdmissionProvider> {
    match val.to_ascii_lowercase().as_str() {
        "local" => Some(AdmissionProvider::Local),
        "remote" => Some(AdmissionProvider::Remote),
        _ => None,
    }
}

/// Parse a log format name.
pub fn parse_format(val: &str) -> Option<LogFormat> {
    match val.to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" | "text" => Some(LogFormat::Pretty),
        _ => None,
    }
}

fn checked<T>(key: &str, raw: &str, parsed: Option<T>) -> Option<T> {
    if parsed.is_none() {
        warn!(key, value = %raw, "invalid env var, ignoring");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
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
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    // ── file loading ────────────────────────────────────────────────

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_with(&dir.path().join("absent.json"), no_env).unwrap();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.admission.mode, AdmissionMode::Live);
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"admission":{"mode":"dryRun","upgrade":{"maxRequests":9,"intervalSecs":3}}}"#,
        )
        .unwrap();

        let settings = load_settings_with(&path, no_env).unwrap();
        assert_eq!(settings.admission.mode, AdmissionMode::DryRun);
        assert_eq!(settings.admission.upgrade.max_requests, 9);
        assert_eq!(settings.admission.http.max_requests, 50);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_settings_with(&path, no_env).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn invalid_ws_path_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server":{"wsPath":"ws"}}"#).unwrap();
        let err = load_settings_with(&path, no_env).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
    }

    #[test]
    fn ws_path_on_health_route_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server":{"wsPath":"/health"}}"#).unwrap();
        let err = load_settings_with(&path, no_env).unwrap_err();
        assert!(err.to_string().contains("collides"));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server":{"port":9000}}"#).unwrap();

        let env = env_from(&[
            ("SCORELINE_PORT", "9100"),
            ("SCORELINE_ADMISSION_MODE", "DRY_RUN"),
            ("SCORELINE_ADMISSION_KEY", "ajkey_123"),
            ("SCORELINE_LOG_FORMAT", "pretty"),
        ]);
        let settings = load_settings_with(&path, env).unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.admission.mode, AdmissionMode::DryRun);
        assert_eq!(settings.admission.key.as_deref(), Some("ajkey_123"));
        assert_eq!(settings.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn scoreline_port_beats_plain_port() {
        let mut settings = ScorelineSettings::default();
        apply_env_overrides(
            &mut settings,
            env_from(&[("PORT", "7000"), ("SCORELINE_PORT", "7001")]),
        );
        assert_eq!(settings.server.port, 7001);
    }

    #[test]
    fn invalid_env_values_ignored() {
        let mut settings = ScorelineSettings::default();
        apply_env_overrides(
            &mut settings,
            env_from(&[
                ("PORT", "not-a-port"),
                ("SCORELINE_HEARTBEAT_INTERVAL_SECS", "0"),
                ("SCORELINE_ADMISSION_PROVIDER", "carrier-pigeon"),
            ]),
        );
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.server.heartbeat_interval_secs, 30);
        assert_eq!(settings.admission.provider, AdmissionProvider::Local);
    }

    #[test]
    fn trust_forwarded_from_env() {
        let mut settings = ScorelineSettings::default();
        apply_env_overrides(
            &mut settings,
            env_from(&[("SCORELINE_ADMISSION_TRUST_FORWARDED", "true")]),
        );
        assert!(settings.admission.trust_forwarded_for);

        let mut settings = ScorelineSettings::default();
        apply_env_overrides(
            &mut settings,
            env_from(&[("SCORELINE_ADMISSION_TRUST_FORWARDED", "sometimes")]),
        );
        assert!(!settings.admission.trust_forwarded_for);
    }

    #[test]
    fn empty_env_values_ignored() {
        let mut settings = ScorelineSettings::default();
        apply_env_overrides(&mut settings, env_from(&[("SCORELINE_ADMISSION_KEY", "")]));
        assert!(settings.admission.key.is_none());
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_mode_variants() {
        assert_eq!(parse_mode("LIVE"), Some(AdmissionMode::Live));
        assert_eq!(parse_mode("dry-run"), Some(AdmissionMode::DryRun));
        assert_eq!(parse_mode("dryRun"), Some(AdmissionMode::DryRun));
        assert_eq!(parse_mode("off"), Some(AdmissionMode::Disabled));
        assert_eq!(parse_mode("maybe"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u64_range("30", 1, 3600), Some(30));
        assert_eq!(parse_u64_range("-1", 1, 3600), None);
    }

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
