//! # scoreline-logging
//!
//! `tracing` subscriber setup. One global `EnvFilter` built from settings
//! (`RUST_LOG` wins when present) in front of a JSON or pretty fmt layer.

#![deny(unsafe_code)]

use scoreline_settings::{LogFormat, LoggingSettings};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Errors raised while installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The level directive did not parse.
    #[error("invalid log filter '{directives}': {source}")]
    Filter {
        /// The directive string that failed.
        directives: String,
        /// Parser error.
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    /// A global subscriber was already installed.
    #[error("failed to install subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Per-module overrides applied on top of the configured default level.
///
/// Transport internals are noisy at debug, so they are pinned to `warn`
/// unless `RUST_LOG` says otherwise.
const MODULE_LEVELS: &[(&str, &str)] = &[("hyper", "warn"), ("tungstenite", "warn")];

/// Build the filter directive string from settings.
pub fn filter_directives(settings: &LoggingSettings) -> String {
    let mut directives = settings.level.to_lowercase();
    for (module, level) in MODULE_LEVELS {
        directives.push_str(&format!(",{module}={level}"));
    }
    directives
}

fn build_filter(settings: &LoggingSettings) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = filter_directives(settings);
    EnvFilter::try_new(&directives).map_err(|source| LoggingError::Filter { directives, source })
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), LoggingError> {
    let filter = build_filter(settings)?;

    let (json, pretty) = match settings.format {
        LogFormat::Json => (
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_span_list(true),
            ),
            None,
        ),
        LogFormat::Pretty => (None, Some(tracing_subscriber::fmt::layer().with_target(true))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_include_module_pins() {
        let settings = LoggingSettings {
            level: "DEBUG".into(),
            format: LogFormat::Pretty,
        };
        let directives = filter_directives(&settings);
        assert!(directives.starts_with("debug"));
        assert!(directives.contains("hyper=warn"));
        assert!(directives.contains("tungstenite=warn"));
    }

    #[test]
    fn default_directives_parse() {
        let directives = filter_directives(&LoggingSettings::default());
        assert!(EnvFilter::try_new(directives).is_ok());
    }

    #[test]
    fn filter_error_names_directives() {
        let source = EnvFilter::try_new("info,scoreline=verbose").unwrap_err();
        let err = LoggingError::Filter {
            directives: "info,scoreline=verbose".into(),
            source,
        };
        assert!(err.to_string().contains("scoreline=verbose"));
    }
}
