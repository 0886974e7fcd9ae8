//! Tracing subscriber setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig, ValidationError};

/// Installs the global tracing subscriber described by `config`.
///
/// `RUST_LOG`, when set and valid, takes precedence over `config.filter`.
/// Returns `Ok(false)` if a global subscriber was already installed, which
/// leaves the existing one in place.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool, ValidationError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|_| ValidationError::InvalidLogFilter(config.filter.clone()))?,
    };

    let registry = Registry::default().with(filter);
    let installed = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true))
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
    };

    Ok(installed.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_tolerated() {
        let config = LoggingConfig::default();
        let _ = init_tracing(&config).unwrap();
        assert!(!init_tracing(&config).unwrap());
    }

    #[test]
    fn invalid_filter_is_reported_without_rust_log() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            filter: "event_hub=verbose".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            init_tracing(&config),
            Err(ValidationError::InvalidLogFilter(_))
        ));
    }
}
