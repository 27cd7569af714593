//! Log subscriber setup and timing helpers.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! binary's job, driven by [`LoggingConfig`].

mod timer;

pub use timer::StageTimer;

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Builds the filter: `RUST_LOG` when set, otherwise `config.level`.
#[must_use]
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber, writing to stderr.
///
/// Returns false if a subscriber was already installed.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(env_filter(config))
            .boxed(),
        LogFormat::Plain => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(env_filter(config))
            .boxed(),
    };
    tracing_subscriber::registry().with(layer).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_falls_back() {
        let config = LoggingConfig {
            level: "not a [directive".to_string(),
            format: LogFormat::Plain,
        };
        // Building the filter must not panic on a bad directive.
        let _filter = env_filter(&config);
    }

    #[test]
    fn test_second_init_is_refused() {
        let config = LoggingConfig::default();
        let _ = init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
