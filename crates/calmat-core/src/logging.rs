//! Tracing subscriber setup for hosts embedding the pipeline.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// ## Summary
/// Installs a global `tracing` subscriber filtered by `config.level`.
///
/// Returns `false` when a global subscriber was already installed, which
/// leaves the existing one in place.
#[must_use]
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_new(config.level.as_str()).unwrap_or_else(|e| {
        eprintln!("invalid log level {:?} ({e}), falling back to info", config.level);
        EnvFilter::new("info")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        let config = LoggingConfig {
            level: "not a level[".to_string(),
        };

        // Whatever the first call returns, a second call must not panic and
        // must report that a subscriber is already installed.
        let _first = init_tracing(&config);
        assert!(!init_tracing(&LoggingConfig::default()));
    }
}
