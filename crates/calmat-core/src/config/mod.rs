use std::time::Duration;

use anyhow::Result;
use config::Config;
use serde::Deserialize;

use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_CACHE_TOTAL_CAPACITY, DEFAULT_EXPANSION_LOOKBACK_DAYS,
    DEFAULT_EXPANSION_WINDOW_DAYS, DEFAULT_MASTER_SHARE_PERCENT, DEFAULT_MAX_EVENTS_PER_PARSE,
    DEFAULT_MAX_INPUT_BYTES, DEFAULT_MAX_OCCURRENCES_PER_RULE, DEFAULT_RULE_TIME_BUDGET_MS,
    DEFAULT_STREAMING_THRESHOLD_BYTES, DEFAULT_WORKER_CONCURRENCY, DEFAULT_YIELD_INTERVAL,
    ENV_PREFIX,
};
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// Tunables for a single parse call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Inputs larger than this (UTF-8 bytes) go through the streaming reader.
    pub streaming_threshold_bytes: usize,
    /// Inputs larger than this are rejected before parsing.
    pub max_input_bytes: usize,
    /// Total raw components retained for recurrence expansion.
    pub cache_total_capacity: usize,
    /// Share of `cache_total_capacity` reserved for RRULE-bearing masters.
    pub master_share_percent: u8,
    pub expansion_window_days: u32,
    /// Days before the reference instant where the expansion window opens.
    pub expansion_lookback_days: u32,
    pub max_occurrences_per_rule: usize,
    pub rule_time_budget_ms: u64,
    /// Occurrences generated between two cooperative checkpoints.
    pub yield_interval: usize,
    pub worker_concurrency: usize,
    /// Streaming mode only.
    pub max_events_per_parse: usize,
    pub expansion_enabled: bool,
    /// Zone for floating times when the calendar declares none.
    pub default_timezone: Option<String>,
    pub include_source: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            streaming_threshold_bytes: DEFAULT_STREAMING_THRESHOLD_BYTES,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            cache_total_capacity: DEFAULT_CACHE_TOTAL_CAPACITY,
            master_share_percent: DEFAULT_MASTER_SHARE_PERCENT,
            expansion_window_days: DEFAULT_EXPANSION_WINDOW_DAYS,
            expansion_lookback_days: DEFAULT_EXPANSION_LOOKBACK_DAYS,
            max_occurrences_per_rule: DEFAULT_MAX_OCCURRENCES_PER_RULE,
            rule_time_budget_ms: DEFAULT_RULE_TIME_BUDGET_MS,
            yield_interval: DEFAULT_YIELD_INTERVAL,
            worker_concurrency: DEFAULT_WORKER_CONCURRENCY,
            max_events_per_parse: DEFAULT_MAX_EVENTS_PER_PARSE,
            expansion_enabled: true,
            default_timezone: None,
            include_source: false,
        }
    }
}

impl PipelineConfig {
    /// ## Summary
    /// Checks the values that would otherwise stall or mis-size the pipeline.
    ///
    /// ## Errors
    /// Returns `CoreError::ConfigError` for a zero worker concurrency, a zero
    /// yield interval, or a master share above 100 percent.
    pub fn validate(&self) -> CoreResult<()> {
        if self.worker_concurrency == 0 {
            return Err(CoreError::ConfigError(
                "worker_concurrency must be at least 1".to_string(),
            ));
        }
        if self.yield_interval == 0 {
            return Err(CoreError::ConfigError(
                "yield_interval must be at least 1".to_string(),
            ));
        }
        if self.master_share_percent > 100 {
            return Err(CoreError::ConfigError(format!(
                "master_share_percent must be within 0..=100, got {}",
                self.master_share_percent
            )));
        }
        Ok(())
    }

    #[must_use]
    pub const fn rule_time_budget(&self) -> Duration {
        Duration::from_millis(self.rule_time_budget_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// ## Summary
    /// Loads configuration from defaults, an optional `calmat.toml` and
    /// `CALMAT__*` environment variables, in increasing precedence.
    ///
    /// ## Errors
    /// Returns an error if building, deserializing or validating the configuration fails.
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .set_default("logging.level", "info")?
            // TOML file
            .add_source(config::File::with_name(CONFIG_FILE_NAME).required(false))
            // Env
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()?;

        settings.pipeline.validate()?;
        Ok(settings)
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    Settings::load()
}
