/// Default limits for the materialisation pipeline.
pub const MIB: usize = 1024 * 1024;

pub const DEFAULT_STREAMING_THRESHOLD_BYTES: usize = 5 * MIB;
pub const DEFAULT_MAX_INPUT_BYTES: usize = 50 * MIB;

pub const DEFAULT_CACHE_TOTAL_CAPACITY: usize = 2000;
pub const DEFAULT_MASTER_SHARE_PERCENT: u8 = 70;

pub const DEFAULT_EXPANSION_WINDOW_DAYS: u32 = 365;
pub const DEFAULT_EXPANSION_LOOKBACK_DAYS: u32 = 0;
pub const DEFAULT_MAX_OCCURRENCES_PER_RULE: usize = 1000;
pub const DEFAULT_RULE_TIME_BUDGET_MS: u64 = 2000;
pub const DEFAULT_YIELD_INTERVAL: usize = 100;
pub const DEFAULT_WORKER_CONCURRENCY: usize = 4;

pub const DEFAULT_MAX_EVENTS_PER_PARSE: usize = 10_000;

/// Characters of DESCRIPTION kept as an event's body preview.
pub const BODY_PREVIEW_CHARS: usize = 255;

/// Prefix for environment overrides, e.g. `CALMAT__PIPELINE__WORKER_CONCURRENCY`.
pub const ENV_PREFIX: &str = "CALMAT";
pub const CONFIG_FILE_NAME: &str = "calmat.toml";
