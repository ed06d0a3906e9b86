// default app settings
pub const SENTINEL_BREAKER_VERSION: &str = "v1";
pub const CONF_FILE_PATH_ENV_KEY: &str = "SENTINEL_BREAKER_CONFIG_FILE_PATH";
pub const CONFIG_FILENAME: &str = "USE_DEFAULT_CONFIGURATION";

// env keys overriding the default breaker config
pub const FAILURE_RATE_THRESHOLD_ENV_KEY: &str = "SENTINEL_BREAKER_FAILURE_RATE_THRESHOLD";
pub const WAIT_DURATION_MS_ENV_KEY: &str = "SENTINEL_BREAKER_WAIT_DURATION_MS";
pub const CLOSED_RING_SIZE_ENV_KEY: &str = "SENTINEL_BREAKER_CLOSED_RING_SIZE";
pub const HALF_OPEN_RING_SIZE_ENV_KEY: &str = "SENTINEL_BREAKER_HALF_OPEN_RING_SIZE";

// default log settings
pub const DEFAULT_LOG_LEVEL: &str = "warn";
pub const LOG_CONFIG_FILE: &str = "testdata/config/log4rs.yaml";
