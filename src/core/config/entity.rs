use super::constant::*;
use crate::{
    circuitbreaker::{
        CircuitBreakerConfig, DEFAULT_MAX_FAILURE_THRESHOLD,
        DEFAULT_RING_BUFFER_SIZE_IN_CLOSED_STATE, DEFAULT_RING_BUFFER_SIZE_IN_HALF_OPEN_STATE,
        DEFAULT_WAIT_DURATION_IN_OPEN_STATE_MS,
    },
    utils, Error, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Serializable form of `CircuitBreakerConfig`.
/// Absent fields fall back to the built-in defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BreakerConfigEntity {
    /// failure rate in percent, in (0, 100]
    pub failure_rate_threshold: f32,
    pub wait_duration_in_open_state_ms: u64,
    pub ring_buffer_size_in_closed_state: usize,
    pub ring_buffer_size_in_half_open_state: usize,
}

impl Default for BreakerConfigEntity {
    fn default() -> Self {
        BreakerConfigEntity {
            failure_rate_threshold: DEFAULT_MAX_FAILURE_THRESHOLD,
            wait_duration_in_open_state_ms: DEFAULT_WAIT_DURATION_IN_OPEN_STATE_MS,
            ring_buffer_size_in_closed_state: DEFAULT_RING_BUFFER_SIZE_IN_CLOSED_STATE,
            ring_buffer_size_in_half_open_state: DEFAULT_RING_BUFFER_SIZE_IN_HALF_OPEN_STATE,
        }
    }
}

impl BreakerConfigEntity {
    pub fn build(&self) -> Result<CircuitBreakerConfig> {
        CircuitBreakerConfig::custom()
            .failure_rate_threshold(self.failure_rate_threshold)
            .wait_duration_in_open_state(Duration::from_millis(self.wait_duration_in_open_state_ms))
            .ring_buffer_size_in_closed_state(self.ring_buffer_size_in_closed_state)
            .ring_buffer_size_in_half_open_state(self.ring_buffer_size_in_half_open_state)
            .build()
    }
}

impl From<&CircuitBreakerConfig> for BreakerConfigEntity {
    fn from(config: &CircuitBreakerConfig) -> Self {
        BreakerConfigEntity {
            failure_rate_threshold: config.failure_rate_threshold(),
            wait_duration_in_open_state_ms: u64::try_from(
                config.wait_duration_in_open_state().as_millis(),
            )
            .unwrap_or(u64::MAX),
            ring_buffer_size_in_closed_state: config.ring_buffer_size_in_closed_state(),
            ring_buffer_size_in_half_open_state: config.ring_buffer_size_in_half_open_state(),
        }
    }
}

// BreakerSection holds the default breaker config of a registry
// and the named instances created up front.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BreakerSection {
    pub default: BreakerConfigEntity,
    pub instances: HashMap<String, BreakerConfigEntity>,
}

// LogConfig represent the configuration of logging.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    // only read by the log4rs backend
    pub config_file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            config_file: LOG_CONFIG_FILE.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SentinelConfig {
    pub log: LogConfig,
    pub breaker: BreakerSection,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConfigEntity {
    pub version: String,
    #[serde(default)]
    pub config: SentinelConfig,
}

impl Default for ConfigEntity {
    fn default() -> Self {
        ConfigEntity {
            version: SENTINEL_BREAKER_VERSION.into(),
            config: SentinelConfig::default(),
        }
    }
}

impl ConfigEntity {
    pub fn new() -> Self {
        ConfigEntity::default()
    }

    pub fn check(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(Error::msg("empty version"));
        }
        self.config
            .breaker
            .default
            .build()
            .map_err(|err| Error::msg(format!("invalid default breaker config: {}", err)))?;
        for (name, instance) in &self.config.breaker.instances {
            if utils::is_blank(name) {
                return Err(Error::msg("empty breaker instance name"));
            }
            instance.build().map_err(|err| {
                Error::msg(format!("invalid config of breaker instance {}: {}", name, err))
            })?;
        }
        Ok(())
    }
}

impl fmt::Display for ConfigEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(fmtted) => write!(f, "{}", fmtted),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}
