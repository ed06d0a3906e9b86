use crate::{Error, Result};
use std::fmt;
use std::time::Duration;

/// failure rate threshold in percent
pub const DEFAULT_MAX_FAILURE_THRESHOLD: f32 = 50.0;
pub const DEFAULT_WAIT_DURATION_IN_OPEN_STATE_MS: u64 = 60_000;
pub const DEFAULT_RING_BUFFER_SIZE_IN_HALF_OPEN_STATE: usize = 10;
pub const DEFAULT_RING_BUFFER_SIZE_IN_CLOSED_STATE: usize = 100;

/// `CircuitBreakerConfig` is the immutable configuration of a circuit breaker.
/// A value of this type is always valid, it can only be obtained from
/// `CircuitBreakerConfigBuilder::build()` or `Default`.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    failure_rate_threshold: f32,
    wait_duration_in_open_state: Duration,
    ring_buffer_size_in_closed_state: usize,
    ring_buffer_size_in_half_open_state: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        CircuitBreakerConfig {
            failure_rate_threshold: DEFAULT_MAX_FAILURE_THRESHOLD,
            wait_duration_in_open_state: Duration::from_millis(
                DEFAULT_WAIT_DURATION_IN_OPEN_STATE_MS,
            ),
            ring_buffer_size_in_closed_state: DEFAULT_RING_BUFFER_SIZE_IN_CLOSED_STATE,
            ring_buffer_size_in_half_open_state: DEFAULT_RING_BUFFER_SIZE_IN_HALF_OPEN_STATE,
        }
    }
}

impl CircuitBreakerConfig {
    /// `custom` starts a builder from the default values.
    pub fn custom() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::default()
    }

    /// `to_builder` starts a builder from the values of this config.
    pub fn to_builder(&self) -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder {
            failure_rate_threshold: self.failure_rate_threshold,
            wait_duration_in_open_state: self.wait_duration_in_open_state,
            ring_buffer_size_in_closed_state: self.ring_buffer_size_in_closed_state,
            ring_buffer_size_in_half_open_state: self.ring_buffer_size_in_half_open_state,
        }
    }

    /// failure rate (in percent) at or above which the breaker trips
    #[inline]
    pub fn failure_rate_threshold(&self) -> f32 {
        self.failure_rate_threshold
    }

    #[inline]
    pub fn wait_duration_in_open_state(&self) -> Duration {
        self.wait_duration_in_open_state
    }

    #[inline]
    pub fn ring_buffer_size_in_closed_state(&self) -> usize {
        self.ring_buffer_size_in_closed_state
    }

    #[inline]
    pub fn ring_buffer_size_in_half_open_state(&self) -> usize {
        self.ring_buffer_size_in_half_open_state
    }
}

impl fmt::Display for CircuitBreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{failure_rate_threshold: {}%, wait_duration_in_open_state: {:?}, ring_buffer_size_in_closed_state: {}, ring_buffer_size_in_half_open_state: {}}}",
            self.failure_rate_threshold,
            self.wait_duration_in_open_state,
            self.ring_buffer_size_in_closed_state,
            self.ring_buffer_size_in_half_open_state
        )
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfigBuilder {
    failure_rate_threshold: f32,
    wait_duration_in_open_state: Duration,
    ring_buffer_size_in_closed_state: usize,
    ring_buffer_size_in_half_open_state: usize,
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        CircuitBreakerConfig::default().to_builder()
    }
}

impl CircuitBreakerConfigBuilder {
    /// Sets the failure rate threshold in percent, valid range is (0, 100].
    pub fn failure_rate_threshold(mut self, threshold: f32) -> Self {
        self.failure_rate_threshold = threshold;
        self
    }

    pub fn wait_duration_in_open_state(mut self, wait_duration: Duration) -> Self {
        self.wait_duration_in_open_state = wait_duration;
        self
    }

    pub fn ring_buffer_size_in_closed_state(mut self, size: usize) -> Self {
        self.ring_buffer_size_in_closed_state = size;
        self
    }

    pub fn ring_buffer_size_in_half_open_state(mut self, size: usize) -> Self {
        self.ring_buffer_size_in_half_open_state = size;
        self
    }

    /// `build` validates the values, invalid ones are rejected rather than clamped.
    pub fn build(self) -> Result<CircuitBreakerConfig> {
        if !(self.failure_rate_threshold > 0.0 && self.failure_rate_threshold <= 100.0) {
            return Err(Error::msg(format!(
                "invalid failure_rate_threshold {} (valid range: (0.0, 100.0])",
                self.failure_rate_threshold
            )));
        }
        if self.wait_duration_in_open_state < Duration::from_millis(1) {
            return Err(Error::msg(format!(
                "invalid wait_duration_in_open_state {:?} (at least 1ms)",
                self.wait_duration_in_open_state
            )));
        }
        if self.ring_buffer_size_in_closed_state == 0 {
            return Err(Error::msg("invalid ring_buffer_size_in_closed_state"));
        }
        if self.ring_buffer_size_in_half_open_state == 0 {
            return Err(Error::msg("invalid ring_buffer_size_in_half_open_state"));
        }
        Ok(CircuitBreakerConfig {
            failure_rate_threshold: self.failure_rate_threshold,
            wait_duration_in_open_state: self.wait_duration_in_open_state,
            ring_buffer_size_in_closed_state: self.ring_buffer_size_in_closed_state,
            ring_buffer_size_in_half_open_state: self.ring_buffer_size_in_half_open_state,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_rate_threshold(), 50.0);
        assert_eq!(config.wait_duration_in_open_state(), Duration::from_secs(60));
        assert_eq!(config.ring_buffer_size_in_half_open_state(), 10);
        assert_eq!(config.ring_buffer_size_in_closed_state(), 100);
        assert_eq!(CircuitBreakerConfig::custom().build().unwrap(), config);
    }

    #[test]
    fn custom_values() {
        let config = CircuitBreakerConfig::custom()
            .failure_rate_threshold(100.0)
            .wait_duration_in_open_state(Duration::from_millis(1000))
            .ring_buffer_size_in_half_open_state(1)
            .ring_buffer_size_in_closed_state(10)
            .build()
            .unwrap();
        assert_eq!(config.failure_rate_threshold(), 100.0);
        assert_eq!(config.wait_duration_in_open_state(), Duration::from_secs(1));
        assert_eq!(config.ring_buffer_size_in_half_open_state(), 1);
        assert_eq!(config.ring_buffer_size_in_closed_state(), 10);

        let copied = config.to_builder().ring_buffer_size_in_closed_state(20).build().unwrap();
        assert_eq!(copied.ring_buffer_size_in_closed_state(), 20);
        assert_eq!(copied.failure_rate_threshold(), 100.0);
    }

    #[test]
    fn invalid_values() {
        let cases = vec![
            CircuitBreakerConfig::custom().failure_rate_threshold(0.0),
            CircuitBreakerConfig::custom().failure_rate_threshold(-1.0),
            CircuitBreakerConfig::custom().failure_rate_threshold(100.5),
            CircuitBreakerConfig::custom().failure_rate_threshold(f32::NAN),
            CircuitBreakerConfig::custom().wait_duration_in_open_state(Duration::ZERO),
            CircuitBreakerConfig::custom().wait_duration_in_open_state(Duration::from_micros(900)),
            CircuitBreakerConfig::custom().ring_buffer_size_in_closed_state(0),
            CircuitBreakerConfig::custom().ring_buffer_size_in_half_open_state(0),
        ];
        for builder in cases {
            assert!(builder.build().is_err());
        }
    }

    #[test]
    fn sub_millisecond_precision_is_kept() {
        let config = CircuitBreakerConfig::custom()
            .wait_duration_in_open_state(Duration::from_micros(1500))
            .build()
            .unwrap();
        assert_eq!(config.wait_duration_in_open_state(), Duration::from_micros(1500));
    }

    #[test]
    #[should_panic(expected = "at least 1ms")]
    fn illegal_sub_millisecond_wait() {
        CircuitBreakerConfig::custom()
            .wait_duration_in_open_state(Duration::from_micros(900))
            .build()
            .unwrap();
    }

    #[test]
    #[should_panic(expected = "invalid ring_buffer_size_in_closed_state")]
    fn illegal_closed_size() {
        CircuitBreakerConfig::custom()
            .ring_buffer_size_in_closed_state(0)
            .build()
            .unwrap();
    }
}
