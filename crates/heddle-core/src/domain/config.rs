//! Retry and run configuration.
//!
//! Both types validate on construction and on deserialization
//! (`#[serde(try_from = ...)]`), so an invalid value never reaches the
//! scheduler. Durations are written as fractional seconds in files:
//!
//! ```json
//! {
//!   "max_parallel": 3,
//!   "fail_fast": false,
//!   "parallel": true,
//!   "pump_interval_seconds": 0.1,
//!   "retry": {
//!     "max_retries": 3,
//!     "base_delay_seconds": 2.0,
//!     "max_delay_seconds": 60.0,
//!     "jitter_factor": 0.5,
//!     "retryable_codes": [429, 502, 503, 504]
//!   }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);
pub const DEFAULT_JITTER_FACTOR: f64 = 0.5;
pub const DEFAULT_RETRYABLE_CODES: [u16; 4] = [429, 502, 503, 504];

pub const MIN_PARALLEL: usize = 1;
pub const MAX_PARALLEL: usize = 5;
pub const DEFAULT_MAX_PARALLEL: usize = 3;
pub const DEFAULT_PUMP_INTERVAL: Duration = Duration::from_millis(100);

/// Backoff parameters for transient (rate-limit / overload) failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RetryConfigFile", into = "RetryConfigFile")]
pub struct RetryConfig {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
    retryable_codes: Vec<u16>,
}

impl RetryConfig {
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
        jitter_factor: f64,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            max_retries,
            base_delay,
            max_delay,
            jitter_factor,
            retryable_codes: DEFAULT_RETRYABLE_CODES.to_vec(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Retries off: the worker is invoked exactly once per task.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_factor: 0.0,
            retryable_codes: DEFAULT_RETRYABLE_CODES.to_vec(),
        }
    }

    pub fn with_retryable_codes(mut self, codes: impl Into<Vec<u16>>) -> Self {
        self.retryable_codes = codes.into();
        self
    }

    /// Same parameters with a different retry count, re-validated.
    pub fn with_max_retries(mut self, max_retries: u32) -> Result<Self, ConfigError> {
        self.max_retries = max_retries;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::JitterOutOfRange(self.jitter_factor));
        }
        if self.max_retries > 0 && self.base_delay.is_zero() {
            return Err(ConfigError::NonPositiveBaseDelay);
        }
        if self.max_delay < self.base_delay {
            return Err(ConfigError::MaxDelayBelowBase {
                base: self.base_delay,
                max: self.max_delay,
            });
        }
        Ok(())
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn jitter_factor(&self) -> f64 {
        self.jitter_factor
    }

    pub fn retryable_codes(&self) -> &[u16] {
        &self.retryable_codes
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_factor: DEFAULT_JITTER_FACTOR,
            retryable_codes: DEFAULT_RETRYABLE_CODES.to_vec(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RetryConfigFile {
    #[serde(default = "default_max_retries")]
    max_retries: u32,
    #[serde(default = "default_base_delay_seconds")]
    base_delay_seconds: f64,
    #[serde(default = "default_max_delay_seconds")]
    max_delay_seconds: f64,
    #[serde(default = "default_jitter_factor")]
    jitter_factor: f64,
    #[serde(default = "default_retryable_codes")]
    retryable_codes: Vec<u16>,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_base_delay_seconds() -> f64 {
    DEFAULT_BASE_DELAY.as_secs_f64()
}

fn default_max_delay_seconds() -> f64 {
    DEFAULT_MAX_DELAY.as_secs_f64()
}

fn default_jitter_factor() -> f64 {
    DEFAULT_JITTER_FACTOR
}

fn default_retryable_codes() -> Vec<u16> {
    DEFAULT_RETRYABLE_CODES.to_vec()
}

fn seconds(value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::Parse(format!("invalid duration: {value}")))
}

impl TryFrom<RetryConfigFile> for RetryConfig {
    type Error = ConfigError;

    fn try_from(file: RetryConfigFile) -> Result<Self, Self::Error> {
        if file.base_delay_seconds <= 0.0 && file.max_retries > 0 {
            return Err(ConfigError::NonPositiveBaseDelay);
        }
        let config = RetryConfig {
            max_retries: file.max_retries,
            base_delay: seconds(file.base_delay_seconds.max(0.0))?,
            max_delay: seconds(file.max_delay_seconds)?,
            jitter_factor: file.jitter_factor,
            retryable_codes: file.retryable_codes,
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<RetryConfig> for RetryConfigFile {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_seconds: config.base_delay.as_secs_f64(),
            max_delay_seconds: config.max_delay.as_secs_f64(),
            jitter_factor: config.jitter_factor,
            retryable_codes: config.retryable_codes,
        }
    }
}

/// Scheduler parameters for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RunConfigFile", into = "RunConfigFile")]
pub struct RunConfig {
    pub max_parallel: usize,
    pub fail_fast: bool,
    /// `false` runs the independent phase one task at a time on the control loop.
    pub parallel: bool,
    pub pump_interval: Duration,
    pub retry: RetryConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            fail_fast: false,
            parallel: true,
            pump_interval: DEFAULT_PUMP_INTERVAL,
            retry: RetryConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_PARALLEL..=MAX_PARALLEL).contains(&self.max_parallel) {
            return Err(ConfigError::MaxParallelOutOfRange {
                value: self.max_parallel,
                min: MIN_PARALLEL,
                max: MAX_PARALLEL,
            });
        }
        if self.pump_interval.is_zero() {
            return Err(ConfigError::ZeroPumpInterval);
        }
        self.retry.validate()
    }

    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Serialize, Deserialize)]
struct RunConfigFile {
    #[serde(default = "default_max_parallel")]
    max_parallel: usize,
    #[serde(default)]
    fail_fast: bool,
    #[serde(default = "default_parallel")]
    parallel: bool,
    #[serde(default = "default_pump_interval_seconds")]
    pump_interval_seconds: f64,
    #[serde(default)]
    retry: RetryConfig,
}

fn default_max_parallel() -> usize {
    DEFAULT_MAX_PARALLEL
}

fn default_parallel() -> bool {
    true
}

fn default_pump_interval_seconds() -> f64 {
    DEFAULT_PUMP_INTERVAL.as_secs_f64()
}

impl TryFrom<RunConfigFile> for RunConfig {
    type Error = ConfigError;

    fn try_from(file: RunConfigFile) -> Result<Self, Self::Error> {
        let config = RunConfig {
            max_parallel: file.max_parallel,
            fail_fast: file.fail_fast,
            parallel: file.parallel,
            pump_interval: seconds(file.pump_interval_seconds)?,
            retry: file.retry,
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<RunConfig> for RunConfigFile {
    fn from(config: RunConfig) -> Self {
        Self {
            max_parallel: config.max_parallel,
            fail_fast: config.fail_fast,
            parallel: config.parallel,
            pump_interval_seconds: config.pump_interval.as_secs_f64(),
            retry: config.retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_match_documented_values() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_retries(), 3);
        assert_eq!(retry.base_delay(), Duration::from_secs(2));
        assert_eq!(retry.max_delay(), Duration::from_secs(60));
        assert_eq!(retry.jitter_factor(), 0.5);
        assert_eq!(retry.retryable_codes(), &[429, 502, 503, 504]);

        let run = RunConfig::default();
        assert_eq!(run.max_parallel, 3);
        assert!(!run.fail_fast);
        assert!(run.parallel);
        assert!(run.validate().is_ok());
    }

    #[test]
    fn zero_base_delay_is_rejected_when_retrying() {
        let err = RetryConfig::new(2, Duration::ZERO, Duration::from_secs(1), 0.0).unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveBaseDelay);
    }

    #[test]
    fn zero_base_delay_is_fine_without_retries() {
        let config = RetryConfig::new(0, Duration::ZERO, Duration::ZERO, 0.0).unwrap();
        assert_eq!(config, RetryConfig::disabled());
    }

    #[test]
    fn max_delay_below_base_is_rejected() {
        let err =
            RetryConfig::new(1, Duration::from_secs(5), Duration::from_secs(1), 0.0).unwrap_err();
        assert!(matches!(err, ConfigError::MaxDelayBelowBase { .. }));
    }

    #[rstest]
    #[case(-0.1)]
    #[case(1.5)]
    #[case(f64::NAN)]
    fn jitter_outside_unit_interval_is_rejected(#[case] jitter: f64) {
        let err =
            RetryConfig::new(1, Duration::from_secs(1), Duration::from_secs(2), jitter).unwrap_err();
        assert!(matches!(err, ConfigError::JitterOutOfRange(_)));
    }

    #[rstest]
    #[case(0)]
    #[case(6)]
    fn max_parallel_outside_range_is_rejected(#[case] value: usize) {
        let config = RunConfig {
            max_parallel: value,
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MaxParallelOutOfRange { .. })
        ));
    }

    #[test]
    fn enabling_retries_on_disabled_config_is_rejected() {
        let err = RetryConfig::disabled().with_max_retries(2).unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveBaseDelay);
    }

    #[test]
    fn with_max_retries_keeps_configured_delays() {
        let config = RetryConfig::new(0, Duration::from_secs(5), Duration::from_secs(30), 0.0)
            .unwrap()
            .with_max_retries(4)
            .unwrap();
        assert_eq!(config.max_retries(), 4);
        assert_eq!(config.base_delay(), Duration::from_secs(5));
        assert_eq!(config.max_delay(), Duration::from_secs(30));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = RunConfig::from_json(r#"{ "max_parallel": 2, "retry": { "max_retries": 1 } }"#)
            .unwrap();
        assert_eq!(config.max_parallel, 2);
        assert_eq!(config.retry.max_retries(), 1);
        assert_eq!(config.retry.base_delay(), DEFAULT_BASE_DELAY);
        assert_eq!(config.pump_interval, DEFAULT_PUMP_INTERVAL);
    }

    #[test]
    fn invalid_json_values_fail_validation() {
        let err = RunConfig::from_json(r#"{ "max_parallel": 9 }"#).unwrap_err();
        assert!(err.to_string().contains("max_parallel"));

        let err = RunConfig::from_json(r#"{ "retry": { "base_delay_seconds": -1.0 } }"#).unwrap_err();
        assert!(err.to_string().contains("base_delay"));

        let err = RunConfig::from_json(r#"{ "retry": { "max_retries": -1 } }"#);
        assert!(err.is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heddle.json");
        std::fs::write(&path, r#"{ "fail_fast": true, "parallel": false }"#).unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert!(config.fail_fast);
        assert!(!config.parallel);
    }
}
