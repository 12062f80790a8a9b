use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    #[error("Invalid retry configuration: {0}")]
    InvalidConfig(String),
    #[error("Unknown backoff strategy '{0}'. Valid values: exponential, linear, fixed")]
    UnknownStrategy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    #[serde(alias = "exponentialbackoff")]
    Exponential,
    #[serde(alias = "linearbackoff")]
    Linear,
    #[serde(alias = "fixeddelay")]
    Fixed,
}

impl fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RetryStrategy::Exponential => "exponential",
            RetryStrategy::Linear => "linear",
            RetryStrategy::Fixed => "fixed",
        })
    }
}

impl FromStr for RetryStrategy {
    type Err = RetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exponential" => Ok(RetryStrategy::Exponential),
            "linear" => Ok(RetryStrategy::Linear),
            "fixed" => Ok(RetryStrategy::Fixed),
            _ => Err(RetryError::UnknownStrategy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per record, the first one included.
    pub max_attempts: u32,
    #[serde(with = "duration_millis")]
    pub base_delay: Duration,
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
    pub strategy: RetryStrategy,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(600),
            strategy: RetryStrategy::Fixed,
            jitter: false,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), RetryError> {
        if self.max_attempts == 0 {
            return Err(RetryError::InvalidConfig(
                "max attempts must be greater than 0".to_string(),
            ));
        }
        if self.max_delay < self.base_delay {
            return Err(RetryError::InvalidConfig(format!(
                "max delay ({:?}) is shorter than base delay ({:?})",
                self.max_delay, self.base_delay
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct RetryState {
    attempt_count: u32,
    first_attempt_time: Option<Instant>,
}

/// Attempt bookkeeping for the record currently in flight.
///
/// A worker delivers one record at a time, so there is exactly one state,
/// restarted for every record.
#[derive(Debug)]
pub struct RetryManager {
    config: RetryConfig,
    state: RetryState,
}

impl RetryManager {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            state: RetryState::default(),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn start(&mut self) {
        self.state = RetryState {
            attempt_count: 0,
            first_attempt_time: Some(Instant::now()),
        };
    }

    /// Counts a failed attempt and returns the number of failures so far.
    pub fn record_failure(&mut self) -> u32 {
        self.state.attempt_count += 1;
        self.state.attempt_count
    }

    pub fn attempt_count(&self) -> u32 {
        self.state.attempt_count
    }

    pub fn should_give_up(&self) -> bool {
        self.state.attempt_count >= self.config.max_attempts
    }

    /// Time since the current record's first attempt.
    pub fn elapsed(&self) -> Duration {
        self.state
            .first_attempt_time
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_millis = self.config.base_delay.as_millis() as u64;
        let base_delay = match self.config.strategy {
            RetryStrategy::Exponential => {
                Duration::from_millis(base_millis.saturating_mul(2_u64.saturating_pow(attempt)))
            }
            RetryStrategy::Linear => {
                Duration::from_millis(base_millis.saturating_mul(attempt as u64 + 1))
            }
            RetryStrategy::Fixed => self.config.base_delay,
        };

        let capped_delay = std::cmp::min(base_delay, self.config.max_delay);

        if self.config.jitter {
            apply_jitter(capped_delay)
        } else {
            capped_delay
        }
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    let mut rng = rand::rng();
    let jitter_factor = rng.random_range(0.5..1.5);
    let jittered_millis = (delay.as_millis() as f64 * jitter_factor) as u64;
    Duration::from_millis(jittered_millis)
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
