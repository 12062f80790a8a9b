use crate::domain::{OnErrorPolicy, TypeHint};
use crate::reliability::{RetryConfig, RetryError, RetryStrategy};
use crate::store::{StoreTarget, StoreUri, UriError};
use crate::worker::DestinationSettings;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::error;

pub const DEFAULT_URI: &str = "mongodb://127.0.0.1:27017/syslog";
pub const DEFAULT_COLLECTION: &str = "messages";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    InvalidUri(#[from] UriError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid retry settings: {0}")]
    InvalidRetry(#[from] RetryError),
    #[error("Invalid type hint '{0}'. Expected NAME=TYPE")]
    InvalidTypeHint(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Environment error: {0}")]
    EnvError(String),
    #[error(transparent)]
    Args(#[from] clap::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Output format of the diagnostic log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable single-line events
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Destination identifier shown in diagnostics
    #[arg(long, env = "DESTINATION_ID", default_value = "mongodb")]
    pub id: String,

    /// MongoDB connection string; its path names the database
    #[arg(long, env = "MONGODB_URI", default_value = DEFAULT_URI)]
    pub uri: String,

    /// Target collection
    #[arg(long, env = "MONGODB_COLLECTION", default_value = DEFAULT_COLLECTION)]
    pub collection: String,

    /// Cast failure policy: drop-message, drop-property or fallback-to-string,
    /// optionally prefixed with silently-
    #[arg(long, env = "ON_ERROR", default_value = "drop-message")]
    pub on_error: OnErrorPolicy,

    /// Attempts per record before it is dropped
    #[arg(long, env = "RETRIES", default_value = "3")]
    pub retries: u32,

    /// Seconds to wait before retrying after a failure
    #[arg(long, env = "TIME_REOPEN_SECS", default_value = "60")]
    pub time_reopen_secs: u64,

    /// Upper bound for growing backoff strategies, in seconds
    #[arg(long, env = "MAX_BACKOFF_SECS", default_value = "600")]
    pub max_backoff_secs: u64,

    /// Backoff strategy between attempts (exponential, linear or fixed)
    #[arg(long, env = "BACKOFF", default_value = "fixed")]
    pub backoff: RetryStrategy,

    /// Randomize backoff delays by up to ±50%
    #[arg(long, env = "BACKOFF_JITTER")]
    pub backoff_jitter: bool,

    /// Records buffered in front of the worker
    #[arg(long, env = "QUEUE_CAPACITY", default_value = "10000")]
    pub queue_capacity: usize,

    /// Type override for an input field, e.g. PID=int32
    #[arg(long = "type-hint", value_name = "NAME=TYPE")]
    pub type_hints: Vec<String>,

    /// Field name to leave out of documents; a trailing * matches a prefix
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", default_value = "compact")]
    pub log_format: LogFormat,

    /// Configuration file path (optional). When given, every setting comes
    /// from the file and other command-line options and environment
    /// variables are ignored
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Derived fields (not CLI arguments)
    #[serde(skip)]
    #[arg(skip)]
    pub time_reopen: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub retry_config: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: "mongodb".to_string(),
            uri: DEFAULT_URI.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            on_error: OnErrorPolicy::default(),
            retries: 3,
            time_reopen_secs: 60,
            max_backoff_secs: 600,
            backoff: RetryStrategy::Fixed,
            backoff_jitter: false,
            queue_capacity: 10_000,
            type_hints: Vec::new(),
            exclude: Vec::new(),
            log_level: LogLevel::Info,
            log_format: LogFormat::Compact,
            config_file: None,
            time_reopen: Duration::from_secs(60),
            retry_config: RetryConfig::default(),
        }
    }
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut config = Config::try_parse_from(args)?;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        load_env_string("DESTINATION_ID", &mut config.id);
        load_env_string("MONGODB_URI", &mut config.uri);
        load_env_string("MONGODB_COLLECTION", &mut config.collection);
        load_env_var("ON_ERROR", &mut config.on_error)?;
        load_env_var("RETRIES", &mut config.retries)?;
        load_env_var("TIME_REOPEN_SECS", &mut config.time_reopen_secs)?;
        load_env_var("MAX_BACKOFF_SECS", &mut config.max_backoff_secs)?;
        load_env_var("BACKOFF", &mut config.backoff)?;
        load_env_var("BACKOFF_JITTER", &mut config.backoff_jitter)?;
        load_env_var("QUEUE_CAPACITY", &mut config.queue_capacity)?;

        if let Ok(log_level) = std::env::var("LOG_LEVEL") {
            config.log_level = LogLevel::from_str(&log_level, true)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {log_level}")))?;
        }
        if let Ok(log_format) = std::env::var("LOG_FORMAT") {
            config.log_format = LogFormat::from_str(&log_format, true).map_err(|_| {
                ConfigError::EnvError(format!(
                    "Invalid LOG_FORMAT: {log_format}. Valid values: compact, json"
                ))
            })?;
        }
        load_env_path_opt("CONFIG_FILE", &mut config.config_file);

        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    /// Replaces this configuration with the one in `config_file`, if any.
    ///
    /// The file wins as a whole; values from the command line or the
    /// environment are not merged into it.
    pub fn resolve(mut self) -> Result<Self, ConfigError> {
        let Some(path) = self.config_file.take() else {
            return Ok(self);
        };
        let mut config = Config::from_file(&path)?;
        config.config_file = Some(path);
        Ok(config)
    }

        pub fn post_process(&mut self) -> Result<(), ConfigError> {
        self.time_reopen = Duration::from_secs(self.time_reopen_secs);
        self.retry_config = RetryConfig {
            max_attempts: self.retries,
            base_delay: self.time_reopen,
            max_delay: Duration::from_secs(self.max_backoff_secs).max(self.time_reopen),
            strategy: self.backoff,
            jitter: self.backoff_jitter,
        };
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Destination id must not be empty".to_string(),
            ));
        }

        self.store_uri()?;

        if self.collection.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Collection name must not be empty".to_string(),
            ));
        }

        if self.retries == 0 {
            return Err(ConfigError::InvalidConfig(
                "Retries must be greater than 0".to_string(),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "Queue capacity must be greater than 0".to_string(),
            ));
        }

        self.retry_config.validate()?;
        self.type_hint_overrides()?;

        Ok(())
    }

    pub fn store_uri(&self) -> Result<StoreUri, ConfigError> {
        StoreUri::parse(&self.uri).map_err(|e| {
            match &e {
                UriError::MissingDatabase(_) => error!(uri = %self.uri, "Missing DB name from MongoDB URI"),
                _ => error!(uri = %self.uri, reason = %e, "Error parsing MongoDB URI"),
            }
            ConfigError::from(e)
        })
    }

    /// Collection name as stored: a leading `.` becomes `_`.
    pub fn collection_name(&self) -> String {
        match self.collection.strip_prefix('.') {
            Some(rest) => format!("_{rest}"),
            None => self.collection.clone(),
        }
    }

    pub fn type_hint_overrides(&self) -> Result<HashMap<String, TypeHint>, ConfigError> {
        self.type_hints
            .iter()
            .map(|entry| {
                let (name, hint) = entry
                    .split_once('=')
                    .ok_or_else(|| ConfigError::InvalidTypeHint(entry.clone()))?;
                let name = name.trim();
                if name.is_empty() {
                    return Err(ConfigError::InvalidTypeHint(entry.clone()));
                }
                let hint = hint
                    .parse::<TypeHint>()
                    .map_err(|_| ConfigError::InvalidTypeHint(entry.clone()))?;
                Ok((name.to_string(), hint))
            })
            .collect()
    }

    pub fn destination_settings(&self) -> Result<DestinationSettings, ConfigError> {
        let target = StoreTarget::new(self.store_uri()?, self.collection_name());
        Ok(DestinationSettings {
            on_error: self.on_error,
            exclude: self.exclude.clone(),
            retry: self.retry_config.clone(),
            queue_capacity: self.queue_capacity,
            ..DestinationSettings::new(self.id.clone(), target)
        })
    }
}

/// Helper function to load and parse an environment variable.
/// Returns Ok(()) if the variable doesn't exist (keeps default).
fn load_env_var<T>(name: &str, target: &mut T) -> Result<(), ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(value) = std::env::var(name) {
        *target = value
            .parse()
            .map_err(|e| ConfigError::EnvError(format!("Invalid {name}: {e}")))?;
    }
    Ok(())
}

fn load_env_string(name: &str, target: &mut String) {
    if let Ok(value) = std::env::var(name) {
        *target = value;
    }
}

fn load_env_path_opt(name: &str, target: &mut Option<PathBuf>) {
    if let Ok(value) = std::env::var(name) {
        *target = Some(PathBuf::from(value));
    }
}
