use super::config::{LogFormat, LogLevel};
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log level '{0}'. Valid levels: error, warn, info, debug, trace")]
    InvalidLogLevel(String),

    #[error("Invalid directive format '{0}'. Expected: 'target=level'")]
    InvalidDirectiveFormat(String),

    #[error("Empty target in directive '{0}'")]
    EmptyTarget(String),

    #[error("Logging system initialization failed: {details}")]
    InitFailed {
        details: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

fn parse_level(level: &str) -> Result<LogLevel, LoggingError> {
    match level.to_lowercase().as_str() {
        "error" => Ok(LogLevel::Error),
        "warn" | "warning" => Ok(LogLevel::Warn),
        "info" => Ok(LogLevel::Info),
        "debug" => Ok(LogLevel::Debug),
        "trace" => Ok(LogLevel::Trace),
        _ => Err(LoggingError::InvalidLogLevel(level.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDirective {
    pub target: String,
    pub level: LogLevel,
}

impl LogDirective {
    pub fn new(target: impl Into<String>, level: LogLevel) -> Self {
        Self {
            target: target.into(),
            level,
        }
    }

    pub fn parse(directive: &str) -> Result<Self, LoggingError> {
        let Some((target, level)) = directive.split_once('=') else {
            return Err(LoggingError::InvalidDirectiveFormat(directive.to_string()));
        };
        if level.contains('=') {
            return Err(LoggingError::InvalidDirectiveFormat(directive.to_string()));
        }

        let target = target.trim();
        if target.is_empty() {
            return Err(LoggingError::EmptyTarget(directive.to_string()));
        }

        Ok(LogDirective::new(target, parse_level(level.trim())?))
    }

    pub fn to_filter_string(&self) -> String {
        format!("{}={}", self.target, self.level.as_str())
    }
}

/// Noisy dependency targets kept at warn unless overridden.
const DEFAULT_DIRECTIVES: &[(&str, LogLevel)] = &[
    ("mongodb", LogLevel::Warn),
    ("hickory_proto", LogLevel::Warn),
    ("hickory_resolver", LogLevel::Warn),
    ("rustls", LogLevel::Warn),
];

pub struct LoggingSystem {
    directives: Arc<RwLock<Vec<LogDirective>>>,
    fallback_level: LogLevel,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self {
            directives: Arc::new(RwLock::new(Vec::new())),
            fallback_level: LogLevel::Info,
        }
    }

    /// Adds a `target=level` directive.
    ///
    /// A directive with an unknown level is kept at the fallback level; a
    /// malformed one is skipped with a warning on stderr.
    pub fn add_directive(&self, directive_str: &str) -> Result<(), LoggingError> {
        match LogDirective::parse(directive_str) {
            Ok(directive) => {
                self.directives.write().push(directive);
                Ok(())
            }
            Err(LoggingError::InvalidLogLevel(level)) => {
                eprintln!("Warning: invalid log level '{level}' in '{directive_str}', using default level");
                let target = directive_str.split('=').next().unwrap_or_default().trim();
                self.directives
                    .write()
                    .push(LogDirective::new(target, self.fallback_level));
                Ok(())
            }
            Err(e @ (LoggingError::InvalidDirectiveFormat(_) | LoggingError::EmptyTarget(_))) => {
                eprintln!("Warning: {e}, skipping directive");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn add_default_directives(&self) {
        let mut directives = self.directives.write();
        for (target, level) in DEFAULT_DIRECTIVES {
            directives.push(LogDirective::new(*target, *level));
        }
    }

    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let directives = self.directives.read();

        let mut filter_parts = Vec::with_capacity(directives.len() + 1);
        filter_parts.push(default_level.as_str().to_string());
        filter_parts.extend(directives.iter().map(LogDirective::to_filter_string));

        filter_parts.join(",")
    }

    pub fn initialize_tracing(
        &self,
        default_level: LogLevel,
        format: LogFormat,
    ) -> Result<(), LoggingError> {
        let filter_string = self.build_filter_string(default_level);

        let env_filter =
            EnvFilter::try_new(&filter_string).map_err(|e| LoggingError::InitFailed {
                details: format!("Failed to create EnvFilter with '{filter_string}'"),
                source: Box::new(e),
            })?;

        let registry = tracing_subscriber::registry().with(env_filter);
        let result = match format {
            LogFormat::Compact => registry
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_thread_names(true)
                        .compact(),
                )
                .try_init(),
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_thread_names(true)
                        .json()
                        .with_current_span(true),
                )
                .try_init(),
        };

        result.map_err(|e| LoggingError::InitFailed {
            details: "Failed to set global tracing subscriber".to_string(),
            source: Box::new(e),
        })
    }

    pub fn directive_count(&self) -> usize {
        self.directives.read().len()
    }

}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the global subscriber once per process. Later calls report
/// whether the first one succeeded.
pub fn setup_logging_safe(level: LogLevel, format: LogFormat) -> Result<(), LoggingError> {
    use std::sync::Once;
    use std::sync::atomic::{AtomicBool, Ordering};

    static INIT: Once = Once::new();
    static INIT_SUCCESS: AtomicBool = AtomicBool::new(false);

    INIT.call_once(|| {
        let logging_system = LoggingSystem::new();
        logging_system.add_default_directives();
        match logging_system.initialize_tracing(level, format) {
            Ok(()) => INIT_SUCCESS.store(true, Ordering::Release),
            Err(e) => eprintln!("Warning: {e}"),
        }
    });

    if INIT_SUCCESS.load(Ordering::Acquire) {
        Ok(())
    } else {
        Err(LoggingError::InitFailed {
            details: "Logging system initialization failed".to_string(),
            source: Box::new(std::io::Error::other("Logging initialization error")),
        })
    }
}
