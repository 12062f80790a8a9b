use thiserror::Error;

/// Top-level error type for the writer.
#[derive(Error, Debug)]
pub enum WriterError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::app::ConfigError),

    #[error("Logging error: {0}")]
    Logging(#[from] crate::app::LoggingError),

    #[error("Destination error: {0}")]
    Destination(#[from] crate::worker::DestinationError),

    #[error("Input error: {0}")]
    Input(#[from] std::io::Error),
}
