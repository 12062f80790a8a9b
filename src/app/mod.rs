pub mod config;
pub mod logging_system;
pub mod shutdown;
pub mod source;

pub use config::{Config, ConfigError, LogFormat, LogLevel};
pub use logging_system::{LogDirective, LoggingError, LoggingSystem, setup_logging_safe};
pub use shutdown::{ShutdownReason, SignalHandler};
pub use source::{RecordSource, SourceError};

use crate::domain::WriterError;
use crate::store::MongoStore;
use crate::worker::{Destination, DestinationStatsSnapshot};
use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

pub struct App {
    config: Config,
    source: RecordSource,
    destination: Destination,
}

impl App {
    pub fn from_args<I, T>(args: I) -> Result<Self, WriterError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::from_args(args)?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self, WriterError> {
        let config = config.resolve()?;

        setup_logging_safe(config.log_level, config.log_format)?;
        info!("Starting rask-mongo-writer v{}", crate::VERSION);
        if let Some(config_file) = &config.config_file {
            warn!(
                config_file = %config_file.display(),
                "Configuration loaded from file, command-line options and environment variables ignored"
            );
        }

        let source = RecordSource::new(config.type_hint_overrides()?);
        let settings = config.destination_settings()?;
        let destination = Destination::start(settings, Box::new(MongoStore::new()))?;

        Ok(Self {
            config,
            source,
            destination,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reads stdin until EOF or a shutdown signal, then drains the
    /// destination. A second signal during the drain aborts it.
    pub async fn run(self) -> Result<DestinationStatsSnapshot, WriterError> {
        let App {
            source,
            destination,
            ..
        } = self;
        let mut signals = SignalHandler::new()?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        info!("End of input reached");
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match source.parse_line(&line) {
                        Ok(record) => destination.send(record).await?,
                        Err(e) => warn!(reason = %e, "Skipping unparsable input line"),
                    }
                }
                reason = signals.recv() => {
                    info!(signal = %reason?, "Stopping input, draining queued records");
                    break;
                }
            }
        }

        let abort = destination.abort_handle();
        let mut drain = tokio::task::spawn_blocking(move || destination.shutdown());
        let joined = tokio::select! {
            joined = &mut drain => joined,
            reason = signals.recv() => {
                warn!(signal = %reason?, "Second signal, abandoning queued records");
                abort.abort();
                drain.await
            }
        };

        let stats = joined.map_err(|_| crate::worker::DestinationError::WorkerPanicked)??;
        info!(
            written = stats.written,
            dropped = stats.dropped,
            retried = stats.retried,
            "rask-mongo-writer stopped"
        );
        Ok(stats)
    }
}

// Main entry point for the application
pub async fn main() -> anyhow::Result<()> {
    let app = match App::from_args(std::env::args_os()) {
        Ok(app) => app,
        Err(WriterError::Config(ConfigError::Args(e))) => e.exit(),
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return Err(e).context("failed to start rask-mongo-writer");
        }
    };

    app.run().await.context("rask-mongo-writer terminated abnormally")?;
    Ok(())
}
