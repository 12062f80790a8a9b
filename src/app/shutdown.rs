use std::fmt;
use std::io;
use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal as unix_signal};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownReason::Interrupt => "SIGINT",
            ShutdownReason::Terminate => "SIGTERM",
        })
    }
}

/// Listens for SIGINT and SIGTERM. Can be awaited more than once, so a
/// second signal can escalate a graceful shutdown.
#[derive(Debug)]
pub struct SignalHandler {
    #[cfg(unix)]
    sigterm: Signal,
}

impl SignalHandler {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            sigterm: unix_signal(SignalKind::terminate())?,
        })
    }

    #[cfg(unix)]
    pub async fn recv(&mut self) -> io::Result<ShutdownReason> {
        let reason = tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                ShutdownReason::Interrupt
            }
            _ = self.sigterm.recv() => ShutdownReason::Terminate,
        };
        info!(signal = %reason, "Received shutdown signal");
        Ok(reason)
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> io::Result<ShutdownReason> {
        signal::ctrl_c().await?;
        info!(signal = %ShutdownReason::Interrupt, "Received shutdown signal");
        Ok(ShutdownReason::Interrupt)
    }
}
