//! Waiting for the daemon to be told to exit.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::flag;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

const TERMINATION_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until shutdown should proceed. `stop` is raised by clients
    /// asking the daemon to exit.
    fn wait(&self, stop: &AtomicBool) -> Result<(), ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Shutdown listener that polls for termination signals and stop requests.
#[derive(Debug, Clone)]
pub struct SystemShutdownSignal {
    poll: Duration,
}

impl SystemShutdownSignal {
    /// Builds a listener that checks its flags every `poll`.
    #[must_use]
    pub const fn new(poll: Duration) -> Self {
        Self { poll }
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self, stop: &AtomicBool) -> Result<(), ShutdownError> {
        let signalled = Arc::new(AtomicBool::new(false));
        for signal in TERMINATION_SIGNALS {
            flag::register(signal, Arc::clone(&signalled))
                .map_err(|source| ShutdownError::Install { source })?;
        }
        loop {
            if signalled.load(Ordering::SeqCst) {
                info!(target: PROCESS_TARGET, "termination signal received");
                return Ok(());
            }
            if stop.load(Ordering::SeqCst) {
                info!(target: PROCESS_TARGET, "stop requested by client");
                return Ok(());
            }
            thread::sleep(self.poll);
        }
    }
}
