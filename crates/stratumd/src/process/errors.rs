//! Errors raised while launching and supervising the daemon process.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTimeError;

use nix::errno::Errno;
use ortho_config::OrthoError;
use thiserror::Error;

use stratum_config::{RuntimePathsError, SocketPreparationError};

use super::daemonizer::DaemonizeError;
use super::shutdown::ShutdownError;
use crate::bootstrap::BootstrapError;
use crate::props::PersistenceError;
use crate::transport::ListenerError;

/// Why a launch stopped. Every variant aborts the run; the runtime lock is
/// released on the way out.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The configuration could not be loaded.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// The socket directory could not be prepared.
    #[error("failed to prepare daemon socket: {source}")]
    Socket {
        /// Filesystem error.
        #[source]
        source: SocketPreparationError,
    },
    /// The runtime directory next to the socket could not be created.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        /// Directory path.
        path: PathBuf,
        /// Filesystem error.
        #[source]
        source: io::Error,
    },
    /// The socket path has nowhere to put runtime artefacts.
    #[error("socket path '{path}' has no parent directory")]
    MissingSocketParent {
        /// Configured socket path.
        path: String,
    },
    /// The lock file could not be created.
    #[error("failed to create lock file '{path}': {source}")]
    LockCreate {
        /// Lock file path.
        path: PathBuf,
        /// Filesystem error.
        #[source]
        source: io::Error,
    },
    /// A live daemon owns the lock.
    #[error("daemon already running with pid {pid}")]
    AlreadyRunning {
        /// Pid read from the pid file.
        pid: u32,
    },
    /// A lock exists without a pid file, so another launch has not finished.
    #[error("another launch holds '{lock}' but has not written '{pid}'")]
    StartupInProgress {
        /// Lock file path.
        lock: PathBuf,
        /// Pid file path.
        pid: PathBuf,
    },
    /// A stale artefact of a dead daemon could not be removed.
    #[error("failed to remove stale file '{path}': {source}")]
    Cleanup {
        /// Artefact path.
        path: PathBuf,
        /// Filesystem error.
        #[source]
        source: io::Error,
    },
    /// The pid file could not be written.
    #[error("failed to write pid file '{path}': {source}")]
    PidWrite {
        /// Pid file path.
        path: PathBuf,
        /// Filesystem error.
        #[source]
        source: io::Error,
    },
    /// The health snapshot could not be written.
    #[error("failed to write health snapshot '{path}': {source}")]
    HealthWrite {
        /// Health file path.
        path: PathBuf,
        /// Filesystem error.
        #[source]
        source: io::Error,
    },
    /// The health snapshot could not be encoded.
    #[error("failed to encode health snapshot: {source}")]
    HealthEncode {
        /// Encoder error.
        #[from]
        source: serde_json::Error,
    },
    /// The system clock is before the Unix epoch.
    #[error("failed to read system time: {source}")]
    Clock {
        /// Clock error.
        #[source]
        source: SystemTimeError,
    },
    /// Probing the recorded pid failed.
    #[error("failed to probe process {pid}: {source}")]
    CheckProcess {
        /// Probed pid.
        pid: u32,
        /// OS error.
        source: Errno,
    },
    /// Health was published before the pid.
    #[error("pid must be written before updating health state")]
    MissingPid,
    /// Detaching into the background failed.
    #[error("failed to daemonise: {source}")]
    Daemonize {
        /// Daemonisation error.
        #[source]
        source: DaemonizeError,
    },
    /// Waiting for a stop request failed.
    #[error("failed to await shutdown: {source}")]
    Shutdown {
        /// Signal handling error.
        #[source]
        source: ShutdownError,
    },
    /// Bootstrap failed.
    #[error("daemon bootstrap failed: {source}")]
    Bootstrap {
        /// Bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// The persisted daemon state could not be opened.
    #[error("failed to open daemon state: {source}")]
    State {
        /// Persistence error.
        #[source]
        source: PersistenceError,
    },
    /// The socket listener failed.
    #[error("daemon socket listener failed: {source}")]
    Listener {
        /// Listener error.
        #[source]
        source: ListenerError,
    },
}

macro_rules! wrap_source {
    ($($source:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$source> for LaunchError {
                fn from(source: $source) -> Self {
                    Self::$variant { source }
                }
            }
        )+
    };
}

wrap_source! {
    Arc<OrthoError> => Config,
    SocketPreparationError => Socket,
    DaemonizeError => Daemonize,
    ShutdownError => Shutdown,
    BootstrapError => Bootstrap,
    PersistenceError => State,
    ListenerError => Listener,
}

impl From<RuntimePathsError> for LaunchError {
    fn from(source: RuntimePathsError) -> Self {
        match source {
            RuntimePathsError::MissingSocketParent { path } => Self::MissingSocketParent { path },
            RuntimePathsError::RuntimeDirectory { path, source } => {
                Self::RuntimeDirectory { path, source }
            }
        }
    }
}
