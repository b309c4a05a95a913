use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Failures of the mount pipeline that are not tied to a single module.
#[derive(Debug, Error)]
pub enum MountError {
    /// Entering or creating a mount namespace failed.
    #[error("failed to {operation} mount namespace: {source}")]
    Namespace {
        /// What was attempted.
        operation: &'static str,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// A module tree could not be read.
    #[error("failed to read module tree at '{path}': {source}")]
    Collect {
        /// Entry being read.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A single mount operation failed.
    #[error("{operation} of '{target}' failed: {source}")]
    Operation {
        /// Short operation name.
        operation: &'static str,
        /// Path being changed.
        target: Utf8PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The worker thread could not be started.
    #[error("failed to spawn mount worker: {source}")]
    Spawn {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The worker thread panicked.
    #[error("mount worker panicked")]
    WorkerPanic,
}

/// A module asks for something the base partition cannot host, such as a
/// new entry directly under a partition root.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("module '{module}' conflicts at '{path}': {reason}")]
pub struct ModuleConflictError {
    /// Module that contributed the entry.
    pub module: String,
    /// Real path of the entry.
    pub path: Utf8PathBuf,
    /// Why the entry cannot be mounted.
    pub reason: &'static str,
}
