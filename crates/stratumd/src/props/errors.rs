use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to read or write the persisted override file.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The override file exists but could not be read.
    #[error("failed to read property file '{path}': {source}")]
    Read {
        /// Override file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The override file could not be rewritten.
    #[error("failed to write property file '{path}': {source}")]
    Write {
        /// Override file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A property name or value cannot be represented in the file format.
    #[error("property '{name}' cannot be stored: {reason}")]
    Unrepresentable {
        /// Offending property name.
        name: String,
        /// Why the entry was rejected.
        reason: &'static str,
    },
}
