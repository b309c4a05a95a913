use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Failures while reading or rearranging the module directories.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// A module directory could not be listed.
    #[error("failed to read module directory '{path}': {source}")]
    ReadDir {
        /// Directory being listed.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// An entry name was not valid UTF-8.
    #[error("module entry in '{parent}' has a non UTF-8 name")]
    NonUtf8Name {
        /// Directory holding the entry.
        parent: Utf8PathBuf,
    },
    /// A module directory or marker could not be changed.
    #[error("failed to update '{path}': {source}")]
    Modify {
        /// Path being changed.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl ModuleError {
    pub(crate) fn modify(path: impl Into<Utf8PathBuf>, source: io::Error) -> Self {
        Self::Modify {
            path: path.into(),
            source,
        }
    }
}
