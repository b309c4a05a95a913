//! Persisted count of boots that never reached boot-complete.

use std::io;
use std::path::PathBuf;

use crate::files::{atomic_write, read_optional};

/// Counter file; a missing or unreadable value counts as zero.
#[derive(Debug, Clone)]
pub struct BootCounter {
    path: PathBuf,
}

impl BootCounter {
    /// Counter stored at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Current count.
    pub fn read(&self) -> io::Result<u32> {
        Ok(read_optional(&self.path)?
            .and_then(|contents| contents.trim().parse().ok())
            .unwrap_or(0))
    }

    /// Bumps the count and returns the value it had before.
    pub fn increment(&self) -> io::Result<u32> {
        let previous = self.read()?;
        atomic_write(&self.path, previous.saturating_add(1).to_string().as_bytes())?;
        Ok(previous)
    }

    /// Resets the count to zero.
    pub fn reset(&self) -> io::Result<()> {
        atomic_write(&self.path, b"0")
    }
}
