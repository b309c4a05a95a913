//! Record of mounts made by the daemon, kept so a later pass can undo them.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::MOUNT_TARGET;

#[derive(Debug, Serialize, Deserialize)]
struct JournalRecord {
    target: Utf8PathBuf,
}

/// Append-only JSON-lines file of mount targets.
#[derive(Debug, Clone)]
pub struct MountJournal {
    path: PathBuf,
}

impl MountJournal {
    /// Journal stored at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Journal for the private namespace pass, kept next to this one.
    #[must_use]
    pub fn private_pass(&self) -> Self {
        let mut path = self.path.clone().into_os_string();
        path.push(".private");
        Self { path: path.into() }
    }

    /// Appends `target`; called before the mount is attempted.
    pub fn record(&self, target: &Utf8Path) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_vec(&JournalRecord {
            target: target.to_path_buf(),
        })?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        file.sync_data()
    }

    /// Recorded targets, oldest first. Malformed lines are skipped.
    pub fn pending(&self) -> io::Result<Vec<Utf8PathBuf>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error),
        };
        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<JournalRecord>(line) {
                Ok(record) => Some(record.target),
                Err(error) => {
                    warn!(
                        target: MOUNT_TARGET,
                        journal = %self.path.display(),
                        error = %error,
                        "skipping malformed journal line"
                    );
                    None
                }
            })
            .collect())
    }

    /// Forgets every recorded target.
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error),
            _ => Ok(()),
        }
    }
}
