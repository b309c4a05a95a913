//! Read-only view of the partitions being overlaid.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

/// Coarse type of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Directory.
    Directory,
    /// Anything bind-mountable as a file, devices and sockets included.
    File,
    /// Symbolic link.
    Symlink,
}

/// Lookup of the unmodified base filesystem.
pub trait BaseView: Send + Sync {
    /// Kind of the entry at `path`, without following a final symlink.
    fn kind(&self, path: &Utf8Path) -> Option<EntryKind>;

    /// Entries of the directory at `path`, sorted by name. Unreadable or
    /// missing directories list as empty.
    fn list(&self, path: &Utf8Path) -> Vec<(String, EntryKind)>;

    /// Target of the symlink at `path`.
    fn read_link(&self, path: &Utf8Path) -> Option<Utf8PathBuf>;
}

/// The live host filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostBase;

impl BaseView for HostBase {
    fn kind(&self, path: &Utf8Path) -> Option<EntryKind> {
        let file_type = fs::symlink_metadata(path).ok()?.file_type();
        Some(if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::File
        })
    }

    fn list(&self, path: &Utf8Path) -> Vec<(String, EntryKind)> {
        let Ok(entries) = path.read_dir_utf8() else {
            return Vec::new();
        };
        let mut listed: Vec<(String, EntryKind)> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let kind = self.kind(entry.path())?;
                Some((entry.file_name().to_owned(), kind))
            })
            .collect();
        listed.sort_by(|left, right| left.0.cmp(&right.0));
        listed
    }

    fn read_link(&self, path: &Utf8Path) -> Option<Utf8PathBuf> {
        path.read_link_utf8().ok()
    }
}
