//! In-memory image of module file trees.

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::{FileTypeExt, MetadataExt};

use camino::{Utf8Path, Utf8PathBuf};

use super::MountError;
use super::base::EntryKind;

/// File whose presence makes a directory hide everything beneath it from
/// lower layers and the base partition.
pub(crate) const REPLACE_MARKER: &str = ".replace";

/// Module that contributed a node, with its rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Module name.
    pub module: String,
    /// Module priority.
    pub priority: u32,
}

/// One node of a module tree, or of the merge of several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsNode {
    /// Directory whose children are layered over the lower contents.
    Directory {
        /// Entries by name.
        children: BTreeMap<String, FsNode>,
        /// Lower layers and the base are hidden below this directory.
        replace: bool,
        /// Highest module that contributed the directory, if any.
        origin: Option<Origin>,
    },
    /// Regular file served from a module.
    File {
        /// Path of the file inside the module.
        source: Utf8PathBuf,
        /// Contributing module.
        origin: Origin,
    },
    /// Symbolic link recreated in the mirror.
    Symlink {
        /// Link target, verbatim.
        target: Utf8PathBuf,
        /// Contributing module.
        origin: Origin,
    },
    /// Removes the path from the merged view.
    Whiteout {
        /// Contributing module.
        origin: Origin,
    },
}

impl FsNode {
    /// Empty directory with no contributor.
    #[must_use]
    pub fn empty_dir() -> Self {
        Self::Directory {
            children: BTreeMap::new(),
            replace: false,
            origin: None,
        }
    }

    /// Reads the tree rooted at `dir` as contributed by `origin`.
    pub fn collect(dir: &Utf8Path, origin: &Origin) -> Result<Self, MountError> {
        let read_error = |source| MountError::Collect {
            path: dir.to_path_buf(),
            source,
        };
        let mut children = BTreeMap::new();
        let mut replace = false;
        for item in dir.read_dir_utf8().map_err(read_error)? {
            let entry = item.map_err(read_error)?;
            let path = entry.path();
            let metadata = fs::symlink_metadata(path).map_err(|source| MountError::Collect {
                path: path.to_path_buf(),
                source,
            })?;
            let file_type = metadata.file_type();
            let node = if file_type.is_dir() {
                Self::collect(path, origin)?
            } else if file_type.is_symlink() {
                let target = path.read_link_utf8().map_err(|source| MountError::Collect {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::Symlink {
                    target,
                    origin: origin.clone(),
                }
            } else if entry.file_name() == REPLACE_MARKER {
                replace = true;
                continue;
            } else if file_type.is_char_device() && metadata.rdev() == 0 {
                Self::Whiteout {
                    origin: origin.clone(),
                }
            } else {
                Self::File {
                    source: path.to_path_buf(),
                    origin: origin.clone(),
                }
            };
            children.insert(entry.file_name().to_owned(), node);
        }
        Ok(Self::Directory {
            children,
            replace,
            origin: Some(origin.clone()),
        })
    }

    /// Module responsible for this node.
    #[must_use]
    pub fn origin(&self) -> Option<&Origin> {
        match self {
            Self::Directory { origin, .. } => origin.as_ref(),
            Self::File { origin, .. }
            | Self::Symlink { origin, .. }
            | Self::Whiteout { origin } => Some(origin),
        }
    }

    /// Kind of entry the node becomes once mounted; whiteouts have none.
    #[must_use]
    pub fn kind(&self) -> Option<EntryKind> {
        match self {
            Self::Directory { .. } => Some(EntryKind::Directory),
            Self::File { .. } => Some(EntryKind::File),
            Self::Symlink { .. } => Some(EntryKind::Symlink),
            Self::Whiteout { .. } => None,
        }
    }

    /// Child entries of a directory node.
    #[must_use]
    pub fn children(&self) -> Option<&BTreeMap<String, FsNode>> {
        match self {
            Self::Directory { children, .. } => Some(children),
            _ => None,
        }
    }
}
