//! Resolved view of what each touched path will show after mounting.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};

use super::base::{BaseView, EntryKind};
use super::merge::PartitionTree;
use super::tree::FsNode;

/// Where the visible content of a path comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
    /// Served by the winning module.
    Module {
        /// Module name.
        name: String,
        /// Module priority.
        priority: u32,
    },
    /// Left as the base partition has it.
    Base,
    /// Removed by a whiteout.
    Hidden {
        /// Module that hid the path.
        by: String,
    },
}

/// One resolved path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeEntry {
    /// Real path.
    pub path: Utf8PathBuf,
    /// Winning layer.
    pub source: EntrySource,
    /// Visible kind; hidden entries have none.
    pub kind: Option<EntryKind>,
}

/// Paths of every directory a module touches, plus their base siblings.
///
/// Untouched base subtrees are not expanded.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergedView {
    entries: BTreeMap<Utf8PathBuf, MergeEntry>,
}

impl MergedView {
    /// Resolves the partition trees against the base.
    #[must_use]
    pub fn build(partitions: &[PartitionTree], base: &dyn BaseView) -> Self {
        let mut view = Self::default();
        for partition in partitions {
            view.visit(&partition.tree, &partition.root, base);
        }
        view
    }

    /// Entry for `path`, when the merge touched it.
    #[must_use]
    pub fn get(&self, path: impl AsRef<Utf8Path>) -> Option<&MergeEntry> {
        self.entries.get(path.as_ref())
    }

    /// Whether `path` is resolved and not hidden.
    #[must_use]
    pub fn is_visible(&self, path: impl AsRef<Utf8Path>) -> bool {
        self.get(path)
            .is_some_and(|entry| !matches!(entry.source, EntrySource::Hidden { .. }))
    }

    /// Entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = &MergeEntry> {
        self.entries.values()
    }

    /// Number of resolved paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the merge touched nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn visit(&mut self, node: &FsNode, path: &Utf8Path, base: &dyn BaseView) {
        let source = match node {
            FsNode::Whiteout { origin } => EntrySource::Hidden {
                by: origin.module.clone(),
            },
            FsNode::Directory {
                replace: false,
                ..
            } if base.kind(path) == Some(EntryKind::Directory) => EntrySource::Base,
            _ => node.origin().map_or(EntrySource::Base, |origin| EntrySource::Module {
                name: origin.module.clone(),
                priority: origin.priority,
            }),
        };
        self.insert(path, source, node.kind());

        let FsNode::Directory {
            children, replace, ..
        } = node
        else {
            return;
        };
        for (name, child) in children {
            self.visit(child, &path.join(name), base);
        }
        if *replace {
            return;
        }
        for (name, kind) in base.list(path) {
            if !children.contains_key(&name) {
                self.insert(&path.join(&name), EntrySource::Base, Some(kind));
            }
        }
    }

    fn insert(&mut self, path: &Utf8Path, source: EntrySource, kind: Option<EntryKind>) {
        self.entries.insert(
            path.to_path_buf(),
            MergeEntry {
                path: path.to_path_buf(),
                source,
                kind,
            },
        );
    }
}
