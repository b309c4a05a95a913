//! Layering module trees into one tree per partition.

use std::collections::btree_map::Entry;

use camino::{Utf8Path, Utf8PathBuf};

use super::base::{BaseView, EntryKind};
use super::tree::FsNode;

/// Partitions that may be addressed through `system/<name>` in a module
/// tree when the device ships them as separate mounts.
const SECONDARY_PARTITIONS: [&str; 3] = ["vendor", "product", "system_ext"];

/// Merged tree destined for one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTree {
    /// Partition name.
    pub name: String,
    /// Real mount point of the partition.
    pub root: Utf8PathBuf,
    /// Layered module content.
    pub tree: FsNode,
}

/// Folds `upper` over `lower`; `upper` wins wherever both define a path.
///
/// Directories merge recursively unless the upper one is a replacing
/// directory. A directory laid over a whiteout hides whatever the whiteout
/// hid, so it becomes replacing.
pub(crate) fn overlay(lower: &mut FsNode, upper: FsNode) {
    let FsNode::Directory {
        children: upper_children,
        replace: upper_replace,
        origin: upper_origin,
    } = upper
    else {
        *lower = upper;
        return;
    };
    match lower {
        FsNode::Directory {
            children,
            replace,
            origin,
        } => {
            if upper_replace {
                children.clear();
                *replace = true;
            }
            if upper_origin.is_some() {
                *origin = upper_origin;
            }
            for (name, node) in upper_children {
                match children.entry(name) {
                    Entry::Vacant(slot) => {
                        slot.insert(node);
                    }
                    Entry::Occupied(mut slot) => overlay(slot.get_mut(), node),
                }
            }
        }
        FsNode::Whiteout { .. } => {
            *lower = FsNode::Directory {
                children: upper_children,
                replace: true,
                origin: upper_origin,
            };
        }
        FsNode::File { .. } | FsNode::Symlink { .. } => {
            *lower = FsNode::Directory {
                children: upper_children,
                replace: upper_replace,
                origin: upper_origin,
            };
        }
    }
}

/// Layers module trees given in ascending priority.
pub(crate) fn merge(trees: impl IntoIterator<Item = FsNode>) -> FsNode {
    let mut merged = FsNode::empty_dir();
    for tree in trees {
        overlay(&mut merged, tree);
    }
    merged
}

/// Splits the merged `system` tree into per-partition trees.
///
/// `system/vendor` and friends move to their own partition when the base
/// has a real directory at `<root_dir>/<name>`; otherwise they stay part of
/// the system tree.
pub(crate) fn split_partitions(
    mut system: FsNode,
    base: &dyn BaseView,
    root_dir: &Utf8Path,
) -> Vec<PartitionTree> {
    let mut secondary = Vec::new();
    if let FsNode::Directory { children, .. } = &mut system {
        for name in SECONDARY_PARTITIONS {
            let root = root_dir.join(name);
            if base.kind(&root) != Some(EntryKind::Directory) {
                continue;
            }
            let is_dir = matches!(children.get(name), Some(FsNode::Directory { .. }));
            if let Some(tree) = is_dir.then(|| children.remove(name)).flatten() {
                secondary.push(PartitionTree {
                    name: name.to_owned(),
                    root,
                    tree,
                });
            }
        }
    }
    let mut partitions = Vec::with_capacity(secondary.len() + 1);
    partitions.push(PartitionTree {
        name: "system".to_owned(),
        root: root_dir.join("system"),
        tree: system,
    });
    partitions.extend(secondary);
    partitions
}
