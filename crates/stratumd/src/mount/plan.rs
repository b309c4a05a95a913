//! Turning merged trees into an ordered list of mount operations.
//!
//! A directory whose merged content the base cannot host in place (new
//! entries, symlinks, whiteouts, kind changes, replacing directories) is
//! rebuilt in a tmpfs worker tree: base entries are mirrored, module
//! entries layered on top, and the finished directory is bound over the
//! real one. Everything else is bound file by file.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;

use super::base::{BaseView, EntryKind};
use super::merge::PartitionTree;
use super::tree::{FsNode, Origin};
use super::{MOUNT_TARGET, ModuleConflictError};

/// One concrete filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOp {
    /// Mounts the tmpfs backing the worker tree.
    MountTmpfs {
        /// Worker root.
        target: Utf8PathBuf,
    },
    /// Creates a directory in the worker tree.
    MakeDir {
        /// Worker path.
        path: Utf8PathBuf,
        /// Entry whose security label the directory copies.
        context_from: Option<Utf8PathBuf>,
    },
    /// Creates a symlink in the worker tree.
    Symlink {
        /// Worker path.
        path: Utf8PathBuf,
        /// Link target.
        target: Utf8PathBuf,
        /// Entry whose security label the link copies.
        context_from: Option<Utf8PathBuf>,
    },
    /// Binds `source` over `target`.
    Bind {
        /// Content to expose.
        source: Utf8PathBuf,
        /// Mount point.
        target: Utf8PathBuf,
        /// Empty entry to create at `target` before binding.
        placeholder: Option<EntryKind>,
        /// Carries submounts along.
        recursive: bool,
    },
    /// Hides `target` behind an empty entry of the same kind.
    Mask {
        /// Path to hide.
        target: Utf8PathBuf,
        /// Kind of the hidden entry.
        kind: EntryKind,
    },
}

impl MountOp {
    /// Path the operation changes.
    #[must_use]
    pub fn target(&self) -> &Utf8Path {
        match self {
            Self::MountTmpfs { target }
            | Self::Bind { target, .. }
            | Self::Mask { target, .. } => target,
            Self::MakeDir { path, .. } | Self::Symlink { path, .. } => path,
        }
    }

    /// Short name used in logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MountTmpfs { .. } => "tmpfs mount",
            Self::MakeDir { .. } => "mkdir",
            Self::Symlink { .. } => "symlink",
            Self::Bind { .. } => "bind mount",
            Self::Mask { .. } => "mask",
        }
    }
}

impl fmt::Display for MountOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { source, target, .. } => write!(f, "bind {source} -> {target}"),
            Self::Symlink { path, target, .. } => write!(f, "symlink {path} -> {target}"),
            other => write!(f, "{} {}", other.name(), other.target()),
        }
    }
}

/// Ordering band of an operation; bands run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Worker tmpfs and directory skeleton, in tree order.
    Structure,
    /// File content, lowest priority first.
    Content,
    /// Worker directories bound over the real ones.
    Attach,
}

/// An operation with its ordering and ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOp {
    /// The change itself.
    pub op: MountOp,
    /// Ordering band.
    pub phase: Phase,
    /// Priority of the owning module; base mirroring has none and sorts
    /// first.
    pub rank: Option<u32>,
    /// Module whose content the operation serves.
    pub module: Option<String>,
}

/// Operations for one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    /// Partition name.
    pub name: String,
    /// Ordered operations.
    pub ops: Vec<PlannedOp>,
}

/// Everything needed to realise a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountPlan {
    /// Worker tmpfs setup; empty when no directory needs rebuilding.
    pub setup: Vec<PlannedOp>,
    /// Per-partition operations.
    pub partitions: Vec<PartitionPlan>,
}

impl MountPlan {
    /// All operations in execution order.
    pub fn ops(&self) -> impl Iterator<Item = &PlannedOp> {
        self.setup
            .iter()
            .chain(self.partitions.iter().flat_map(|partition| &partition.ops))
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops().count()
    }

    /// Whether the plan changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops().next().is_none()
    }
}

/// Plans the partitions against `base`.
///
/// Fails with the offending module when an entry would require rebuilding a
/// partition root, which cannot be replaced by a tmpfs.
pub fn plan(
    partitions: &[PartitionTree],
    base: &dyn BaseView,
    root_dir: &Utf8Path,
    worker_dir: &Utf8Path,
) -> Result<MountPlan, ModuleConflictError> {
    let mut planner = Planner {
        base,
        root_dir,
        worker_dir,
        ops: Vec::new(),
        uses_worker: false,
    };
    let mut plans = Vec::with_capacity(partitions.len());
    for partition in partitions {
        planner.commit_root(&partition.tree, &partition.root)?;
        let mut ops = std::mem::take(&mut planner.ops);
        ops.sort_by_key(|planned| {
            let rank = (planned.phase == Phase::Content).then_some(planned.rank).flatten();
            (planned.phase, rank)
        });
        if !ops.is_empty() {
            plans.push(PartitionPlan {
                name: partition.name.clone(),
                ops,
            });
        }
    }
    let setup = if planner.uses_worker {
        vec![PlannedOp {
            op: MountOp::MountTmpfs {
                target: worker_dir.to_path_buf(),
            },
            phase: Phase::Structure,
            rank: None,
            module: None,
        }]
    } else {
        Vec::new()
    };
    Ok(MountPlan {
        setup,
        partitions: plans,
    })
}

struct Planner<'a> {
    base: &'a dyn BaseView,
    root_dir: &'a Utf8Path,
    worker_dir: &'a Utf8Path,
    ops: Vec<PlannedOp>,
    uses_worker: bool,
}

impl Planner<'_> {
    fn commit_root(&mut self, node: &FsNode, root: &Utf8Path) -> Result<(), ModuleConflictError> {
        let FsNode::Directory {
            children, replace, ..
        } = node
        else {
            return Ok(());
        };
        if *replace {
            warn!(
                target: MOUNT_TARGET,
                partition = %root,
                "ignoring replace marker on a partition root"
            );
        }
        for (name, child) in children {
            let real = root.join(name);
            match child {
                FsNode::Whiteout { origin } => {
                    if let Some(kind) = self.base.kind(&real) {
                        self.uses_worker = true;
                        self.push(
                            MountOp::Mask { target: real, kind },
                            Phase::Content,
                            Some(origin),
                        );
                    }
                }
                _ if self.needs_tmpfs_parent(child, &real) => {
                    return Err(ModuleConflictError {
                        module: child
                            .origin()
                            .map(|origin| origin.module.clone())
                            .unwrap_or_default(),
                        path: real,
                        reason: "entry cannot be added directly under a partition root",
                    });
                }
                _ => self.commit(child, &real),
            }
        }
        Ok(())
    }

    /// Commits a node whose parent stays the real directory.
    fn commit(&mut self, node: &FsNode, real: &Utf8Path) {
        match node {
            FsNode::Directory {
                children, replace, ..
            } => {
                let rebuild = *replace
                    || children
                        .iter()
                        .any(|(name, child)| self.needs_tmpfs_parent(child, &real.join(name)));
                if rebuild {
                    let worker = self.worker_path(real);
                    self.commit_tmpfs(node, real, &worker, None);
                    self.push(
                        MountOp::Bind {
                            source: worker,
                            target: real.to_path_buf(),
                            placeholder: None,
                            recursive: true,
                        },
                        Phase::Attach,
                        None,
                    );
                } else {
                    for (name, child) in children {
                        self.commit(child, &real.join(name));
                    }
                }
            }
            FsNode::File { source, origin } => self.push(
                MountOp::Bind {
                    source: source.clone(),
                    target: real.to_path_buf(),
                    placeholder: None,
                    recursive: false,
                },
                Phase::Content,
                Some(origin),
            ),
            FsNode::Symlink { .. } | FsNode::Whiteout { .. } => {
                warn!(
                    target: MOUNT_TARGET,
                    path = %real,
                    "entry needs a rebuilt parent; skipping"
                );
            }
        }
    }

    /// Rebuilds `node` at `worker`, mirroring the base directory at `real`.
    fn commit_tmpfs(
        &mut self,
        node: &FsNode,
        real: &Utf8Path,
        worker: &Utf8Path,
        inherited_context: Option<&Utf8Path>,
    ) {
        let FsNode::Directory {
            children, replace, ..
        } = node
        else {
            return;
        };
        self.uses_worker = true;
        let in_base = self.base.kind(real) == Some(EntryKind::Directory);
        let context_from = if in_base {
            Some(real.to_path_buf())
        } else {
            inherited_context.map(Utf8Path::to_path_buf)
        };
        self.push(
            MountOp::MakeDir {
                path: worker.to_path_buf(),
                context_from: context_from.clone(),
            },
            Phase::Structure,
            node.origin(),
        );

        if in_base && !*replace {
            for (name, kind) in self.base.list(real) {
                if !children.contains_key(&name) {
                    self.mirror(kind, &real.join(&name), &worker.join(&name));
                }
            }
        }

        for (name, child) in children {
            let child_real = real.join(name);
            let child_worker = worker.join(name);
            match child {
                FsNode::Directory { .. } => self.commit_tmpfs(
                    child,
                    &child_real,
                    &child_worker,
                    context_from.as_deref(),
                ),
                FsNode::File { source, origin } => self.push(
                    MountOp::Bind {
                        source: source.clone(),
                        target: child_worker,
                        placeholder: Some(EntryKind::File),
                        recursive: false,
                    },
                    Phase::Content,
                    Some(origin),
                ),
                FsNode::Symlink { target, origin } => {
                    let link_context = if self.base.kind(&child_real).is_some() {
                        Some(child_real)
                    } else {
                        context_from.clone()
                    };
                    self.push(
                        MountOp::Symlink {
                            path: child_worker,
                            target: target.clone(),
                            context_from: link_context,
                        },
                        Phase::Structure,
                        Some(origin),
                    );
                }
                FsNode::Whiteout { .. } => {}
            }
        }
    }

    /// Recreates an untouched base entry inside the worker tree.
    fn mirror(&mut self, kind: EntryKind, real: &Utf8Path, worker: &Utf8Path) {
        match kind {
            EntryKind::Directory => {
                self.commit_tmpfs(&FsNode::empty_dir(), real, worker, None);
            }
            EntryKind::Symlink => {
                if let Some(target) = self.base.read_link(real) {
                    self.push(
                        MountOp::Symlink {
                            path: worker.to_path_buf(),
                            target,
                            context_from: Some(real.to_path_buf()),
                        },
                        Phase::Structure,
                        None,
                    );
                }
            }
            EntryKind::File => self.push(
                MountOp::Bind {
                    source: real.to_path_buf(),
                    target: worker.to_path_buf(),
                    placeholder: Some(EntryKind::File),
                    recursive: false,
                },
                Phase::Content,
                None,
            ),
        }
    }

    /// Whether placing `child` at `real` forces its parent into the worker.
    fn needs_tmpfs_parent(&self, child: &FsNode, real: &Utf8Path) -> bool {
        match child {
            FsNode::Directory { .. } => self.base.kind(real) != Some(EntryKind::Directory),
            FsNode::File { .. } => self.base.kind(real) != Some(EntryKind::File),
            FsNode::Symlink { .. } | FsNode::Whiteout { .. } => true,
        }
    }

    fn worker_path(&self, real: &Utf8Path) -> Utf8PathBuf {
        let relative = real.strip_prefix(self.root_dir).unwrap_or(real);
        self.worker_dir.join(relative)
    }

    fn push(&mut self, op: MountOp, phase: Phase, owner: Option<&Origin>) {
        self.ops.push(PlannedOp {
            op,
            phase,
            rank: owner.map(|origin| origin.priority),
            module: owner.map(|origin| origin.module.clone()),
        });
    }
}
