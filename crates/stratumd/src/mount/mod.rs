//! Overlaying module file trees onto the system partitions.
//!
//! Module trees are collected, layered by priority, split per partition,
//! resolved against the base filesystem into a plan, and applied through a
//! [`MountCapability`]. Applied mounts are journaled so the next pass can
//! undo them first.

mod base;
mod capability;
mod errors;
mod journal;
mod merge;
mod orchestrator;
mod plan;
mod tree;
mod view;


pub use base::{BaseView, EntryKind, HostBase};
pub use capability::{HostMounts, MountCapability};
pub use errors::{ModuleConflictError, MountError};
pub use journal::MountJournal;
pub use merge::PartitionTree;
pub use orchestrator::{ExcludedModule, MountOrchestrator, MountReport, MountSettings};
pub use plan::{MountOp, MountPlan, PartitionPlan, Phase, PlannedOp, plan};
pub use tree::{FsNode, Origin};
pub use view::{EntrySource, MergeEntry, MergedView};

#[cfg(test)]
pub(crate) use base::test_support::MemoryBase;
#[cfg(test)]
pub(crate) use capability::test_support::RecordingMounts;

const MOUNT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::mount");
