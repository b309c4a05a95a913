//! Applying module trees to the live system.
//!
//! Work happens on a dedicated thread because namespace changes are
//! per-thread. The thread starts in the daemon's namespace, which is init's,
//! and undoes what earlier runs left there. It then isolates itself in a
//! private mount namespace, and optionally joins init's namespace again to
//! publish the result.
//!
//! Each namespace has its own journal. Only the init journal outlives a run;
//! the private one is discarded because its namespace dies with the thread.

use std::sync::Arc;
use std::thread;

use camino::{Utf8Path, Utf8PathBuf};
use stratum_config::Config;
use tracing::{debug, info, trace, warn};

use super::base::{BaseView, EntryKind};
use super::capability::MountCapability;
use super::journal::MountJournal;
use super::merge::{merge, split_partitions};
use super::plan::{MountOp, MountPlan, plan};
use super::tree::{FsNode, Origin};
use super::view::MergedView;
use super::{MOUNT_TARGET, MountError};
use crate::modules::Module;
use crate::selinux::{SecurityContexts, copy_context};

const INIT_PID: i32 = 1;
const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;
const MASK_MODE: u32 = 0o000;

/// Mount-related configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSettings {
    /// Prefix under which partitions are found.
    pub root_dir: Utf8PathBuf,
    /// Where rebuilt directories are assembled.
    pub worker_dir: Utf8PathBuf,
    /// Source tag of the worker tmpfs.
    pub mount_tag: String,
    /// Repeat the pass in init's mount namespace.
    pub propagate_global: bool,
}

impl MountSettings {
    /// Reads the settings from the daemon configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            root_dir: config.root_dir().to_path_buf(),
            worker_dir: config.worker_dir().to_path_buf(),
            mount_tag: config.mount_tag.clone(),
            propagate_global: config.propagate_global,
        }
    }
}

/// A module left out of the mount, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedModule {
    /// Module name.
    pub name: String,
    /// Why it was left out.
    pub reason: String,
}

/// Outcome of a mount run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountReport {
    /// Operations applied by the final pass.
    pub applied: usize,
    /// Modules whose content was not mounted.
    pub excluded: Vec<ExcludedModule>,
    /// Problems that did not stop the run.
    pub notes: Vec<String>,
}

impl MountReport {
    /// Whether `name` was left out.
    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.iter().any(|module| module.name == name)
    }

    /// Summary of the problems, if any.
    #[must_use]
    pub fn degraded(&self) -> Option<String> {
        let mut summary = String::new();
        for note in &self.notes {
            if !summary.is_empty() {
                summary.push_str("; ");
            }
            summary.push_str(note);
        }
        if !self.excluded.is_empty() {
            if !summary.is_empty() {
                summary.push_str("; ");
            }
            summary.push_str(&format!("{} module(s) excluded", self.excluded.len()));
        }
        (!summary.is_empty()).then_some(summary)
    }

    fn exclude(&mut self, name: &str, reason: String) -> bool {
        if self.is_excluded(name) {
            return false;
        }
        warn!(
            target: MOUNT_TARGET,
            module = %name,
            reason = %reason,
            "module excluded from mount"
        );
        self.excluded.push(ExcludedModule {
            name: name.to_owned(),
            reason,
        });
        true
    }
}

/// A failed operation that a specific module's content caused.
struct ModuleFailure {
    module: String,
    error: MountError,
}

/// Drives collection, merging, planning and application.
pub struct MountOrchestrator {
    settings: MountSettings,
    journal: MountJournal,
    base: Arc<dyn BaseView>,
    mounts: Arc<dyn MountCapability>,
    contexts: Arc<dyn SecurityContexts>,
}

impl MountOrchestrator {
    /// Builds an orchestrator over the given capabilities.
    #[must_use]
    pub fn new(
        settings: MountSettings,
        journal: MountJournal,
        base: Arc<dyn BaseView>,
        mounts: Arc<dyn MountCapability>,
        contexts: Arc<dyn SecurityContexts>,
    ) -> Self {
        Self {
            settings,
            journal,
            base,
            mounts,
            contexts,
        }
    }

    /// Mounts the content of `modules` that contribute files.
    ///
    /// Re-running converges on the same mount table: every pass first
    /// undoes what the journal recorded.
    pub fn run(&self, modules: &[Module]) -> Result<MountReport, MountError> {
        // The private journal names mounts in a namespace that no longer exists.
        if let Err(error) = self.journal.private_pass().clear() {
            warn!(target: MOUNT_TARGET, error = %error, "private mount journal not cleared");
        }
        thread::scope(|scope| {
            let worker = thread::Builder::new()
                .name("stratumd-mount".to_owned())
                .spawn_scoped(scope, || self.mount_modules(modules))
                .map_err(|source| MountError::Spawn { source })?;
            worker.join().map_err(|_| MountError::WorkerPanic)
        })
    }

    /// Merged view of `modules` as the next run would mount it.
    #[must_use]
    pub fn preview(&self, modules: &[Module]) -> MergedView {
        let mut report = MountReport::default();
        let trees = collect_trees(modules, &mut report);
        let system = merge(trees.into_iter().map(|(_, tree)| tree));
        let partitions = split_partitions(system, self.base.as_ref(), &self.settings.root_dir);
        MergedView::build(&partitions, self.base.as_ref())
    }

    fn mount_modules(&self, modules: &[Module]) -> MountReport {
        let mut report = MountReport::default();
        let trees = collect_trees(modules, &mut report);
        let private = self.journal.private_pass();

        self.cleanup(&self.journal);
        if let Err(source) = self.mounts.unshare_namespace() {
            let error = MountError::Namespace {
                operation: "unshare",
                source,
            };
            warn!(target: MOUNT_TARGET, error = %error, "mounting skipped");
            report.notes.push(error.to_string());
            return report;
        }
        self.converge(&trees, &mut report, &private);

        if self.settings.propagate_global {
            match self.mounts.join_namespace(INIT_PID) {
                Ok(()) => self.converge(&trees, &mut report, &self.journal),
                Err(source) => {
                    let error = MountError::Namespace {
                        operation: "join init",
                        source,
                    };
                    warn!(target: MOUNT_TARGET, error = %error, "global mount skipped");
                    report.notes.push(error.to_string());
                }
            }
        }
        info!(
            target: MOUNT_TARGET,
            applied = report.applied,
            excluded = report.excluded.len(),
            "module mount finished"
        );
        report
    }

    /// Plans and applies until no module content fails.
    fn converge(
        &self,
        trees: &[(String, FsNode)],
        report: &mut MountReport,
        journal: &MountJournal,
    ) {
        loop {
            let plan = match self.plan(trees, report) {
                Ok(plan) => plan,
                Err(conflict) => {
                    if !report.exclude(&conflict.module, conflict.to_string()) {
                        report.notes.push(conflict.to_string());
                        return;
                    }
                    continue;
                }
            };
            self.cleanup(journal);
            match self.apply(&plan, journal) {
                Ok((applied, shared_failures)) => {
                    report.applied = applied;
                    if shared_failures > 0 {
                        report
                            .notes
                            .push(format!("{shared_failures} shared mount operation(s) failed"));
                    }
                    return;
                }
                Err(failure) => {
                    self.cleanup(journal);
                    if !report.exclude(&failure.module, failure.error.to_string()) {
                        report.notes.push(failure.error.to_string());
                        return;
                    }
                }
            }
        }
    }

    fn plan(
        &self,
        trees: &[(String, FsNode)],
        report: &MountReport,
    ) -> Result<MountPlan, super::ModuleConflictError> {
        let active = trees
            .iter()
            .filter(|(name, _)| !report.is_excluded(name))
            .map(|(_, tree)| tree.clone());
        let partitions = split_partitions(
            merge(active),
            self.base.as_ref(),
            &self.settings.root_dir,
        );
        if tracing::enabled!(target: MOUNT_TARGET, tracing::Level::TRACE) {
            for entry in MergedView::build(&partitions, self.base.as_ref()).iter() {
                trace!(
                    target: MOUNT_TARGET,
                    path = %entry.path,
                    source = ?entry.source,
                    "merged entry"
                );
            }
        }
        plan(
            &partitions,
            self.base.as_ref(),
            &self.settings.root_dir,
            &self.settings.worker_dir,
        )
    }

    /// Executes the plan. Returns the applied count and the number of
    /// failed operations no module owns.
    fn apply(
        &self,
        plan: &MountPlan,
        journal: &MountJournal,
    ) -> Result<(usize, usize), ModuleFailure> {
        let mut applied = 0;
        let mut shared_failures = 0;
        for planned in plan.ops() {
            debug!(target: MOUNT_TARGET, op = %planned.op, "applying");
            let Err(source) = self.execute(&planned.op, journal) else {
                applied += 1;
                continue;
            };
            let error = MountError::Operation {
                operation: planned.op.name(),
                target: planned.op.target().to_path_buf(),
                source,
            };
            if let Some(module) = &planned.module {
                return Err(ModuleFailure {
                    module: module.clone(),
                    error,
                });
            }
            warn!(target: MOUNT_TARGET, error = %error, "mount operation failed");
            shared_failures += 1;
        }
        Ok((applied, shared_failures))
    }

    fn execute(&self, op: &MountOp, journal: &MountJournal) -> std::io::Result<()> {
        match op {
            MountOp::MountTmpfs { target } => {
                self.mounts.create_dir(target, DIR_MODE)?;
                journal.record(target)?;
                self.mounts.mount_tmpfs(target, &self.settings.mount_tag)
            }
            MountOp::MakeDir { path, context_from } => {
                self.mounts.create_dir(path, DIR_MODE)?;
                self.label(path, context_from.as_deref());
                Ok(())
            }
            MountOp::Symlink {
                path,
                target,
                context_from,
            } => {
                self.mounts.symlink(target, path)?;
                self.label(path, context_from.as_deref());
                Ok(())
            }
            MountOp::Bind {
                source,
                target,
                placeholder,
                recursive,
            } => {
                match placeholder {
                    Some(EntryKind::Directory) => self.mounts.create_dir(target, DIR_MODE)?,
                    Some(_) => self.mounts.create_file(target, FILE_MODE)?,
                    None => {}
                }
                journal.record(target)?;
                self.mounts.bind_mount(source, target, *recursive)
            }
            MountOp::Mask { target, kind } => {
                let placeholder = self.mask_placeholder(*kind)?;
                journal.record(target)?;
                self.mounts.bind_mount(&placeholder, target, false)
            }
        }
    }

    /// Empty entry in the worker tree that masks a path of `kind`.
    fn mask_placeholder(&self, kind: EntryKind) -> std::io::Result<Utf8PathBuf> {
        if kind == EntryKind::Directory {
            let path = self.settings.worker_dir.join(".mask-dir");
            self.mounts.create_dir(&path, MASK_MODE)?;
            Ok(path)
        } else {
            let path = self.settings.worker_dir.join(".mask-file");
            self.mounts.create_file(&path, MASK_MODE)?;
            Ok(path)
        }
    }

    fn label(&self, path: &Utf8Path, from: Option<&Utf8Path>) {
        let Some(from) = from else {
            return;
        };
        if let Err(error) = copy_context(self.contexts.as_ref(), from, path) {
            debug!(
                target: MOUNT_TARGET,
                path = %path,
                from = %from,
                error = %error,
                "security label not copied"
            );
        }
    }

    /// Undoes every mount `journal` recorded, newest first, in the current
    /// namespace.
    fn cleanup(&self, journal: &MountJournal) {
        let targets = match journal.pending() {
            Ok(targets) => targets,
            Err(error) => {
                warn!(target: MOUNT_TARGET, error = %error, "mount journal unreadable");
                return;
            }
        };
        for target in targets.iter().rev() {
            if let Err(error) = self.mounts.unmount(target) {
                let stale = matches!(error.raw_os_error(), Some(libc::EINVAL | libc::ENOENT));
                if stale {
                    trace!(target: MOUNT_TARGET, path = %target, "journaled mount already gone");
                } else {
                    warn!(target: MOUNT_TARGET, path = %target, error = %error, "unmount failed");
                }
            }
        }
        if let Err(error) = journal.clear() {
            warn!(target: MOUNT_TARGET, error = %error, "mount journal not cleared");
        }
    }
}

/// Reads each mounting module's tree, lowest priority first.
fn collect_trees(modules: &[Module], report: &mut MountReport) -> Vec<(String, FsNode)> {
    let mut candidates: Vec<&Module> = modules
        .iter()
        .filter(|module| module.mounts_files())
        .collect();
    candidates.sort_by_key(|module| module.priority);

    let mut trees = Vec::with_capacity(candidates.len());
    for module in candidates {
        let root = module.system_tree();
        if !root.is_dir() {
            continue;
        }
        let origin = Origin {
            module: module.name.clone(),
            priority: module.priority,
        };
        match FsNode::collect(&root, &origin) {
            Ok(tree) => trees.push((module.name.clone(), tree)),
            Err(error) => {
                report.exclude(&module.name, error.to_string());
            }
        }
    }
    trees
}

impl std::fmt::Debug for MountOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountOrchestrator")
            .field("settings", &self.settings)
            .field("journal", &self.journal)
            .finish_non_exhaustive()
    }
}
