//! The boot-stage state machine.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use super::{BOOT_TARGET, BootStage, StageOutcome, StageReport};
use crate::health::HealthReporter;

/// Work performed when a stage runs for the first time.
pub trait StageHooks: Send + Sync {
    /// Mounts modules and loads their properties.
    fn post_fs_data(&self) -> StageReport;

    /// Runs once late-start services begin.
    fn late_start(&self) -> StageReport;

    /// Runs once the system reports boot completion.
    fn boot_complete(&self) -> StageReport;
}

#[derive(Debug, Default)]
struct BootFlags {
    post_fs_data: bool,
    late_start: bool,
    boot_complete: bool,
    safe_mode: bool,
}

impl BootFlags {
    const fn current(&self) -> BootStage {
        if self.boot_complete {
            BootStage::BootComplete
        } else if self.late_start {
            BootStage::LateStart
        } else if self.post_fs_data {
            BootStage::PostFsData
        } else {
            BootStage::Init
        }
    }
}

/// Runs each stage's hooks at most once, in boot order.
///
/// The flag lock is held while a hook runs, so a concurrent trigger of the
/// same stage waits and then reports it as already done.
pub struct BootController {
    flags: Mutex<BootFlags>,
    reporter: Arc<dyn HealthReporter>,
}

impl BootController {
    /// Controller in the [`BootStage::Init`] state.
    #[must_use]
    pub fn new(reporter: Arc<dyn HealthReporter>) -> Self {
        Self {
            flags: Mutex::new(BootFlags::default()),
            reporter,
        }
    }

    /// Furthest stage that has run.
    #[must_use]
    pub fn stage(&self) -> BootStage {
        self.lock().current()
    }

    /// Whether post-fs-data entered safe mode.
    #[must_use]
    pub fn safe_mode(&self) -> bool {
        self.lock().safe_mode
    }

    /// Runs `stage` unless it already ran or its preconditions are unmet.
    ///
    /// Late-start needs post-fs-data outside safe mode and is skipped once
    /// boot has completed. Boot-complete needs post-fs-data. Skipped stages
    /// are not marked as run.
    pub fn trigger(&self, stage: BootStage, hooks: &dyn StageHooks) -> StageOutcome {
        let mut flags = self.lock();
        let outcome = match stage {
            BootStage::Init => StageOutcome::Skipped("init is not a triggerable stage".to_owned()),
            BootStage::PostFsData => {
                if flags.post_fs_data {
                    StageOutcome::AlreadyDone
                } else {
                    let report = hooks.post_fs_data();
                    flags.post_fs_data = true;
                    flags.safe_mode = report.safe_mode;
                    report.into_outcome()
                }
            }
            BootStage::LateStart => {
                if flags.late_start {
                    StageOutcome::AlreadyDone
                } else if !flags.post_fs_data {
                    StageOutcome::Skipped("post-fs-data has not run".to_owned())
                } else if flags.boot_complete {
                    StageOutcome::Skipped("boot already completed".to_owned())
                } else if flags.safe_mode {
                    StageOutcome::Skipped("safe mode".to_owned())
                } else {
                    let report = hooks.late_start();
                    flags.late_start = true;
                    report.into_outcome()
                }
            }
            BootStage::BootComplete => {
                if flags.boot_complete {
                    StageOutcome::AlreadyDone
                } else if !flags.post_fs_data {
                    StageOutcome::Skipped("post-fs-data has not run".to_owned())
                } else {
                    let report = hooks.boot_complete();
                    flags.boot_complete = true;
                    report.into_outcome()
                }
            }
        };
        drop(flags);

        if outcome == StageOutcome::AlreadyDone {
            debug!(target: BOOT_TARGET, stage = %stage, "stage already ran");
        } else {
            info!(
                target: BOOT_TARGET,
                stage = %stage,
                outcome = outcome.code(),
                detail = outcome.detail(),
                "stage triggered"
            );
            self.reporter.stage_finished(stage, &outcome);
        }
        outcome
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BootFlags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for BootController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootController")
            .field("flags", &*self.lock())
            .finish_non_exhaustive()
    }
}
