//! The daemon's stage hooks: safe-mode detection, boot scripts, module
//! activation and mounting.

use std::sync::Arc;

use tracing::{info, warn};

use super::{BOOT_TARGET, BootCounter, BootScripts, ScriptStage, StageHooks, StageReport};
use crate::modules::{ModuleRegistry, ModuleStore};
use crate::mount::MountOrchestrator;
use crate::props::PropertyStore;

/// Properties that force safe mode when set to `1`.
const SAFE_MODE_PROPERTIES: [&str; 2] = ["persist.sys.safemode", "ro.sys.safemode"];

/// Everything the boot stages act on.
#[derive(Debug)]
pub struct BootServices {
    modules: ModuleStore,
    registry: Arc<ModuleRegistry>,
    props: Arc<PropertyStore>,
    mounts: MountOrchestrator,
    scripts: BootScripts,
    counter: BootCounter,
    safe_mode_threshold: u32,
}

impl BootServices {
    /// Wires the stage hooks to their collaborators.
    #[must_use]
    pub fn new(
        modules: ModuleStore,
        registry: Arc<ModuleRegistry>,
        props: Arc<PropertyStore>,
        mounts: MountOrchestrator,
        scripts: BootScripts,
        counter: BootCounter,
        safe_mode_threshold: u32,
    ) -> Self {
        Self {
            modules,
            registry,
            props,
            mounts,
            scripts,
            counter,
            safe_mode_threshold,
        }
    }

    /// Why this boot must run in safe mode, if it must.
    fn safe_mode_reason(&self, unfinished_boots: u32) -> Option<String> {
        if self.safe_mode_threshold > 0 && unfinished_boots >= self.safe_mode_threshold {
            return Some(format!(
                "{unfinished_boots} consecutive boots did not complete"
            ));
        }
        SAFE_MODE_PROPERTIES
            .iter()
            .find(|name| self.props.get(name).as_deref() == Some("1"))
            .map(|name| format!("{name} is set"))
    }

    fn enter_safe_mode(&self, reason: String) -> StageReport {
        warn!(target: BOOT_TARGET, reason = %reason, "entering safe mode");
        if let Err(error) = self.modules.disable_all() {
            warn!(target: BOOT_TARGET, error = %error, "modules could not be disabled");
        }
        self.registry.replace(Vec::new());
        StageReport::safe_mode(format!("safe mode: {reason}"))
    }
}

impl StageHooks for BootServices {
    fn post_fs_data(&self) -> StageReport {
        let unfinished_boots = self.counter.increment().unwrap_or_else(|error| {
            warn!(target: BOOT_TARGET, error = %error, "boot counter unavailable");
            0
        });
        if let Some(reason) = self.safe_mode_reason(unfinished_boots) {
            return self.enter_safe_mode(reason);
        }

        let mut problems = Vec::new();
        if let Err(error) = self.modules.apply_upgrades() {
            problems.push(error.to_string());
        }
        let scanned = self.modules.scan().and_then(|modules| {
            self.scripts.run_stage(ScriptStage::PostFsData, &modules);
            // Scripts may disable or remove their own module.
            self.modules.scan()
        });
        let modules = match scanned {
            Ok(modules) => modules,
            Err(error) => {
                self.registry.replace(Vec::new());
                problems.push(error.to_string());
                return StageReport::degraded(problems.join("; "));
            }
        };

        for module in modules.iter().filter(|module| module.enabled) {
            if let Some(overrides) = module.system_props() {
                self.props.load_volatile(overrides);
            }
        }

        let report = self.mounts.run(&modules).unwrap_or_else(|error| {
            problems.push(error.to_string());
            crate::mount::MountReport::default()
        });
        if let Some(reason) = report.degraded() {
            problems.push(reason);
        }

        let active: Vec<_> = modules
            .into_iter()
            .filter(|module| module.enabled && !report.is_excluded(&module.name))
            .collect();
        info!(
            target: BOOT_TARGET,
            active = active.len(),
            mounted_ops = report.applied,
            "modules activated"
        );
        self.registry.replace(active);

        if problems.is_empty() {
            StageReport::clean()
        } else {
            StageReport::degraded(problems.join("; "))
        }
    }

    fn late_start(&self) -> StageReport {
        let active = self.registry.snapshot();
        info!(target: BOOT_TARGET, active = active.len(), "late start reached");
        self.scripts.run_stage(ScriptStage::Service, &active);
        StageReport::clean()
    }

    fn boot_complete(&self) -> StageReport {
        match self.counter.reset() {
            Ok(()) => StageReport::clean(),
            Err(error) => StageReport::degraded(format!("boot counter not reset: {error}")),
        }
    }
}
