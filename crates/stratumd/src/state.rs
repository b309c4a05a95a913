//! Long-lived daemon state shared by every connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use stratum_config::{Config, RuntimePaths};

use crate::boot::{
    BootController, BootCounter, BootScripts, BootServices, ShellScripts, StageHooks,
};
use crate::dispatch::{Rebooter, SystemRebooter};
use crate::health::HealthReporter;
use crate::modules::{ModuleRegistry, ModuleStore};
use crate::mount::{HostBase, HostMounts, MountJournal, MountOrchestrator, MountSettings};
use crate::props::{BuildPropFiles, PersistenceError, PropertyStore};
use crate::selinux::XattrContexts;

/// Owned state handed to request handlers by shared reference.
///
/// Each resource carries its own lock: boot flags inside the controller,
/// the override tables inside the property store and the active list inside
/// the registry.
pub struct DaemonState {
    pub(crate) boot: BootController,
    pub(crate) hooks: Arc<dyn StageHooks>,
    pub(crate) props: Arc<PropertyStore>,
    pub(crate) registry: Arc<ModuleRegistry>,
    pub(crate) modules: ModuleStore,
    pub(crate) rebooter: Arc<dyn Rebooter>,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    stop: Arc<AtomicBool>,
}

impl DaemonState {
    /// Wires the production collaborators described by `config`.
    ///
    /// `stop` is raised when a client asks the daemon to exit.
    pub fn from_config(
        config: &Config,
        paths: &RuntimePaths,
        reporter: Arc<dyn HealthReporter>,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, PersistenceError> {
        let system = Arc::new(BuildPropFiles::load(config.system_prop_files.iter()));
        let props = Arc::new(PropertyStore::open(
            config.property_file.as_std_path(),
            config.property_lookup,
            system,
        )?);
        let registry = Arc::new(ModuleRegistry::default());
        let modules = ModuleStore::new(
            config.module_root(),
            config.module_update_root(),
            config.module_order,
        );
        let mounts = MountOrchestrator::new(
            MountSettings::from_config(config),
            MountJournal::new(paths.mount_journal_path()),
            Arc::new(HostBase),
            Arc::new(HostMounts),
            Arc::new(XattrContexts),
        );
        let services = BootServices::new(
            modules.clone(),
            Arc::clone(&registry),
            Arc::clone(&props),
            mounts,
            BootScripts::new(
                config.script_dir(),
                config.script_timeout(),
                Arc::new(ShellScripts::default()),
            ),
            BootCounter::new(config.boot_count_file.as_std_path()),
            config.safe_mode_threshold,
        );
        Ok(Self {
            boot: BootController::new(Arc::clone(&reporter)),
            hooks: Arc::new(services),
            props,
            registry,
            modules,
            rebooter: Arc::new(SystemRebooter),
            reporter,
            stop,
        })
    }

    /// Whether a client or signal asked the daemon to exit.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Boot-stage controller.
    #[must_use]
    pub const fn boot(&self) -> &BootController {
        &self.boot
    }
}

impl std::fmt::Debug for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonState")
            .field("boot", &self.boot)
            .field("registry", &self.registry)
            .field("modules", &self.modules)
            .field("stop_requested", &self.stop_requested())
            .finish_non_exhaustive()
    }
}
