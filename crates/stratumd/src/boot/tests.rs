//! Stage ordering and the daemon's stage hooks.

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use stratum_config::{ModuleOrder, PropertyLookup};
use tempfile::TempDir;

use super::test_support::{Launch, RecordingScripts};
use super::{
    BootController, BootCounter, BootScripts, BootServices, BootStage, ScriptRunner, StageHooks,
    StageOutcome, StageReport,
};
use crate::health::HealthReporter;
use crate::modules::test_support::ModuleLayout;
use crate::modules::{DISABLE_MARKER, ModuleRegistry};
use crate::mount::{MemoryBase, MountJournal, MountOrchestrator, MountSettings, RecordingMounts};
use crate::props::{PropertyStore, SystemProperties};
use crate::selinux::test_support::MemorySelinux;
use crate::state::test_support::{MemoryProperties, ScriptedHooks};
use crate::tests::support::{HealthEvent, RecordingHealthReporter};

fn controller() -> (BootController, Arc<RecordingHealthReporter>) {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let controller = BootController::new(Arc::clone(&reporter) as Arc<dyn HealthReporter>);
    (controller, reporter)
}

#[rstest]
fn late_start_waits_for_post_fs_data() {
    let (controller, _) = controller();
    let hooks = ScriptedHooks::default();

    let early = controller.trigger(BootStage::LateStart, &hooks);
    assert!(matches!(early, StageOutcome::Skipped(_)));
    assert_eq!(controller.stage(), BootStage::Init);

    assert_eq!(
        controller.trigger(BootStage::PostFsData, &hooks),
        StageOutcome::Completed
    );
    assert_eq!(
        controller.trigger(BootStage::LateStart, &hooks),
        StageOutcome::Completed
    );
    assert_eq!(controller.stage(), BootStage::LateStart);
    assert_eq!(hooks.calls(), ["post-fs-data", "late-start"]);
}

#[rstest]
fn safe_mode_skips_late_start_but_not_boot_complete() {
    let (controller, _) = controller();
    let hooks = ScriptedHooks::reporting(StageReport::safe_mode("forced"));

    let outcome = controller.trigger(BootStage::PostFsData, &hooks);
    assert_eq!(outcome, StageOutcome::Degraded("forced".to_owned()));
    assert!(controller.safe_mode());
    assert_eq!(
        controller.trigger(BootStage::LateStart, &hooks),
        StageOutcome::Skipped("safe mode".to_owned())
    );
    assert_eq!(
        controller.trigger(BootStage::BootComplete, &hooks),
        StageOutcome::Completed
    );
    assert_eq!(controller.stage(), BootStage::BootComplete);
    assert_eq!(hooks.calls(), ["post-fs-data", "boot-complete"]);
}

#[rstest]
fn init_cannot_be_triggered() {
    let (controller, reporter) = controller();
    let hooks = ScriptedHooks::default();
    assert!(matches!(
        controller.trigger(BootStage::Init, &hooks),
        StageOutcome::Skipped(_)
    ));
    assert!(hooks.calls().is_empty());
    assert_eq!(
        reporter.events(),
        [HealthEvent::StageFinished(BootStage::Init, 3)]
    );
}

#[rstest]
fn repeated_triggers_are_not_reported() {
    let (controller, reporter) = controller();
    let hooks = ScriptedHooks::default();
    controller.trigger(BootStage::PostFsData, &hooks);
    controller.trigger(BootStage::PostFsData, &hooks);
    assert_eq!(
        reporter.events(),
        [HealthEvent::StageFinished(BootStage::PostFsData, 0)]
    );
}

#[rstest]
fn concurrent_triggers_run_the_hook_once() {
    let (controller, _) = controller();
    let hooks = ScriptedHooks::default();
    let outcomes: Vec<StageOutcome> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| controller.trigger(BootStage::PostFsData, &hooks)))
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().expect("trigger thread"))
            .collect()
    });
    assert_eq!(hooks.calls(), ["post-fs-data"]);
    assert_eq!(
        outcomes
            .iter()
            .filter(|outcome| **outcome == StageOutcome::Completed)
            .count(),
        1
    );
}

struct ServicesHarness {
    layout: ModuleLayout,
    state_dir: TempDir,
    registry: Arc<ModuleRegistry>,
    props: Arc<PropertyStore>,
    mounts: Arc<RecordingMounts>,
    scripts: Arc<RecordingScripts>,
}

impl ServicesHarness {
    fn new(system: MemoryProperties) -> Self {
        let state_dir = TempDir::new().expect("state dir");
        let props = PropertyStore::open(
            state_dir.path().join("props"),
            PropertyLookup::VolatileFirst,
            Arc::new(system) as Arc<dyn SystemProperties>,
        )
        .expect("property store");
        Self {
            layout: ModuleLayout::new(),
            state_dir,
            registry: Arc::new(ModuleRegistry::default()),
            props: Arc::new(props),
            mounts: Arc::new(RecordingMounts::new()),
            scripts: Arc::new(RecordingScripts::default()),
        }
    }

    fn with_scripts(mut self, scripts: RecordingScripts) -> Self {
        self.scripts = Arc::new(scripts);
        self
    }

    fn script_dir(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.state_dir.path().join("scripts")).expect("utf8 script dir")
    }

    fn common_script(&self, stage: &str, name: &str) {
        let path = self.script_dir().join(format!("{stage}.d")).join(name);
        std::fs::create_dir_all(path.parent().expect("stage dir")).expect("create stage dir");
        std::fs::write(&path, "true\n").expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    }

    fn counter(&self) -> BootCounter {
        BootCounter::new(self.state_dir.path().join("boot_count"))
    }

    fn services(&self, threshold: u32) -> BootServices {
        let orchestrator = MountOrchestrator::new(
            MountSettings {
                root_dir: Utf8PathBuf::from("/"),
                worker_dir: Utf8PathBuf::from("/dev/stratum-worker"),
                mount_tag: "stratum".to_owned(),
                propagate_global: false,
            },
            MountJournal::new(self.state_dir.path().join("stratumd.mounts")),
            Arc::new(MemoryBase::new().file("/system/bin/sh")),
            Arc::clone(&self.mounts) as Arc<dyn crate::mount::MountCapability>,
            Arc::new(MemorySelinux::default()),
        );
        BootServices::new(
            self.layout.store(ModuleOrder::Name),
            Arc::clone(&self.registry),
            Arc::clone(&self.props),
            orchestrator,
            BootScripts::new(
                self.script_dir(),
                Duration::from_secs(1),
                Arc::clone(&self.scripts) as Arc<dyn ScriptRunner>,
            ),
            self.counter(),
            threshold,
        )
    }

    fn active(&self) -> Vec<String> {
        self.registry
            .snapshot()
            .into_iter()
            .map(|module| module.name)
            .collect()
    }
}

#[fixture]
fn services_harness() -> ServicesHarness {
    ServicesHarness::new(MemoryProperties::default())
}

#[rstest]
fn post_fs_data_activates_enabled_modules(services_harness: ServicesHarness) {
    let harness = services_harness;
    harness
        .layout
        .install("alpha")
        .file("system/bin/sh", "#!alpha")
        .file("system.prop", "ro.alpha=yes\n");
    harness
        .layout
        .install("beta")
        .file("system/bin/b", "b")
        .marker(DISABLE_MARKER);

    let services = harness.services(3);
    let report = services.post_fs_data();

    assert_eq!(report, StageReport::clean());
    assert_eq!(harness.active(), ["alpha"]);
    assert_eq!(harness.props.get("ro.alpha").as_deref(), Some("yes"));
    assert!(harness.mounts.source_of("/system/bin/sh").is_some());
    assert_eq!(harness.counter().read().expect("count"), 1);
}

#[rstest]
fn repeated_unfinished_boots_enter_safe_mode(services_harness: ServicesHarness) {
    let harness = services_harness;
    let alpha = harness.layout.install("alpha").file("system/bin/sh", "a");
    let alpha_root = alpha.root().to_owned();
    std::fs::write(harness.state_dir.path().join("boot_count"), "2").expect("seed count");

    let services = harness.services(2);
    let report = services.post_fs_data();

    assert!(report.safe_mode);
    assert!(harness.active().is_empty());
    assert!(alpha_root.join(DISABLE_MARKER).exists());
    assert!(harness.mounts.table().is_empty());
}

#[rstest]
fn safe_mode_property_is_honoured() {
    let harness =
        ServicesHarness::new(MemoryProperties::default().with("persist.sys.safemode", "1"));
    harness.layout.install("alpha").file("system/bin/sh", "a");
    let report = harness.services(0).post_fs_data();
    assert!(report.safe_mode);
    assert_eq!(
        report.degraded.as_deref(),
        Some("safe mode: persist.sys.safemode is set")
    );
}

#[rstest]
fn boot_complete_resets_the_counter(services_harness: ServicesHarness) {
    let harness = services_harness;
    let services = harness.services(3);
    services.post_fs_data();
    assert_eq!(harness.counter().read().expect("count"), 1);
    assert_eq!(
        services.boot_complete(),
        StageReport::clean()
    );
    assert_eq!(harness.counter().read().expect("count"), 0);
}

fn launch(file: &str, module: Option<&str>, waited: bool) -> Launch {
    Launch {
        file: file.to_owned(),
        module: module.map(str::to_owned),
        waited,
    }
}

#[rstest]
fn post_fs_data_waits_on_common_then_enabled_module_scripts(services_harness: ServicesHarness) {
    let harness = services_harness;
    harness.common_script("post-fs-data", "10-common.sh");
    harness
        .layout
        .install("alpha")
        .file("post-fs-data.sh", "true\n")
        .file("service.sh", "true\n");
    harness
        .layout
        .install("beta")
        .file("post-fs-data.sh", "true\n")
        .marker(DISABLE_MARKER);

    harness.services(3).post_fs_data();

    assert_eq!(
        harness.scripts.launches(),
        [
            launch("10-common.sh", None, true),
            launch("post-fs-data.sh", Some("alpha"), true),
        ]
    );
}

#[rstest]
fn modules_disabled_by_their_script_are_not_activated(services_harness: ServicesHarness) {
    let harness = services_harness.with_scripts(RecordingScripts::default().disabling("alpha"));
    harness
        .layout
        .install("alpha")
        .file("post-fs-data.sh", "true\n")
        .file("system/bin/sh", "a");
    harness.layout.install("beta").file("system/bin/b", "b");

    let report = harness.services(3).post_fs_data();

    assert_eq!(report, StageReport::clean());
    assert_eq!(harness.active(), ["beta"]);
    let alpha_root = harness.layout.root.join("alpha");
    assert!(
        harness
            .mounts
            .table()
            .iter()
            .all(|mount| !mount.source.starts_with(alpha_root.as_str()))
    );
}

#[rstest]
fn late_start_starts_service_scripts_of_active_modules(services_harness: ServicesHarness) {
    let harness = services_harness;
    harness.common_script("service", "start.sh");
    harness
        .layout
        .install("alpha")
        .file("service.sh", "true\n")
        .file("system/bin/sh", "a");
    let services = harness.services(3);
    services.post_fs_data();

    assert_eq!(services.late_start(), StageReport::clean());
    assert_eq!(
        harness.scripts.launches(),
        [
            launch("start.sh", None, false),
            launch("service.sh", Some("alpha"), false),
        ]
    );
}

#[rstest]
fn safe_mode_runs_no_scripts(services_harness: ServicesHarness) {
    let harness = services_harness;
    harness.common_script("post-fs-data", "10-common.sh");
    harness
        .layout
        .install("alpha")
        .file("post-fs-data.sh", "true\n");
    std::fs::write(harness.state_dir.path().join("boot_count"), "2").expect("seed count");

    let report = harness.services(2).post_fs_data();

    assert!(report.safe_mode);
    assert!(harness.scripts.launches().is_empty());
}
