//! Module scanning, upgrades and bulk operations.

use rstest::{fixture, rstest};
use stratum_config::ModuleOrder;

use super::test_support::ModuleLayout;
use super::{DISABLE_MARKER, SKIP_MOUNT_MARKER};

#[fixture]
fn layout() -> ModuleLayout {
    ModuleLayout::new()
}

#[rstest]
fn scan_reads_markers_and_metadata(layout: ModuleLayout) {
    layout
        .install("active")
        .file("module.prop", "name=Active\nversion=1.0\n")
        .file("system/bin/tool", "#!/bin/sh\n");
    layout.install("sleeping").marker(DISABLE_MARKER);
    layout.install("props-only").marker(SKIP_MOUNT_MARKER);

    let modules = layout.store(ModuleOrder::Name).scan().expect("scan");
    let summary: Vec<(&str, bool, bool, u32)> = modules
        .iter()
        .map(|module| {
            (
                module.name.as_str(),
                module.enabled,
                module.mounts_files(),
                module.priority,
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("active", true, true, 0),
            ("props-only", true, false, 1),
            ("sleeping", false, false, 2),
        ]
    );
    assert_eq!(
        modules
            .first()
            .and_then(|module| module.info.display_name.as_deref()),
        Some("Active")
    );
}

#[rstest]
fn remove_marker_deletes_the_module(layout: ModuleLayout) {
    let doomed = layout.install("doomed").marker("remove");
    let doomed_root = doomed.root().to_path_buf();
    layout.install("kept");

    let modules = layout.store(ModuleOrder::Name).scan().expect("scan");
    let names: Vec<&str> = modules.iter().map(|module| module.name.as_str()).collect();
    assert_eq!(names, vec!["kept"]);
    assert!(!doomed_root.exists());
}

#[rstest]
fn scan_clears_update_markers_and_skips_reserved_entries(layout: ModuleLayout) {
    let fresh = layout.install("fresh").marker("update");
    let marker = fresh.root().join("update");
    layout.install(".core");
    std::fs::write(layout.root.join("stray-file"), "").expect("stray file");

    let modules = layout.store(ModuleOrder::Name).scan().expect("scan");
    assert_eq!(modules.len(), 1);
    assert!(!marker.exists());
}

#[rstest]
fn missing_root_scans_as_empty(layout: ModuleLayout) {
    std::fs::remove_dir_all(&layout.root).expect("remove root");
    assert!(layout.store(ModuleOrder::Name).scan().expect("scan").is_empty());
}

#[rstest]
fn upgrades_replace_modules_and_keep_disable(layout: ModuleLayout) {
    layout
        .install("demo")
        .marker(DISABLE_MARKER)
        .file("system/bin/old", "old");
    layout.stage("demo").file("system/bin/new", "new");
    layout.stage("brand-new").file("module.prop", "name=Brand New\n");

    let upgraded = layout
        .store(ModuleOrder::Name)
        .apply_upgrades()
        .expect("upgrade");
    assert_eq!(upgraded, vec!["brand-new".to_owned(), "demo".to_owned()]);
    assert!(!layout.update_root.exists());

    let demo = layout.root.join("demo");
    assert!(demo.join("system/bin/new").exists());
    assert!(!demo.join("system/bin/old").exists());
    assert!(demo.join(DISABLE_MARKER).exists());
    assert!(!layout.root.join("brand-new").join(DISABLE_MARKER).exists());
}

#[rstest]
fn upgrades_without_staging_are_a_no_op(layout: ModuleLayout) {
    let upgraded = layout
        .store(ModuleOrder::Name)
        .apply_upgrades()
        .expect("upgrade");
    assert!(upgraded.is_empty());
}

#[rstest]
fn disable_all_marks_every_module(layout: ModuleLayout) {
    layout.install("one");
    layout.install("two");
    let store = layout.store(ModuleOrder::Name);
    store.disable_all().expect("disable all");
    assert!(
        store
            .scan()
            .expect("scan")
            .iter()
            .all(|module| !module.enabled)
    );
}

#[rstest]
fn remove_all_deletes_the_root(layout: ModuleLayout) {
    layout.install("one");
    layout.store(ModuleOrder::Name).remove_all().expect("remove all");
    assert!(!layout.root.exists());
}

#[rstest]
fn weight_order_reads_module_prop(layout: ModuleLayout) {
    layout.install("heavy").file("module.prop", "priority=10\n");
    layout.install("light").file("module.prop", "priority=-1\n");
    layout.install("plain");

    let modules = layout.store(ModuleOrder::Weight).scan().expect("scan");
    let names: Vec<&str> = modules.iter().map(|module| module.name.as_str()).collect();
    assert_eq!(names, vec!["light", "plain", "heavy"]);
}
