//! Installed module records.

use std::collections::BTreeMap;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};

use crate::props::file;

/// Marker asking the scan to delete the module.
pub(crate) const REMOVE_MARKER: &str = "remove";
/// Marker left by an installer; cleared on every scan.
pub(crate) const UPDATE_MARKER: &str = "update";
/// Marker keeping the module installed but inactive.
pub(crate) const DISABLE_MARKER: &str = "disable";
/// Marker keeping the module active without contributing files.
pub(crate) const SKIP_MOUNT_MARKER: &str = "skip_mount";
/// Property overrides loaded while the module is enabled.
pub(crate) const SYSTEM_PROP_FILE: &str = "system.prop";
/// Module metadata.
pub(crate) const MODULE_PROP_FILE: &str = "module.prop";
/// Tree merged onto the system partition.
pub(crate) const SYSTEM_TREE: &str = "system";

/// Metadata declared in `module.prop`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Human-readable name, falling back to the directory name.
    pub display_name: Option<String>,
    /// Version string.
    pub version: Option<String>,
    /// Explicit ranking weight used by the `weight` order.
    pub weight: i64,
}

impl ModuleInfo {
    pub(crate) fn parse(contents: &str) -> Self {
        let props = file::parse(contents);
        Self {
            display_name: props.get("name").cloned(),
            version: props.get("version").cloned(),
            weight: props
                .get("priority")
                .and_then(|value| value.parse().ok())
                .unwrap_or(0),
        }
    }
}

/// One installed module as seen by the most recent scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Directory name; unique among installed modules.
    pub name: String,
    /// Module directory.
    pub root: Utf8PathBuf,
    /// False when the `disable` marker is present.
    pub enabled: bool,
    /// True when the `skip_mount` marker is present.
    pub skip_mount: bool,
    /// Rank among scanned modules; higher wins when trees overlap.
    pub priority: u32,
    /// Parsed `module.prop`.
    pub info: ModuleInfo,
    pub(crate) installed_at: SystemTime,
}

impl Module {
    /// Root of the tree merged onto `/system`.
    #[must_use]
    pub fn system_tree(&self) -> Utf8PathBuf {
        self.root.join(SYSTEM_TREE)
    }

    /// Path of a marker or metadata file inside the module.
    #[must_use]
    pub fn entry(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    /// Whether the module contributes files to the merge.
    #[must_use]
    pub fn mounts_files(&self) -> bool {
        self.enabled && !self.skip_mount
    }

    /// Reads the module's `system.prop`, if any.
    pub(crate) fn system_props(&self) -> Option<BTreeMap<String, String>> {
        std::fs::read_to_string(self.entry(SYSTEM_PROP_FILE))
            .ok()
            .map(|contents| file::parse(&contents))
    }
}

pub(crate) fn has_entry(dir: &Utf8Path, name: &str) -> bool {
    dir.join(name).symlink_metadata().is_ok()
}
