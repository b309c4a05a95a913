use camino::Utf8PathBuf;

use crate::logging::LogFormat;
use crate::path_list::PathList;
use crate::policy::{ModuleOrder, PropertyLookup};
use crate::socket::SocketEndpoint;

/// Socket path used when none is configured.
pub const DEFAULT_SOCKET_PATH: &str = "/dev/socket/stratumd";

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Seconds a connection may stall mid-frame before it is dropped.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 10;

/// Directory holding installed modules.
pub const DEFAULT_MODULE_ROOT: &str = "/data/adb/modules";

/// Directory holding staged module upgrades.
pub const DEFAULT_MODULE_UPDATE_ROOT: &str = "/data/adb/modules_update";

/// Mount point of the tmpfs that hosts rebuilt directories.
pub const DEFAULT_WORKER_DIR: &str = "/dev/stratum/worker";

/// Source name given to the worker tmpfs.
pub const DEFAULT_MOUNT_TAG: &str = "stratum";

/// File holding persisted property overrides.
pub const DEFAULT_PROPERTY_FILE: &str = "/data/adb/stratum/props";

/// File holding the consecutive unfinished boot counter.
pub const DEFAULT_BOOT_COUNT_FILE: &str = "/data/adb/stratum/boot_count";

/// Unfinished boots tolerated before safe mode engages.
pub const DEFAULT_SAFE_MODE_THRESHOLD: u32 = 2;

/// Directory holding the shared `<stage>.d` boot script directories.
pub const DEFAULT_SCRIPT_DIR: &str = "/data/adb";

/// Seconds post-fs-data waits for each blocking boot script.
pub const DEFAULT_SCRIPT_TIMEOUT_SECS: u64 = 40;

/// Default log filter expression.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default log format.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default daemon socket.
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    SocketEndpoint::unix(DEFAULT_SOCKET_PATH)
}

/// Default module ranking policy.
#[must_use]
pub fn default_module_order() -> ModuleOrder {
    ModuleOrder::InstallTime
}

/// Default override lookup policy.
#[must_use]
pub fn default_property_lookup() -> PropertyLookup {
    PropertyLookup::VolatileFirst
}

/// Build property files consulted for system defaults.
#[must_use]
pub fn default_system_prop_files() -> PathList {
    PathList::new(vec![
        Utf8PathBuf::from("/system/build.prop"),
        Utf8PathBuf::from("/vendor/build.prop"),
    ])
}
