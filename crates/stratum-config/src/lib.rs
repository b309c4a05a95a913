//! Shared configuration for the stratum root broker.
//!
//! [`Config`] is layered by `ortho_config`: built-in defaults, then a
//! configuration file (`--config-path` or `STRATUM_CONFIG_PATH`), then
//! `STRATUM_*` environment variables, then CLI flags. Invalid values fail the
//! load instead of falling back silently.

mod defaults;
mod logging;
mod path_list;
mod policy;
mod runtime;
mod socket;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_BOOT_COUNT_FILE, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_LOG_FILTER, DEFAULT_MODULE_ROOT,
    DEFAULT_MODULE_UPDATE_ROOT, DEFAULT_MOUNT_TAG, DEFAULT_PROPERTY_FILE,
    DEFAULT_SAFE_MODE_THRESHOLD, DEFAULT_SCRIPT_DIR, DEFAULT_SCRIPT_TIMEOUT_SECS,
    DEFAULT_SOCKET_PATH, DEFAULT_WORKER_DIR, default_log_filter,
    default_log_format, default_module_order, default_property_lookup, default_socket_endpoint,
    default_system_prop_files,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use path_list::PathList;
pub use policy::{ModuleOrder, PropertyLookup};
pub use runtime::{RuntimePaths, RuntimePathsError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "STRATUM")]
pub struct Config {
    /// Socket the daemon accepts requests on.
    #[ortho_config(default = default_socket_endpoint())]
    pub daemon_socket: SocketEndpoint,
    /// `tracing` filter directive.
    #[ortho_config(default = DEFAULT_LOG_FILTER.to_owned())]
    pub log_filter: String,
    /// Log record format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Seconds a connection may stall on a read or write before it is dropped.
    #[ortho_config(default = DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout_secs: u64,
    /// Directory of installed modules.
    #[ortho_config(default = Utf8PathBuf::from(DEFAULT_MODULE_ROOT))]
    pub module_root: Utf8PathBuf,
    /// Directory of staged module upgrades.
    #[ortho_config(default = Utf8PathBuf::from(DEFAULT_MODULE_UPDATE_ROOT))]
    pub module_update_root: Utf8PathBuf,
    /// Ranking applied to modules before merging.
    #[ortho_config(default = default_module_order())]
    pub module_order: ModuleOrder,
    /// Prefix under which the base partitions are found.
    #[ortho_config(default = Utf8PathBuf::from("/"))]
    pub root_dir: Utf8PathBuf,
    /// Mount point of the tmpfs hosting rebuilt directories.
    #[ortho_config(default = Utf8PathBuf::from(DEFAULT_WORKER_DIR))]
    pub worker_dir: Utf8PathBuf,
    /// Source name of the worker tmpfs.
    #[ortho_config(default = DEFAULT_MOUNT_TAG.to_owned())]
    pub mount_tag: String,
    /// Replicate applied mounts into the init mount namespace.
    #[ortho_config(default = true)]
    pub propagate_global: bool,
    /// File of persisted property overrides.
    #[ortho_config(default = Utf8PathBuf::from(DEFAULT_PROPERTY_FILE))]
    pub property_file: Utf8PathBuf,
    /// Override table consulted first by property lookups.
    #[ortho_config(default = default_property_lookup())]
    pub property_lookup: PropertyLookup,
    /// Build property files providing system defaults.
    #[ortho_config(default = default_system_prop_files())]
    pub system_prop_files: PathList,
    /// File counting boots that never reached boot-complete.
    #[ortho_config(default = Utf8PathBuf::from(DEFAULT_BOOT_COUNT_FILE))]
    pub boot_count_file: Utf8PathBuf,
    /// Unfinished boots tolerated before safe mode engages.
    #[ortho_config(default = DEFAULT_SAFE_MODE_THRESHOLD)]
    pub safe_mode_threshold: u32,
    /// Parent of the shared `post-fs-data.d` and `service.d` directories.
    #[ortho_config(default = Utf8PathBuf::from(DEFAULT_SCRIPT_DIR))]
    pub script_dir: Utf8PathBuf,
    /// Seconds post-fs-data waits for each boot script before moving on.
    #[ortho_config(default = DEFAULT_SCRIPT_TIMEOUT_SECS)]
    pub script_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_endpoint(),
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: default_log_format(),
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            module_root: Utf8PathBuf::from(DEFAULT_MODULE_ROOT),
            module_update_root: Utf8PathBuf::from(DEFAULT_MODULE_UPDATE_ROOT),
            module_order: default_module_order(),
            root_dir: Utf8PathBuf::from("/"),
            worker_dir: Utf8PathBuf::from(DEFAULT_WORKER_DIR),
            mount_tag: DEFAULT_MOUNT_TAG.to_owned(),
            propagate_global: true,
            property_file: Utf8PathBuf::from(DEFAULT_PROPERTY_FILE),
            property_lookup: default_property_lookup(),
            system_prop_files: default_system_prop_files(),
            boot_count_file: Utf8PathBuf::from(DEFAULT_BOOT_COUNT_FILE),
            safe_mode_threshold: DEFAULT_SAFE_MODE_THRESHOLD,
            script_dir: Utf8PathBuf::from(DEFAULT_SCRIPT_DIR),
            script_timeout_secs: DEFAULT_SCRIPT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Socket the daemon accepts requests on.
    #[must_use]
    pub fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// `tracing` filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log record format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Per-connection read/write timeout.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Directory of installed modules.
    #[must_use]
    pub fn module_root(&self) -> &Utf8Path {
        &self.module_root
    }

    /// Directory of staged module upgrades.
    #[must_use]
    pub fn module_update_root(&self) -> &Utf8Path {
        &self.module_update_root
    }

    /// Prefix under which the base partitions are found.
    #[must_use]
    pub fn root_dir(&self) -> &Utf8Path {
        &self.root_dir
    }

    /// Mount point of the worker tmpfs.
    #[must_use]
    pub fn worker_dir(&self) -> &Utf8Path {
        &self.worker_dir
    }

    /// Parent of the shared boot script directories.
    #[must_use]
    pub fn script_dir(&self) -> &Utf8Path {
        &self.script_dir
    }

    /// How long post-fs-data waits for each boot script.
    #[must_use]
    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }
}
