//! Configuration loaders that keep every daemon path inside a temp dir.

use std::ffi::OsString;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use stratum_config::{Config, PathList, SocketEndpoint};
use tempfile::TempDir;

use crate::bootstrap::ConfigLoader;

/// Loader whose socket, module roots and state files live under one
/// temporary directory shared by its clones.
#[derive(Debug, Clone)]
pub(crate) struct TestConfigLoader {
    dir: Arc<TempDir>,
}

impl TestConfigLoader {
    pub(crate) fn new() -> Self {
        Self {
            dir: Arc::new(TempDir::new().expect("daemon temp dir")),
        }
    }

    /// Directory holding the socket and the runtime artefacts.
    pub(crate) fn runtime_dir(&self) -> Utf8PathBuf {
        self.path("run")
    }

    pub(crate) fn module_root(&self) -> Utf8PathBuf {
        self.path("modules")
    }

    pub(crate) fn socket_path(&self) -> Utf8PathBuf {
        self.runtime_dir().join("stratumd.sock")
    }

    fn path(&self, relative: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().join(relative)).expect("utf8 temp path")
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            daemon_socket: SocketEndpoint::unix(self.socket_path()),
            module_root: self.module_root(),
            module_update_root: self.path("modules_update"),
            worker_dir: self.path("worker"),
            property_file: self.path("state/props"),
            boot_count_file: self.path("state/boot_count"),
            script_dir: self.path("scripts"),
            system_prop_files: PathList::new(Vec::new()),
            propagate_global: false,
            ..Config::default()
        })
    }
}

/// Loader that always fails by passing an unparsable socket.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter([
            OsString::from("stratumd"),
            OsString::from("--daemon-socket"),
            OsString::from("tcp://127.0.0.1:1"),
        ])
    }
}
