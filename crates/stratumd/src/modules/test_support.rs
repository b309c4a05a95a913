//! On-disk module layouts for tests.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use stratum_config::ModuleOrder;
use tempfile::TempDir;

use super::ModuleStore;

/// Temporary module root and update root.
pub(crate) struct ModuleLayout {
    _dir: TempDir,
    pub(crate) root: Utf8PathBuf,
    pub(crate) update_root: Utf8PathBuf,
}

impl ModuleLayout {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir");
        let root = base.join("modules");
        fs::create_dir_all(&root).expect("module root");
        Self {
            _dir: dir,
            update_root: base.join("modules_update"),
            root,
        }
    }

    pub(crate) fn store(&self, order: ModuleOrder) -> ModuleStore {
        ModuleStore::new(&self.root, &self.update_root, order)
    }

    /// Starts an installed module.
    pub(crate) fn install(&self, name: &str) -> ModuleBuilder {
        ModuleBuilder::at(self.root.join(name))
    }

    /// Starts a staged upgrade.
    pub(crate) fn stage(&self, name: &str) -> ModuleBuilder {
        ModuleBuilder::at(self.update_root.join(name))
    }
}

/// Writes the pieces of one module directory.
pub(crate) struct ModuleBuilder {
    root: Utf8PathBuf,
}

impl ModuleBuilder {
    fn at(root: Utf8PathBuf) -> Self {
        fs::create_dir_all(&root).expect("module dir");
        Self { root }
    }

    pub(crate) fn file(self, relative: &str, contents: &str) -> Self {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent dir");
        }
        fs::write(&path, contents).expect("module file");
        self
    }

    pub(crate) fn dir(self, relative: &str) -> Self {
        fs::create_dir_all(self.root.join(relative)).expect("module subdir");
        self
    }

    pub(crate) fn symlink(self, relative: &str, target: &str) -> Self {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent dir");
        }
        std::os::unix::fs::symlink(target, &path).expect("module symlink");
        self
    }

    pub(crate) fn marker(self, name: &str) -> Self {
        self.file(name, "")
    }

    pub(crate) fn root(&self) -> &Utf8Path {
        &self.root
    }
}
