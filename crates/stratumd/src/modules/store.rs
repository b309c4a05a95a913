//! On-disk module directories: upgrades, marker handling and scanning.

use std::fs::{self, File};
use std::io;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use stratum_config::ModuleOrder;
use tracing::{debug, info, warn};

use super::descriptor::{
    DISABLE_MARKER, MODULE_PROP_FILE, REMOVE_MARKER, SKIP_MOUNT_MARKER, UPDATE_MARKER, has_entry,
};
use super::{MODULES_TARGET, Module, ModuleError, ModuleInfo, order};

/// Directory reserved for the daemon's own files inside the module root.
const RESERVED_ENTRY: &str = ".core";

/// Module root plus its staging area for upgrades.
#[derive(Debug, Clone)]
pub struct ModuleStore {
    root: Utf8PathBuf,
    update_root: Utf8PathBuf,
    order: ModuleOrder,
}

impl ModuleStore {
    /// Builds a store over the given directories.
    #[must_use]
    pub fn new(
        root: impl Into<Utf8PathBuf>,
        update_root: impl Into<Utf8PathBuf>,
        order: ModuleOrder,
    ) -> Self {
        Self {
            root: root.into(),
            update_root: update_root.into(),
            order,
        }
    }

    /// Moves staged upgrades into the module root.
    ///
    /// A staged module replaces the installed one of the same name; if the
    /// installed copy was disabled, the replacement is disabled too. The
    /// staging directory is removed afterwards. Returns the upgraded names.
    pub fn apply_upgrades(&self) -> Result<Vec<String>, ModuleError> {
        let staged = match module_dirs(&self.update_root) {
            Ok(staged) => staged,
            Err(ModuleError::ReadDir { source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                return Ok(Vec::new());
            }
            Err(error) => return Err(error),
        };
        fs::create_dir_all(&self.root).map_err(|source| ModuleError::modify(&self.root, source))?;

        let mut upgraded = Vec::with_capacity(staged.len());
        for name in staged {
            let target = self.root.join(&name);
            let keep_disabled = has_entry(&target, DISABLE_MARKER);
            remove_tree(&target)?;
            let source = self.update_root.join(&name);
            fs::rename(&source, &target).map_err(|error| ModuleError::modify(&source, error))?;
            if keep_disabled {
                touch(&target.join(DISABLE_MARKER))?;
            }
            info!(
                target: MODULES_TARGET,
                module = %name,
                keep_disabled,
                "module upgraded"
            );
            upgraded.push(name);
        }
        remove_tree(&self.update_root)?;
        Ok(upgraded)
    }

    /// Reads the installed modules and ranks them.
    ///
    /// Modules carrying the `remove` marker are deleted and left out, and
    /// stale `update` markers are cleared. A module that cannot be processed
    /// is skipped with a warning; only an unreadable root fails the scan.
    pub fn scan(&self) -> Result<Vec<Module>, ModuleError> {
        let names = match module_dirs(&self.root) {
            Ok(names) => names,
            Err(ModuleError::ReadDir { source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                return Ok(Vec::new());
            }
            Err(error) => return Err(error),
        };

        let mut modules = Vec::with_capacity(names.len());
        for name in names {
            match self.load(&name) {
                Ok(Some(module)) => modules.push(module),
                Ok(None) => {}
                Err(error) => warn!(
                    target: MODULES_TARGET,
                    module = %name,
                    error = %error,
                    "skipping unreadable module"
                ),
            }
        }
        order::rank(&mut modules, self.order);
        debug!(
            target: MODULES_TARGET,
            count = modules.len(),
            order = %self.order,
            "modules scanned"
        );
        Ok(modules)
    }

    /// Marks every installed module disabled.
    pub fn disable_all(&self) -> Result<(), ModuleError> {
        for name in module_dirs(&self.root)? {
            touch(&self.root.join(&name).join(DISABLE_MARKER))?;
        }
        info!(target: MODULES_TARGET, "all modules disabled");
        Ok(())
    }

    /// Deletes every installed module.
    pub fn remove_all(&self) -> Result<(), ModuleError> {
        remove_tree(&self.root)?;
        info!(target: MODULES_TARGET, root = %self.root, "all modules removed");
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<Module>, ModuleError> {
        let root = self.root.join(name);
        if has_entry(&root, REMOVE_MARKER) {
            remove_tree(&root)?;
            info!(target: MODULES_TARGET, module = %name, "module removed");
            return Ok(None);
        }
        remove_file(&root.join(UPDATE_MARKER))?;

        let info = fs::read_to_string(root.join(MODULE_PROP_FILE))
            .map(|contents| ModuleInfo::parse(&contents))
            .unwrap_or_default();
        let installed_at = fs::metadata(&root)
            .and_then(|metadata| metadata.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        Ok(Some(Module {
            name: name.to_owned(),
            enabled: !has_entry(&root, DISABLE_MARKER),
            skip_mount: has_entry(&root, SKIP_MOUNT_MARKER),
            root,
            priority: 0,
            info,
            installed_at,
        }))
    }
}

/// Names of the module directories under `root`, sorted.
fn module_dirs(root: &Utf8Path) -> Result<Vec<String>, ModuleError> {
    let read_error = |source| ModuleError::ReadDir {
        path: root.to_path_buf(),
        source,
    };
    let mut names = Vec::new();
    for item in fs::read_dir(root).map_err(read_error)? {
        let entry = item.map_err(read_error)?;
        if !entry.file_type().map_err(read_error)?.is_dir() {
            continue;
        }
        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| ModuleError::NonUtf8Name {
                parent: root.to_path_buf(),
            })?;
        if name != RESERVED_ENTRY {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn touch(path: &Utf8Path) -> Result<(), ModuleError> {
    File::create(path)
        .map(drop)
        .map_err(|source| ModuleError::modify(path, source))
}

fn remove_file(path: &Utf8Path) -> Result<(), ModuleError> {
    match fs::remove_file(path) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => {
            Err(ModuleError::modify(path, error))
        }
        _ => Ok(()),
    }
}

fn remove_tree(path: &Utf8Path) -> Result<(), ModuleError> {
    match fs::remove_dir_all(path) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => {
            Err(ModuleError::modify(path, error))
        }
        _ => Ok(()),
    }
}
