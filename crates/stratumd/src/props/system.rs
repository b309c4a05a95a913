//! Boundary to the platform property service.

use std::collections::BTreeMap;
use std::fs;
use std::io;

use camino::Utf8Path;
use tracing::{debug, info, warn};

use super::PROPS_TARGET;
use super::file;

/// Source of system property defaults and sink for change notifications.
pub trait SystemProperties: Send + Sync {
    /// System value of `name`, if it has one.
    fn get(&self, name: &str) -> Option<String>;

    /// Told after an override for `name` takes a new value.
    fn changed(&self, name: &str, value: &str);

    /// Told after the override for `name` is removed.
    fn removed(&self, name: &str);
}

/// Defaults loaded once from build property files.
///
/// Files listed earlier win over later ones for the same key. Unreadable
/// files are skipped with a warning.
#[derive(Debug, Default)]
pub struct BuildPropFiles {
    values: BTreeMap<String, String>,
}

impl BuildPropFiles {
    /// Loads every file in `paths`.
    #[must_use]
    pub fn load<'a>(paths: impl IntoIterator<Item = &'a Utf8Path>) -> Self {
        let mut values = BTreeMap::new();
        for path in paths {
            match fs::read_to_string(path) {
                Ok(contents) => {
                    for (name, value) in file::parse(&contents) {
                        values.entry(name).or_insert(value);
                    }
                }
                Err(error) if error.kind() == io::ErrorKind::NotFound => {
                    debug!(target: PROPS_TARGET, file = %path, "build property file absent");
                }
                Err(error) => {
                    warn!(
                        target: PROPS_TARGET,
                        file = %path,
                        error = %error,
                        "failed to read build property file"
                    );
                }
            }
        }
        Self { values }
    }
}

impl SystemProperties for BuildPropFiles {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }

    fn changed(&self, name: &str, value: &str) {
        info!(
            target: PROPS_TARGET,
            event = "property_changed",
            name,
            value,
            "property override changed"
        );
    }

    fn removed(&self, name: &str) {
        info!(
            target: PROPS_TARGET,
            event = "property_removed",
            name,
            "property override removed"
        );
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn earlier_files_take_precedence() {
        let dir = tempfile::tempdir().expect("temp dir");
        let system = dir.path().join("system.prop");
        let vendor = dir.path().join("vendor.prop");
        fs::write(&system, "ro.product.model=Pixel\n").expect("write system");
        fs::write(&vendor, "ro.product.model=Generic\nro.vendor.x=1\n").expect("write vendor");

        let paths = [
            Utf8PathBuf::from_path_buf(system).expect("utf8 path"),
            Utf8PathBuf::from_path_buf(vendor).expect("utf8 path"),
            Utf8PathBuf::from("/definitely/missing/build.prop"),
        ];
        let props = BuildPropFiles::load(paths.iter().map(Utf8PathBuf::as_path));
        assert_eq!(props.get("ro.product.model").as_deref(), Some("Pixel"));
        assert_eq!(props.get("ro.vendor.x").as_deref(), Some("1"));
        assert_eq!(props.get("ro.absent"), None);
    }
}
