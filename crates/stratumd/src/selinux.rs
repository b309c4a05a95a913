//! Security-context accessor used when rebuilding directories in the mirror.

use std::io;

use camino::Utf8Path;

const SELINUX_XATTR: &str = "security.selinux";

/// Reads and writes the security label of filesystem paths.
pub trait SecurityContexts: Send + Sync {
    /// Returns the label of `path`, or `None` when it carries none.
    fn get_context(&self, path: &Utf8Path) -> io::Result<Option<String>>;

    /// Labels `path` with `context`.
    fn set_context(&self, path: &Utf8Path, context: &str) -> io::Result<()>;
}

/// Copies the label of `from` onto `to`. Missing labels are not an error.
pub(crate) fn copy_context(
    contexts: &dyn SecurityContexts,
    from: &Utf8Path,
    to: &Utf8Path,
) -> io::Result<()> {
    match contexts.get_context(from)? {
        Some(context) => contexts.set_context(to, &context),
        None => Ok(()),
    }
}

/// Labels stored in the `security.selinux` extended attribute, read without
/// following symlinks.
#[derive(Debug, Default, Clone, Copy)]
pub struct XattrContexts;

impl SecurityContexts for XattrContexts {
    fn get_context(&self, path: &Utf8Path) -> io::Result<Option<String>> {
        let raw = match xattr::get(path, SELINUX_XATTR) {
            Ok(raw) => raw,
            Err(error) if error.raw_os_error() == Some(libc::ENOTSUP) => return Ok(None),
            Err(error) => return Err(error),
        };
        let Some(mut label) = raw else {
            return Ok(None);
        };
        while label.last() == Some(&0) {
            label.pop();
        }
        String::from_utf8(label)
            .map(Some)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))
    }

    fn set_context(&self, path: &Utf8Path, context: &str) -> io::Result<()> {
        let mut value = Vec::with_capacity(context.len() + 1);
        value.extend_from_slice(context.as_bytes());
        value.push(0);
        xattr::set(path, SELINUX_XATTR, &value)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;
    use std::io;
    use std::sync::Mutex;

    use camino::{Utf8Path, Utf8PathBuf};

    use super::SecurityContexts;

    /// Label table kept in memory.
    #[derive(Debug, Default)]
    pub(crate) struct MemorySelinux {
        labels: Mutex<BTreeMap<Utf8PathBuf, String>>,
    }

    impl MemorySelinux {
        pub(crate) fn with_label(self, path: &str, context: &str) -> Self {
            self.labels
                .lock()
                .expect("labels lock")
                .insert(Utf8PathBuf::from(path), context.to_owned());
            self
        }

        pub(crate) fn label(&self, path: &str) -> Option<String> {
            self.labels
                .lock()
                .expect("labels lock")
                .get(Utf8Path::new(path))
                .cloned()
        }
    }

    impl SecurityContexts for MemorySelinux {
        fn get_context(&self, path: &Utf8Path) -> io::Result<Option<String>> {
            Ok(self.labels.lock().expect("labels lock").get(path).cloned())
        }

        fn set_context(&self, path: &Utf8Path, context: &str) -> io::Result<()> {
            self.labels
                .lock()
                .expect("labels lock")
                .insert(path.to_path_buf(), context.to_owned());
            Ok(())
        }
    }
}
