//! Privileged filesystem operations used by the mount pipeline.

use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, symlink};

use camino::Utf8Path;
use nix::mount::{MntFlags, MsFlags, mount, umount2};
use nix::sched::{CloneFlags, setns, unshare};
use tracing::debug;

use super::MOUNT_TARGET;

/// Mount namespace and mount table manipulation.
///
/// Creation calls succeed when the entry already exists, so replaying a
/// plan is harmless.
pub trait MountCapability: Send + Sync {
    /// Moves the calling thread into a fresh private mount namespace.
    fn unshare_namespace(&self) -> io::Result<()>;

    /// Moves the calling thread into the mount namespace of `pid`.
    fn join_namespace(&self, pid: i32) -> io::Result<()>;

    /// Mounts a tmpfs at `target`, tagging it with `source`.
    fn mount_tmpfs(&self, target: &Utf8Path, source: &str) -> io::Result<()>;

    /// Binds `source` over `target`.
    fn bind_mount(&self, source: &Utf8Path, target: &Utf8Path, recursive: bool)
    -> io::Result<()>;

    /// Lazily detaches the mount at `target`.
    fn unmount(&self, target: &Utf8Path) -> io::Result<()>;

    /// Creates `path` and any missing parents.
    fn create_dir(&self, path: &Utf8Path, mode: u32) -> io::Result<()>;

    /// Creates an empty file at `path`.
    fn create_file(&self, path: &Utf8Path, mode: u32) -> io::Result<()>;

    /// Creates a symlink at `path` pointing at `target`.
    fn symlink(&self, target: &Utf8Path, path: &Utf8Path) -> io::Result<()>;
}

/// The real kernel interface.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostMounts;

impl MountCapability for HostMounts {
    fn unshare_namespace(&self) -> io::Result<()> {
        unshare(CloneFlags::CLONE_NEWNS)?;
        // Keep the new namespace's mounts from propagating back.
        mount(
            None::<&str>,
            "/",
            None::<&str>,
            MsFlags::MS_REC | MsFlags::MS_PRIVATE,
            None::<&str>,
        )?;
        Ok(())
    }

    fn join_namespace(&self, pid: i32) -> io::Result<()> {
        let cwd = std::env::current_dir()?;
        let namespace = File::open(format!("/proc/{pid}/ns/mnt"))?;
        setns(&namespace, CloneFlags::CLONE_NEWNS)?;
        // Joining a namespace resets the working directory.
        std::env::set_current_dir(cwd)?;
        Ok(())
    }

    fn mount_tmpfs(&self, target: &Utf8Path, source: &str) -> io::Result<()> {
        mount(
            Some(source),
            target.as_std_path(),
            Some("tmpfs"),
            MsFlags::empty(),
            Some("mode=755"),
        )?;
        Ok(())
    }

    fn bind_mount(
        &self,
        source: &Utf8Path,
        target: &Utf8Path,
        recursive: bool,
    ) -> io::Result<()> {
        let mut flags = MsFlags::MS_BIND;
        if recursive {
            flags |= MsFlags::MS_REC;
        }
        mount(
            Some(source.as_std_path()),
            target.as_std_path(),
            None::<&str>,
            flags,
            None::<&str>,
        )?;
        if let Err(error) = mount(
            None::<&str>,
            target.as_std_path(),
            None::<&str>,
            MsFlags::MS_BIND | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY,
            None::<&str>,
        ) {
            debug!(
                target: MOUNT_TARGET,
                path = %target,
                error = %error,
                "bind left writable"
            );
        }
        Ok(())
    }

    fn unmount(&self, target: &Utf8Path) -> io::Result<()> {
        umount2(target.as_std_path(), MntFlags::MNT_DETACH)?;
        Ok(())
    }

    fn create_dir(&self, path: &Utf8Path, mode: u32) -> io::Result<()> {
        if path.is_dir() {
            return Ok(());
        }
        DirBuilder::new().recursive(true).mode(mode).create(path)
    }

    fn create_file(&self, path: &Utf8Path, mode: u32) -> io::Result<()> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(mode)
            .open(path)
        {
            Err(error) if error.kind() != io::ErrorKind::AlreadyExists => Err(error),
            _ => Ok(()),
        }
    }

    fn symlink(&self, target: &Utf8Path, path: &Utf8Path) -> io::Result<()> {
        match fs::read_link(path) {
            Ok(existing) if existing == target.as_std_path() => Ok(()),
            Ok(_) => {
                fs::remove_file(path)?;
                symlink(target, path)
            }
            Err(_) => symlink(target, path),
        }
    }
}
