//! Device reboot seam used after removing every module.

use std::io;
use std::process::Command;

const REBOOT_BINARY: &str = "/system/bin/reboot";

/// Restarts the device.
pub trait Rebooter: Send + Sync {
    /// Requests a reboot; returns once the request has been issued.
    fn reboot(&self) -> io::Result<()>;
}

/// Reboots through the platform `reboot` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRebooter;

impl Rebooter for SystemRebooter {
    fn reboot(&self) -> io::Result<()> {
        let status = Command::new(REBOOT_BINARY).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("{REBOOT_BINARY} exited with {status}")))
        }
    }
}
