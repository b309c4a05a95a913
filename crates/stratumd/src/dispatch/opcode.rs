//! The closed set of request opcodes.

use strum::Display;

use super::{DispatchError, Privilege};

/// Operation requested by a client, as the first `i32` of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Opcode {
    /// Daemon version string.
    CheckVersion,
    /// Numeric daemon version.
    CheckVersionCode,
    /// Shut the daemon down.
    StopDaemon,
    /// Read a property through the override store.
    GetProperty,
    /// Set a property override.
    SetProperty,
    /// Remove a property override.
    DeleteProperty,
    /// Delete every installed module, optionally rebooting.
    RemoveModules,
    /// Current boot stage and safe-mode flag.
    BootStatus,
    /// Names of the active modules.
    ModuleList,
    /// Directory descriptor of one active module.
    ModuleDir,
    /// Trigger the post-fs-data stage.
    PostFsData,
    /// Trigger the late-start stage.
    LateStart,
    /// Trigger the boot-complete stage.
    BootComplete,
}

impl Opcode {
    /// Wire value of the opcode.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::CheckVersion => 0,
            Self::CheckVersionCode => 1,
            Self::StopDaemon => 2,
            Self::GetProperty => 3,
            Self::SetProperty => 4,
            Self::DeleteProperty => 5,
            Self::RemoveModules => 6,
            Self::BootStatus => 7,
            Self::ModuleList => 8,
            Self::ModuleDir => 9,
            Self::PostFsData => 10,
            Self::LateStart => 11,
            Self::BootComplete => 12,
        }
    }

    /// Who may issue the opcode.
    #[must_use]
    pub const fn privilege(self) -> Privilege {
        match self {
            Self::CheckVersion | Self::CheckVersionCode | Self::GetProperty => {
                Privilege::Unrestricted
            }
            Self::StopDaemon
            | Self::SetProperty
            | Self::DeleteProperty
            | Self::PostFsData
            | Self::LateStart
            | Self::BootComplete => Privilege::Root,
            Self::RemoveModules => Privilege::RootOrShell,
            Self::BootStatus | Self::ModuleList => Privilege::RootOrZygote,
            Self::ModuleDir => Privilege::Zygote,
        }
    }
}

impl TryFrom<i32> for Opcode {
    type Error = DispatchError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Self::CheckVersion,
            1 => Self::CheckVersionCode,
            2 => Self::StopDaemon,
            3 => Self::GetProperty,
            4 => Self::SetProperty,
            5 => Self::DeleteProperty,
            6 => Self::RemoveModules,
            7 => Self::BootStatus,
            8 => Self::ModuleList,
            9 => Self::ModuleDir,
            10 => Self::PostFsData,
            11 => Self::LateStart,
            12 => Self::BootComplete,
            other => return Err(DispatchError::unknown_opcode(other)),
        })
    }
}
