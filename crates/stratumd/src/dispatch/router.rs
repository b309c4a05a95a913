//! Opcode handlers.
//!
//! Each handler reads its payload, performs the operation and returns the
//! complete reply body. Nothing is written to the peer from here, so a
//! failing handler never leaves half a reply on the wire.

use std::fs::File;
use std::os::fd::OwnedFd;

use tracing::{debug, info};

use super::response::{FollowUp, Reply};
use super::{DISPATCH_TARGET, DispatchError, Opcode};
use crate::boot::BootStage;
use crate::state::DaemonState;
use crate::transport::{Channel, FrameRead};

/// Routes `opcode` to its handler.
pub(crate) fn route<C: Channel>(
    opcode: Opcode,
    state: &DaemonState,
    channel: &mut C,
) -> Result<Reply, DispatchError> {
    match opcode {
        Opcode::CheckVersion => Ok(Reply::empty().string(version_string())),
        Opcode::CheckVersionCode => Ok(Reply::empty().int(version_code())),
        Opcode::StopDaemon => Ok(Reply::empty().then(FollowUp::Stop)),
        Opcode::GetProperty => get_property(state, channel),
        Opcode::SetProperty => set_property(state, channel),
        Opcode::DeleteProperty => delete_property(state, channel),
        Opcode::RemoveModules => remove_modules(state, channel),
        Opcode::BootStatus => Ok(Reply::empty()
            .int(state.boot.stage().code())
            .int(i32::from(state.boot.safe_mode()))),
        Opcode::ModuleList => module_list(state),
        Opcode::ModuleDir => module_dir(state, channel),
        Opcode::PostFsData => Ok(trigger(state, BootStage::PostFsData)),
        Opcode::LateStart => Ok(trigger(state, BootStage::LateStart)),
        Opcode::BootComplete => Ok(trigger(state, BootStage::BootComplete)),
    }
}

/// `<version>:STRATUM:<D|R>`, the suffix marking debug or release builds.
pub(crate) fn version_string() -> String {
    let flavour = if cfg!(debug_assertions) { "D" } else { "R" };
    format!("{}:STRATUM:{flavour}", env!("CARGO_PKG_VERSION"))
}

/// `major * 10000 + minor * 100 + patch`.
pub(crate) fn version_code() -> i32 {
    let part = |value: &str| value.parse::<i32>().unwrap_or(0);
    part(env!("CARGO_PKG_VERSION_MAJOR")) * 10_000
        + part(env!("CARGO_PKG_VERSION_MINOR")) * 100
        + part(env!("CARGO_PKG_VERSION_PATCH"))
}

fn get_property<C: Channel>(state: &DaemonState, channel: &mut C) -> Result<Reply, DispatchError> {
    let name = channel.read_string()?;
    Ok(match state.props.get(&name) {
        Some(value) => Reply::empty().int(1).string(value),
        None => Reply::empty().int(0).string(""),
    })
}

fn set_property<C: Channel>(state: &DaemonState, channel: &mut C) -> Result<Reply, DispatchError> {
    let name = channel.read_string()?;
    let value = channel.read_string()?;
    let persist = channel.read_int()? != 0;
    state.props.set(&name, &value, persist)?;
    debug!(target: DISPATCH_TARGET, name = %name, persist, "property set");
    Ok(Reply::empty())
}

fn delete_property<C: Channel>(
    state: &DaemonState,
    channel: &mut C,
) -> Result<Reply, DispatchError> {
    let name = channel.read_string()?;
    let persist = channel.read_int()? != 0;
    let existed = state.props.delete(&name, persist)?;
    Ok(Reply::empty().int(i32::from(existed)))
}

fn remove_modules<C: Channel>(
    state: &DaemonState,
    channel: &mut C,
) -> Result<Reply, DispatchError> {
    let reboot = channel.read_int()? != 0;
    state.modules.remove_all()?;
    state.registry.replace(Vec::new());
    info!(target: DISPATCH_TARGET, reboot, "modules removed on request");
    let reply = Reply::empty();
    Ok(if reboot {
        reply.then(FollowUp::Reboot)
    } else {
        reply
    })
}

fn module_list(state: &DaemonState) -> Result<Reply, DispatchError> {
    let modules = state.registry.snapshot();
    let count = i32::try_from(modules.len())
        .map_err(|_| DispatchError::internal("too many active modules"))?;
    Ok(modules
        .into_iter()
        .fold(Reply::empty().int(count), |reply, module| {
            reply.string(module.name)
        }))
}

fn module_dir<C: Channel>(state: &DaemonState, channel: &mut C) -> Result<Reply, DispatchError> {
    let index = channel.read_int()?;
    let module = usize::try_from(index)
        .ok()
        .and_then(|position| state.registry.get(position))
        .ok_or_else(|| DispatchError::internal(format!("no active module at index {index}")))?;
    let directory = File::open(&module.root).map_err(|error| {
        DispatchError::internal(format!("cannot open '{}': {error}", module.root))
    })?;
    Ok(Reply::empty().fd(OwnedFd::from(directory)))
}

fn trigger(state: &DaemonState, stage: BootStage) -> Reply {
    let outcome = state.boot.trigger(stage, state.hooks.as_ref());
    Reply::empty()
        .int(outcome.code())
        .string(outcome.detail())
}
