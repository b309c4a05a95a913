//! Boot-stage tracking.
//!
//! Init, then post-fs-data, late-start and boot-complete, each run at most
//! once per daemon lifetime.

mod controller;
mod counter;
mod scripts;
mod services;
mod stage;

#[cfg(test)]
pub(crate) use scripts::test_support;
#[cfg(test)]
mod tests;

pub use controller::{BootController, StageHooks};
pub use counter::BootCounter;
pub use scripts::{BootScripts, Script, ScriptRunner, ScriptStage, ShellScripts};
pub use services::BootServices;
pub use stage::{BootStage, StageOutcome, StageReport};

const BOOT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::boot");
