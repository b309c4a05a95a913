//! Process supervision for the daemon binary.
//!
//! A launch takes the singleton lock in the runtime directory, optionally
//! detaches into the background, publishes its pid and a JSON health
//! snapshot, and then serves requests until a termination signal arrives or
//! a client asks it to stop.

use std::time::Duration;

pub(crate) mod daemonizer;
mod errors;
mod guard;
pub(crate) mod launch;
pub(crate) mod shutdown;

pub use errors::LaunchError;
pub use launch::{LaunchMode, run_daemon};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
pub(crate) const SHUTDOWN_POLL: Duration = Duration::from_millis(100);
pub(crate) const FOREGROUND_ENV_VAR: &str = "STRATUM_FOREGROUND";
