//! Root broker daemon for systemless device modification.
//!
//! `stratumd` owns a Unix socket through which privileged and unprivileged
//! clients query and control a rooted device. Every connection carries a
//! single request; the caller's kernel credentials and security context
//! decide what it may do. Behind the dispatcher sit three long-lived
//! services:
//!
//! - the [`boot`] state machine, which runs post-fs-data, late-start and
//!   boot-complete work exactly once each and detects safe mode;
//! - the [`mount`] orchestrator, which layers the file trees of installed
//!   [`modules`] over the system partitions without modifying them;
//! - the [`props`] store, which shadows system properties with volatile and
//!   persisted overrides.
//!
//! [`run_daemon`] performs the whole launch: configuration through
//! [`stratum_config`], the runtime lock, optional daemonisation, structured
//! telemetry, and the accept loop until a signal or a client stops it.

pub mod boot;
mod bootstrap;
pub mod dispatch;
mod files;
mod health;
pub mod modules;
pub mod mount;
mod process;
pub mod props;
pub mod selinux;
mod state;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, LaunchMode, run_daemon};
pub use state::DaemonState;
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{FrameError, ListenerError, PeerCredentials};

#[cfg(test)]
mod tests;
