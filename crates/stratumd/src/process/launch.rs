//! Launch sequencing: lock, detach, bootstrap, serve, shut down.

use std::env;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tracing::info;

use stratum_config::RuntimePaths;

use crate::bootstrap::{ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::dispatch::RequestDispatcher;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::state::DaemonState;
use crate::transport::SocketListener;

use super::daemonizer::{Daemonizer, SystemDaemonizer};
use super::errors::LaunchError;
use super::guard::{HealthState, ProcessGuard};
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::{FOREGROUND_ENV_VAR, PROCESS_TARGET, SHUTDOWN_POLL};

/// Whether the daemon detaches from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Fork into the background and detach from the controlling terminal.
    Background,
    /// Stay attached; used under init supervision and in tests.
    Foreground,
}

impl LaunchMode {
    fn detect() -> Self {
        if env::var_os(FOREGROUND_ENV_VAR).is_some() {
            Self::Foreground
        } else {
            Self::Background
        }
    }
}

/// Process-level collaborators.
pub(crate) struct ProcessControl<D, S> {
    pub(crate) mode: LaunchMode,
    pub(crate) daemonizer: D,
    pub(crate) shutdown: S,
}

/// Service-level collaborators.
pub(crate) struct ServiceDeps<L> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
}

/// Everything a launch needs.
pub(crate) struct LaunchPlan<L, D, S> {
    pub(crate) process: ProcessControl<D, S>,
    pub(crate) services: ServiceDeps<L>,
}

/// Runs the daemon with the production collaborators.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(LaunchPlan {
        process: ProcessControl {
            mode: LaunchMode::detect(),
            daemonizer: SystemDaemonizer::new(),
            shutdown: SystemShutdownSignal::new(SHUTDOWN_POLL),
        },
        services: ServiceDeps {
            loader: SystemConfigLoader,
            reporter: Arc::new(StructuredHealthReporter::new()),
        },
    })
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with<L, D, S>(plan: LaunchPlan<L, D, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    D: Daemonizer,
    S: ShutdownSignal,
{
    let LaunchPlan {
        process:
            ProcessControl {
                mode,
                daemonizer,
                shutdown,
            },
        services: ServiceDeps { loader, reporter },
    } = plan;

    info!(target: PROCESS_TARGET, ?mode, "starting daemon");
    let config = loader.load()?;
    config.daemon_socket().prepare_filesystem()?;
    let mut guard = ProcessGuard::acquire(RuntimePaths::from_config(&config)?)?;
    if mode == LaunchMode::Background {
        daemonizer.daemonize(guard.paths())?;
    }
    guard.write_pid(std::process::id())?;
    guard.write_health(HealthState::Starting)?;
    let listener = SocketListener::bind(config.daemon_socket())?;

    let daemon = bootstrap_with(&StaticConfigLoader::new(config), reporter)?;
    let stop = Arc::new(AtomicBool::new(false));
    let state = DaemonState::from_config(
        daemon.config(),
        guard.paths(),
        daemon.reporter(),
        Arc::clone(&stop),
    )?;
    let dispatcher = RequestDispatcher::new(Arc::new(state), daemon.config().idle_timeout());

    let listener_handle = listener.start(Arc::new(dispatcher))?;
    daemon.reporter().listener_ready(daemon.config());
    guard.write_health(HealthState::Ready)?;

    shutdown.wait(&stop)?;
    daemon.reporter().shutdown_requested("daemon stopping");
    guard.write_health(HealthState::Stopping)?;
    listener_handle.shutdown();
    listener_handle.join()?;
    info!(target: PROCESS_TARGET, "shutdown complete");
    Ok(())
}
