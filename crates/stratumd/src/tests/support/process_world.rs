//! Process supervision world shared by the lifecycle scenarios.

use std::fs;
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use stratum_config::RuntimePaths;

use crate::bootstrap::ConfigLoader;
use crate::health::HealthReporter;
use crate::process::LaunchError;
use crate::process::LaunchMode;
use crate::process::daemonizer::{DaemonizeError, Daemonizer};
use crate::process::launch::{LaunchPlan, ProcessControl, ServiceDeps, run_daemon_with};
use crate::process::shutdown::{ShutdownError, ShutdownSignal};
use crate::transport::{FrameRead, FrameWrite};

use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::reporter::RecordingHealthReporter;

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub(crate) type StepResult = Result<(), String>;

/// Counts daemonisation requests without forking.
#[derive(Debug, Clone, Default)]
pub(crate) struct TestDaemonizer {
    calls: Arc<AtomicUsize>,
}

impl Daemonizer for TestDaemonizer {
    fn daemonize(&self, _paths: &RuntimePaths) -> Result<(), DaemonizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shutdown signal released by the test or by a client stop request.
#[derive(Debug, Clone, Default)]
pub(crate) struct TestShutdownSignal {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl TestShutdownSignal {
    fn triggered() -> Self {
        let signal = Self::default();
        signal.trigger();
        signal
    }

    pub(crate) fn trigger(&self) {
        let (flag, ready) = &*self.state;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        ready.notify_all();
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn wait(&self, stop: &AtomicBool) -> Result<(), ShutdownError> {
        let (flag, ready) = &*self.state;
        let mut triggered = flag.lock().unwrap_or_else(PoisonError::into_inner);
        while !*triggered && !stop.load(Ordering::SeqCst) {
            triggered = ready
                .wait_timeout(triggered, POLL_INTERVAL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        Ok(())
    }
}

pub(crate) struct ProcessTestWorld {
    loader: TestConfigLoader,
    pub(crate) reporter: Arc<RecordingHealthReporter>,
    daemonizer: TestDaemonizer,
    shutdown: TestShutdownSignal,
    handle: Option<thread::JoinHandle<Result<(), LaunchError>>>,
    result: Option<Result<(), LaunchError>>,
}

impl ProcessTestWorld {
    pub(crate) fn new() -> Self {
        Self {
            loader: TestConfigLoader::new(),
            reporter: Arc::new(RecordingHealthReporter::default()),
            daemonizer: TestDaemonizer::default(),
            shutdown: TestShutdownSignal::default(),
            handle: None,
            result: None,
        }
    }

    fn plan<L: ConfigLoader>(
        &self,
        mode: LaunchMode,
        loader: L,
        shutdown: TestShutdownSignal,
    ) -> LaunchPlan<L, TestDaemonizer, TestShutdownSignal> {
        LaunchPlan {
            process: ProcessControl {
                mode,
                daemonizer: self.daemonizer.clone(),
                shutdown,
            },
            services: ServiceDeps {
                loader,
                reporter: self.reporter.clone() as Arc<dyn HealthReporter>,
            },
        }
    }

    /// Launches on a worker thread; the run ends on [`Self::trigger_shutdown`].
    pub(crate) fn start_background(&mut self) -> StepResult {
        if self.handle.is_some() {
            return Err("daemon already running".to_owned());
        }
        let plan = self.plan(
            LaunchMode::Background,
            self.loader.clone(),
            self.shutdown.clone(),
        );
        self.handle = Some(thread::spawn(move || run_daemon_with(plan)));
        Ok(())
    }

    /// Runs to completion on the calling thread. With `pretrigger` the
    /// shutdown signal has already fired; otherwise the launch is expected
    /// to fail before it waits.
    pub(crate) fn start_foreground(&mut self, pretrigger: bool) {
        let shutdown = if pretrigger {
            TestShutdownSignal::triggered()
        } else {
            TestShutdownSignal::default()
        };
        let plan = self.plan(LaunchMode::Foreground, self.loader.clone(), shutdown);
        self.result = Some(run_daemon_with(plan));
    }

    pub(crate) fn start_with_invalid_config(&mut self) {
        let plan = self.plan(
            LaunchMode::Foreground,
            FailingConfigLoader,
            TestShutdownSignal::default(),
        );
        self.result = Some(run_daemon_with(plan));
    }

    pub(crate) fn wait_for_ready(&self) -> StepResult {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            if self.health_status().as_deref() == Some("ready") {
                return Ok(());
            }
            if self.handle.as_ref().is_some_and(thread::JoinHandle::is_finished) {
                return Err("daemon exited before becoming ready".to_owned());
            }
            thread::sleep(POLL_INTERVAL);
        }
        Err("daemon did not publish a ready health snapshot".to_owned())
    }

    pub(crate) fn trigger_shutdown(&self) {
        self.shutdown.trigger();
    }

    pub(crate) fn join_background(&mut self) -> StepResult {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| "daemon not running".to_owned())?;
        let result = handle
            .join()
            .map_err(|_| "daemon thread panicked".to_owned())?;
        self.result = Some(result);
        Ok(())
    }

    /// Lock and pid files left behind by a daemon that no longer exists.
    pub(crate) fn write_stale_runtime(&self) -> StepResult {
        let runtime = self.loader.runtime_dir();
        fs::create_dir_all(&runtime).map_err(|error| error.to_string())?;
        fs::write(self.lock_path(), b"").map_err(|error| error.to_string())?;
        fs::write(self.pid_path(), format!("{}\n", i32::MAX)).map_err(|error| error.to_string())
    }

    /// Sends `opcode` with no payload and returns the reply status and
    /// first body string.
    pub(crate) fn request_string(&self, opcode: i32) -> Result<(i32, String), String> {
        let mut stream =
            UnixStream::connect(self.loader.socket_path()).map_err(|error| error.to_string())?;
        stream
            .set_read_timeout(Some(WAIT_TIMEOUT))
            .map_err(|error| error.to_string())?;
        stream.write_int(opcode).map_err(|error| error.to_string())?;
        stream.flush().map_err(|error| error.to_string())?;
        let status = stream.read_int().map_err(|error| error.to_string())?;
        let body = stream.read_string().map_err(|error| error.to_string())?;
        Ok((status, body))
    }

    pub(crate) fn health_status(&self) -> Option<String> {
        let contents = fs::read_to_string(self.health_path()).ok()?;
        let snapshot: Value = serde_json::from_str(&contents).ok()?;
        snapshot
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    pub(crate) const fn last_result(&self) -> Option<&Result<(), LaunchError>> {
        self.result.as_ref()
    }

    pub(crate) fn daemonizer_calls(&self) -> usize {
        self.daemonizer.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn socket_exists(&self) -> bool {
        self.loader.socket_path().exists()
    }

    pub(crate) fn lock_path(&self) -> PathBuf {
        self.loader.runtime_dir().join("stratumd.lock").into()
    }

    pub(crate) fn pid_path(&self) -> PathBuf {
        self.loader.runtime_dir().join("stratumd.pid").into()
    }

    pub(crate) fn health_path(&self) -> PathBuf {
        self.loader.runtime_dir().join("stratumd.health").into()
    }
}

impl Drop for ProcessTestWorld {
    fn drop(&mut self) {
        self.shutdown.trigger();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
