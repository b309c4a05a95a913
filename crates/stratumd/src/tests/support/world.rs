//! Scenario world for the bootstrap behaviour suite.

use std::cell::RefCell;
use std::sync::Arc;

use crate::bootstrap::{BootstrapError, ConfigLoader, Daemon, bootstrap_with};

use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::reporter::RecordingHealthReporter;

pub(crate) struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub(crate) reporter: Arc<RecordingHealthReporter>,
    daemon: Option<Daemon>,
    bootstrap_error: Option<BootstrapError>,
}

impl TestWorld {
    pub(crate) fn new() -> Self {
        Self {
            loader: Box::new(TestConfigLoader::new()),
            reporter: Arc::new(RecordingHealthReporter::default()),
            daemon: None,
            bootstrap_error: None,
        }
    }

    pub(crate) fn use_failing_loader(&mut self) {
        self.loader = Box::new(FailingConfigLoader);
        self.reset();
    }

    pub(crate) fn use_successful_loader(&mut self) {
        self.loader = Box::new(TestConfigLoader::new());
        self.reset();
    }

    /// Runs bootstrap unless it already produced a result.
    pub(crate) fn bootstrap(&mut self) {
        if self.daemon.is_some() || self.bootstrap_error.is_some() {
            return;
        }
        match bootstrap_with(self.loader.as_ref(), self.reporter.clone()) {
            Ok(daemon) => self.daemon = Some(daemon),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    pub(crate) const fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    pub(crate) const fn daemon(&self) -> Option<&Daemon> {
        self.daemon.as_ref()
    }

    fn reset(&mut self) {
        self.daemon = None;
        self.bootstrap_error = None;
    }
}

pub(crate) fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
