//! [`HealthReporter`] double that records lifecycle events for assertions.

use std::sync::{Mutex, PoisonError};

use stratum_config::Config;

use crate::boot::{BootStage, StageOutcome};
use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;

/// Lifecycle events observed by the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    ListenerReady,
    /// Stage and the wire code of its outcome.
    StageFinished(BootStage, i32),
    ShutdownRequested(String),
}

#[derive(Debug, Default)]
pub(crate) struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Copy of the events recorded so far.
    pub(crate) fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn listener_ready(&self, _config: &Config) {
        self.record(HealthEvent::ListenerReady);
    }

    fn stage_finished(&self, stage: BootStage, outcome: &StageOutcome) {
        self.record(HealthEvent::StageFinished(stage, outcome.code()));
    }

    fn shutdown_requested(&self, reason: &str) {
        self.record(HealthEvent::ShutdownRequested(reason.to_owned()));
    }
}
