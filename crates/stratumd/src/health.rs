//! Structured health reporting for daemon lifecycle events.

use std::sync::Arc;

use stratum_config::Config;

use crate::boot::{BootStage, StageOutcome};
use crate::bootstrap::BootstrapError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the socket accepts connections.
    fn listener_ready(&self, config: &Config);

    /// Invoked after a boot stage was triggered and did something.
    fn stage_finished(&self, stage: BootStage, outcome: &StageOutcome);

    /// Invoked when shutdown begins.
    fn shutdown_requested(&self, reason: &str);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn listener_ready(&self, config: &Config) {
        (**self).listener_ready(config);
    }

    fn stage_finished(&self, stage: BootStage, outcome: &StageOutcome) {
        (**self).stage_finished(stage, outcome);
    }

    fn shutdown_requested(&self, reason: &str) {
        (**self).shutdown_requested(reason);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.daemon_socket(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            module_root = %config.module_root(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn listener_ready(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listener_ready",
            socket = %config.daemon_socket(),
            "accepting requests"
        );
    }

    fn stage_finished(&self, stage: BootStage, outcome: &StageOutcome) {
        match outcome {
            StageOutcome::Degraded(detail) => tracing::warn!(
                target: HEALTH_TARGET,
                event = "stage_degraded",
                stage = %stage,
                detail = %detail,
                "boot stage degraded"
            ),
            StageOutcome::Skipped(detail) => tracing::info!(
                target: HEALTH_TARGET,
                event = "stage_skipped",
                stage = %stage,
                detail = %detail,
                "boot stage skipped"
            ),
            StageOutcome::Completed | StageOutcome::AlreadyDone => tracing::info!(
                target: HEALTH_TARGET,
                event = "stage_completed",
                stage = %stage,
                "boot stage completed"
            ),
        }
    }

    fn shutdown_requested(&self, reason: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_requested",
            reason,
            "daemon shutting down"
        );
    }
}
