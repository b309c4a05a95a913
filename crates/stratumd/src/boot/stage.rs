//! Boot stages and the outcome of triggering one.

use strum::Display;

/// Points in the device boot sequence the daemon acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum BootStage {
    /// No stage has run yet.
    Init,
    /// Data partition mounted; modules are merged and mounted here.
    PostFsData,
    /// Late-start services are starting.
    LateStart,
    /// The system reported boot completion.
    BootComplete,
}

impl BootStage {
    /// Wire code of the stage.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Init => 0,
            Self::PostFsData => 1,
            Self::LateStart => 2,
            Self::BootComplete => 3,
        }
    }
}

/// Result of a stage trigger as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage ran cleanly.
    Completed,
    /// The stage had already run; nothing happened.
    AlreadyDone,
    /// The stage ran, but part of its work failed.
    Degraded(String),
    /// The stage did not run.
    Skipped(String),
}

impl StageOutcome {
    /// Wire code of the outcome.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::Completed => 0,
            Self::AlreadyDone => 1,
            Self::Degraded(_) => 2,
            Self::Skipped(_) => 3,
        }
    }

    /// Human-readable detail; empty for clean outcomes.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::Completed | Self::AlreadyDone => "",
            Self::Degraded(detail) | Self::Skipped(detail) => detail,
        }
    }
}

/// What a stage hook reports back to the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    /// The device booted into safe mode; later stages are restricted.
    pub safe_mode: bool,
    /// Reason the stage only partly succeeded.
    pub degraded: Option<String>,
}

impl StageReport {
    /// A clean run.
    #[must_use]
    pub const fn clean() -> Self {
        Self {
            safe_mode: false,
            degraded: None,
        }
    }

    /// A run that only partly succeeded.
    #[must_use]
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            safe_mode: false,
            degraded: Some(reason.into()),
        }
    }

    /// A run that entered safe mode.
    #[must_use]
    pub fn safe_mode(reason: impl Into<String>) -> Self {
        Self {
            safe_mode: true,
            degraded: Some(reason.into()),
        }
    }

    pub(crate) fn into_outcome(self) -> StageOutcome {
        self.degraded
            .map_or(StageOutcome::Completed, StageOutcome::Degraded)
    }
}
