//! Shared doubles and worlds for the daemon test suites.

mod config_loader;
mod process_world;
mod reporter;
mod world;

pub(crate) use config_loader::{FailingConfigLoader, TestConfigLoader};
pub(crate) use process_world::{ProcessTestWorld, StepResult};
pub(crate) use reporter::{HealthEvent, RecordingHealthReporter};
pub(crate) use world::{TestWorld, world};
