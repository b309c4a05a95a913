//! Test suites for the broker daemon.

pub(crate) mod support;
