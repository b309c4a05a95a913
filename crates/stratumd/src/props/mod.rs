//! Property override store.
//!
//! Each name carries at most one override, either volatile (set at runtime
//! or loaded from a module `system.prop`) or persisted to a `key=value`
//! file. Lookups without an override fall through to the
//! [`SystemProperties`] collaborator.

mod errors;
pub(crate) mod file;
mod store;
mod system;


pub use errors::PersistenceError;
pub use store::{PropertySource, PropertyStore};
pub use system::{BuildPropFiles, SystemProperties};

const PROPS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::props");
