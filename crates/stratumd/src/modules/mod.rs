//! Installed third-party modules.
//!
//! Each module is a directory under the module root. Marker files steer the
//! scan (`remove`, `disable`, `skip_mount`), `module.prop` carries metadata,
//! `system.prop` carries property overrides and `system/` holds the tree
//! merged onto the base partitions.

mod descriptor;
mod errors;
mod order;
mod registry;
mod store;

#[cfg(test)]
pub(crate) mod test_support;
#[cfg(test)]
mod tests;

pub use descriptor::{Module, ModuleInfo};
pub use errors::ModuleError;
pub use registry::ModuleRegistry;
pub use store::ModuleStore;

#[cfg(test)]
pub(crate) use descriptor::{DISABLE_MARKER, SKIP_MOUNT_MARKER};

const MODULES_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::modules");
