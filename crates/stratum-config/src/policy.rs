//! Ordering and lookup policies that the daemon leaves to the operator.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Key used to rank modules before their trees are merged.
///
/// Every policy falls back to the module directory name, so two modules never
/// share a priority.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum ModuleOrder {
    /// Older installs first; the most recently installed module wins.
    #[default]
    InstallTime,
    /// Lexicographic directory name.
    Name,
    /// Explicit `priority=` weight from `module.prop`.
    Weight,
}

/// Which override stays live when a module's `system.prop` names a property
/// that already has a persisted override. Client writes always replace the
/// existing override.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum PropertyLookup {
    /// Module properties replace persisted overrides.
    #[default]
    VolatileFirst,
    /// Persisted overrides survive module properties.
    PersistentFirst,
}
