//! Locked override map consulted by the property opcodes.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use stratum_config::PropertyLookup;
use tracing::debug;

use crate::files::{atomic_write, read_optional};

use super::{PROPS_TARGET, PersistenceError, SystemProperties, file};

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertySource {
    /// A runtime override that disappears with the daemon.
    Volatile,
    /// An override written through to the property file.
    Persistent,
    /// The system property service.
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Override {
    value: String,
    persisted: bool,
}

impl Override {
    fn source(&self) -> PropertySource {
        if self.persisted {
            PropertySource::Persistent
        } else {
            PropertySource::Volatile
        }
    }
}

/// Live overrides, one per name, plus a mirror of the property file.
///
/// `stored` only changes when the file is rewritten, so a volatile delete of
/// a persisted name leaves the file and its mirror alone.
#[derive(Debug, Default, Clone)]
struct OverrideTables {
    entries: BTreeMap<String, Override>,
    stored: BTreeMap<String, String>,
}

/// Property overrides layered over the system property service.
///
/// Each name has at most one live override; `set` replaces it and `delete`
/// removes it. One writer lock covers the map; readers always see a state
/// that existed between two writes. File writes happen before the map
/// changes, so a failed write leaves the store untouched.
pub struct PropertyStore {
    tables: RwLock<OverrideTables>,
    file: PathBuf,
    order: PropertyLookup,
    system: Arc<dyn SystemProperties>,
}

impl PropertyStore {
    /// Opens the store, loading persisted overrides from `path` if present.
    pub fn open(
        path: impl Into<PathBuf>,
        order: PropertyLookup,
        system: Arc<dyn SystemProperties>,
    ) -> Result<Self, PersistenceError> {
        let file = path.into();
        let stored = read_optional(&file)
            .map_err(|source| PersistenceError::Read {
                path: file.clone(),
                source,
            })?
            .map(|contents| file::parse(&contents))
            .unwrap_or_default();
        debug!(
            target: PROPS_TARGET,
            file = %file.display(),
            count = stored.len(),
            "loaded persisted property overrides"
        );
        let entries = stored
            .iter()
            .map(|(name, value)| {
                (
                    name.clone(),
                    Override {
                        value: value.clone(),
                        persisted: true,
                    },
                )
            })
            .collect();
        Ok(Self {
            tables: RwLock::new(OverrideTables { entries, stored }),
            file,
            order,
            system,
        })
    }

    /// Value of `name`: the live override, then the system.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        self.resolve(name).map(|(value, _)| value)
    }

    /// Like [`PropertyStore::get`], also reporting which layer answered.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<(String, PropertySource)> {
        let hit = self
            .read_tables()
            .entries
            .get(name)
            .map(|entry| (entry.value.clone(), entry.source()));
        hit.or_else(|| {
            self.system
                .get(name)
                .map(|value| (value, PropertySource::System))
        })
    }

    /// Replaces the override of `name`. With `persist` the value is written
    /// through to the property file; without it any persisted copy is
    /// dropped from the file so the volatile value is the only one left.
    pub fn set(&self, name: &str, value: &str, persist: bool) -> Result<(), PersistenceError> {
        file::validate(name, value)?;
        {
            let mut tables = self.write_tables();
            if persist {
                let mut next = tables.stored.clone();
                next.insert(name.to_owned(), value.to_owned());
                self.persist(&next)?;
                tables.stored = next;
            } else if tables.stored.contains_key(name) {
                let mut next = tables.stored.clone();
                next.remove(name);
                self.persist(&next)?;
                tables.stored = next;
            }
            tables.entries.insert(
                name.to_owned(),
                Override {
                    value: value.to_owned(),
                    persisted: persist,
                },
            );
        }
        self.system.changed(name, value);
        Ok(())
    }

    /// Removes the override of `name`. With `persist` the property file is
    /// rewritten without it as well. Returns whether a live override existed.
    pub fn delete(&self, name: &str, persist: bool) -> Result<bool, PersistenceError> {
        let existed = {
            let mut tables = self.write_tables();
            if persist && tables.stored.contains_key(name) {
                let mut next = tables.stored.clone();
                next.remove(name);
                self.persist(&next)?;
                tables.stored = next;
            }
            tables.entries.remove(name).is_some()
        };
        if existed {
            self.system.removed(name);
        }
        Ok(existed)
    }

    /// Installs volatile overrides in bulk, as read from a module's
    /// `system.prop`. Where a name already carries a persisted override the
    /// lookup policy decides which one stays live.
    pub fn load_volatile(&self, entries: BTreeMap<String, String>) {
        if entries.is_empty() {
            return;
        }
        let keep_persisted = self.order == PropertyLookup::PersistentFirst;
        let changed: Vec<(String, String)> = {
            let mut tables = self.write_tables();
            entries
                .into_iter()
                .filter(|(name, _)| {
                    !(keep_persisted
                        && tables
                            .entries
                            .get(name)
                            .is_some_and(|entry| entry.persisted))
                })
                .collect::<Vec<_>>()
                .into_iter()
                .inspect(|(name, value)| {
                    tables.entries.insert(
                        name.clone(),
                        Override {
                            value: value.clone(),
                            persisted: false,
                        },
                    );
                })
                .collect()
        };
        for (name, value) in &changed {
            self.system.changed(name, value);
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), PersistenceError> {
        atomic_write(&self.file, file::render(entries).as_bytes()).map_err(|source| {
            PersistenceError::Write {
                path: self.file.clone(),
                source,
            }
        })
    }

    fn read_tables(&self) -> std::sync::RwLockReadGuard<'_, OverrideTables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_tables(&self) -> std::sync::RwLockWriteGuard<'_, OverrideTables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PropertyStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PropertyStore")
            .field("file", &self.file)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}
