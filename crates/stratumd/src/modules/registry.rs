use std::sync::{PoisonError, RwLock};

use super::Module;

/// Modules activated by the last post-fs-data run, in priority order.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    active: RwLock<Vec<Module>>,
}

impl ModuleRegistry {
    /// Replaces the active list.
    pub fn replace(&self, modules: Vec<Module>) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = modules;
    }

    /// Copy of the active list.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Module> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Module at `index` in the active list.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Module> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }
}
