//! Keeps one open [`Registry`] per collection directory. Handles are created
//! on first use and live as long as the pool.

use crate::registry::{Registry, RegistryOptions, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

type Slot = Arc<OnceCell<Arc<dyn Registry>>>;

/// Hands out shared [`Registry`] handles keyed by collection directory.
/// Concurrent first requests for the same directory are resolved to a single
/// handle: one caller opens the store while the others wait for it.
#[derive(Default)]
pub struct RegistryPool {
    options: RegistryOptions,
    slots: Mutex<HashMap<PathBuf, Slot>>,
}

impl RegistryPool {
    pub fn new(options: RegistryOptions) -> Self {
        RegistryPool {
            options,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The options used to open new registries.
    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    fn slot(&self, directory: &Path) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(slots.entry(directory.to_owned()).or_default())
    }

    /// Returns the registry for the collection in `directory`, opening and
    /// initializing it on first use. Different spellings of one directory
    /// (`blog`, `./blog`) share a registry. If opening fails, nothing is
    /// cached and a later call tries again.
    pub async fn acquire(&self, directory: &Path) -> Result<Arc<dyn Registry>> {
        // a missing directory keeps its given path; opening it fails below
        let directory = tokio::fs::canonicalize(directory)
            .await
            .unwrap_or_else(|_| directory.to_owned());
        let slot = self.slot(&directory);
        let options = &self.options;
        let directory = directory.as_path();
        let registry = slot
            .get_or_try_init(|| async move {
                tracing::debug!(
                    directory = %directory.display(),
                    "initializing publication registry"
                );
                options.open(directory).await
            })
            .await?;
        Ok(Arc::clone(registry))
    }

    /// The number of directories with an open registry.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
