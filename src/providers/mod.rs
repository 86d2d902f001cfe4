//! Domain providers.
//!
//! Each provider owns one in-memory collection and the autosave controller
//! for its storage key. Mutations normalize and validate input, update the
//! collection optimistically, schedule a save and emit a domain event.

pub mod projects;
pub mod settings;
pub mod tasks;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::rc::Rc;

use crate::autosave::{AutosaveConfig, AutosaveController};
use crate::clock::Clock;
use crate::events::EventBus;
use crate::storage::KeyedStore;
use crate::sync::KeySync;

pub use projects::ProjectProvider;
pub use settings::SettingsProvider;
pub use tasks::TaskProvider;

/// Shared handles every provider is built from
#[derive(Clone)]
pub struct ProviderContext {
    pub store: Rc<KeyedStore>,
    pub fallback: Rc<KeyedStore>,
    pub bus: Rc<EventBus>,
    pub clock: Rc<dyn Clock>,
    pub autosave: AutosaveConfig,
    /// Identifies this session in cross-session sync entries
    pub session_id: String,
}

impl ProviderContext {
    /// Load the collection under `key` and build its primed autosave controller
    pub(crate) fn load<T>(&self, key: &str, fallback: T) -> (T, AutosaveController<T>)
    where
        T: Serialize + DeserializeOwned,
    {
        // Mirror first: a write landing in between then shows up as foreign
        let mut sync = KeySync::new(key, self.session_id.clone());
        sync.catch_up(&self.store);
        let value = self.store.read(key, fallback);
        let mut controller = AutosaveController::new(
            key,
            self.store.clone(),
            self.fallback.clone(),
            self.clock.clone(),
            self.autosave.clone(),
        )
        .with_sync(sync);
        controller.prime(&value);
        (value, controller)
    }
}

/// Trim a free-text field, mapping blank input to `None`
pub(crate) fn normalize_optional(input: Option<String>) -> Option<String> {
    input
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
