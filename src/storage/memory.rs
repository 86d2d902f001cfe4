use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use super::{MediumError, StorageMedium};

#[derive(Default)]
struct MemoryState {
    entries: RefCell<BTreeMap<String, String>>,
    fail_writes: Cell<bool>,
    writes: Cell<usize>,
}

/// In-process medium. Clones share the same map, so two stores built from
/// clones behave like two sessions over one storage area.
#[derive(Clone, Default)]
pub struct MemoryMedium {
    state: Rc<MemoryState>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set`/`remove` fail, as a full or disabled store would
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.fail_writes.set(fail);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.state.writes.get()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.state.entries.borrow().clone()
    }

    fn check_writable(&self) -> Result<(), MediumError> {
        if self.state.fail_writes.get() {
            Err(MediumError::Unavailable("memory medium is read-only".to_string()))
        } else {
            Ok(())
        }
    }
}

impl StorageMedium for MemoryMedium {
    fn get(&self, key: &str) -> Result<Option<String>, MediumError> {
        Ok(self.state.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), MediumError> {
        self.check_writable()?;
        self.state
            .entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.state.writes.set(self.state.writes.get() + 1);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), MediumError> {
        self.check_writable()?;
        self.state.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, MediumError> {
        Ok(self.state.entries.borrow().keys().cloned().collect())
    }
}
