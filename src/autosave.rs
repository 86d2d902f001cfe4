//! Debounced autosave.
//!
//! An [`AutosaveController`] owns one storage key. Changes are coalesced
//! until the debounce window has been quiet, then the latest value is
//! written. Failed writes are retried on a fixed interval; once retries are
//! exhausted the value is parked in the fallback store and the error
//! callback fires.
//!
//! The controller never sleeps or spawns: the host event loop calls
//! [`AutosaveController::poll`] and the controller acts when a deadline has
//! passed.
//!
//! ```text
//! Idle -> Pending -> Saving -> Saved
//!  ^         ^          |
//!  |         |          v
//!  |         +----- Retrying
//!  |                    |
//!  +--------------------+ retries exhausted: fallback store, error callback
//! ```

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::clock::Clock;
use crate::storage::{KeyedStore, StoreError};
use crate::sync::KeySync;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutosaveConfig {
    pub debounce: Duration,
    pub retry_interval: Duration,
    pub max_retries: u32,
    pub fallback_namespace: String,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1000),
            retry_interval: Duration::from_millis(2000),
            max_retries: 3,
            fallback_namespace: "fallback:".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Pending,
    Saving,
    Saved,
    Retrying { attempt: u32 },
    /// The latest value could not be serialized, so nothing was written
    Failed { error: String },
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveStatus::Idle => f.write_str("idle"),
            SaveStatus::Pending => f.write_str("unsaved changes"),
            SaveStatus::Saving => f.write_str("saving"),
            SaveStatus::Saved => f.write_str("saved"),
            SaveStatus::Retrying { attempt } => write!(f, "retrying ({})", attempt),
            SaveStatus::Failed { .. } => f.write_str("save failed"),
        }
    }
}

/// What lands in the fallback store when a value could not be saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackRecord {
    pub value: serde_json::Value,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// Passed to the error callback once per value given up on
#[derive(Debug, Clone)]
pub struct SaveFailure {
    pub key: String,
    pub error: String,
    pub attempts: u32,
}

pub type ErrorCallback = Box<dyn FnMut(&SaveFailure)>;

pub struct AutosaveController<T> {
    key: String,
    store: Rc<KeyedStore>,
    fallback: Rc<KeyedStore>,
    clock: Rc<dyn Clock>,
    config: AutosaveConfig,
    pending: Option<String>,
    deadline: Option<Instant>,
    attempts: u32,
    last_written: Option<String>,
    status: SaveStatus,
    on_error: Option<ErrorCallback>,
    sync: Option<KeySync>,
    _value: PhantomData<fn(&T)>,
}

impl<T: Serialize> AutosaveController<T> {
    pub fn new(
        key: impl Into<String>,
        store: Rc<KeyedStore>,
        fallback: Rc<KeyedStore>,
        clock: Rc<dyn Clock>,
        config: AutosaveConfig,
    ) -> Self {
        Self {
            key: key.into(),
            store,
            fallback,
            clock,
            config,
            pending: None,
            deadline: None,
            attempts: 0,
            last_written: None,
            status: SaveStatus::Idle,
            on_error: None,
            sync: None,
            _value: PhantomData,
        }
    }

    /// Publish every successful save to other sessions through `sync`
    pub fn with_sync(mut self, sync: KeySync) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn on_error(&mut self, callback: impl FnMut(&SaveFailure) + 'static) {
        self.on_error = Some(Box::new(callback));
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn status(&self) -> &SaveStatus {
        &self.status
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Mark `value` as already persisted, e.g. right after loading it
    pub fn prime(&mut self, value: &T) {
        if let Ok(json) = KeyedStore::to_json(&self.key, value) {
            if let Some(sync) = self.sync.as_mut() {
                sync.note_local(&json);
            }
            self.last_written = Some(json);
        }
    }

    /// Queue `value` as the latest state, restarting the debounce window
    pub fn schedule(&mut self, value: &T) {
        let json = match KeyedStore::to_json(&self.key, value) {
            Ok(json) => json,
            Err(e) => {
                error!(key = %self.key, error = %e, "Skipping save of unserializable value");
                self.status = SaveStatus::Failed { error: e.to_string() };
                return;
            }
        };

        if self.last_written.as_deref() == Some(json.as_str()) {
            // Back to what storage already holds
            if self.pending.take().is_some() {
                debug!(key = %self.key, "Pending change reverted, nothing to save");
                self.status = SaveStatus::Saved;
            }
            self.deadline = None;
            self.attempts = 0;
            return;
        }

        self.pending = Some(json);
        self.attempts = 0;
        self.deadline = Some(self.clock.now() + self.config.debounce);
        self.status = SaveStatus::Pending;
    }

    /// Perform a write if the debounce or retry deadline has passed
    pub fn poll(&mut self) {
        match self.deadline {
            Some(deadline) if self.clock.now() >= deadline => self.attempt_write(true),
            _ => {}
        }
    }

    /// Write any pending value now, with a single attempt
    pub fn flush(&mut self) {
        if self.pending.is_some() {
            self.attempt_write(false);
        }
    }

    fn attempt_write(&mut self, allow_retry: bool) {
        self.deadline = None;
        let Some(json) = self.pending.clone() else {
            return;
        };

        self.status = SaveStatus::Saving;
        match self.store.write_raw(&self.key, &json) {
            Ok(()) => {
                debug!(key = %self.key, attempts = self.attempts + 1, "Autosave complete");
                self.publish(&json);
                self.pending = None;
                self.attempts = 0;
                self.last_written = Some(json);
                self.status = SaveStatus::Saved;
            }
            Err(e) => {
                self.attempts += 1;
                if allow_retry && self.attempts <= self.config.max_retries {
                    warn!(key = %self.key, attempt = self.attempts, error = %e, "Autosave failed, retrying");
                    self.deadline = Some(self.clock.now() + self.config.retry_interval);
                    self.status = SaveStatus::Retrying { attempt: self.attempts };
                } else {
                    self.give_up(json, e);
                }
            }
        }
    }

    fn give_up(&mut self, json: String, cause: StoreError) {
        let error = cause.to_string();
        let fallback_key = format!("{}{}", self.config.fallback_namespace, self.key);
        error!(key = %self.key, attempts = self.attempts, error = %error, "Autosave gave up, writing to fallback store");

        let record = FallbackRecord {
            value: serde_json::from_str(&json).unwrap_or(serde_json::Value::String(json)),
            error: error.clone(),
            failed_at: self.clock.utc_now(),
        };
        if let Err(e) = self.fallback.write(&fallback_key, &record) {
            error!(key = %fallback_key, error = %e, "Fallback store rejected the value too");
        }

        let failure = SaveFailure {
            key: self.key.clone(),
            error: error.clone(),
            attempts: self.attempts,
        };
        if let Some(callback) = self.on_error.as_mut() {
            callback(&failure);
        }

        self.pending = None;
        self.attempts = 0;
        self.status = SaveStatus::Idle;
    }
}

impl<T: Serialize + DeserializeOwned> AutosaveController<T> {
    /// Pick up a value another session saved under this key.
    ///
    /// The foreign value replaces any pending local change.
    pub fn poll_external(&mut self) -> Option<T> {
        let value: T = self.sync.as_mut()?.poll(&self.store)?;
        if self.pending.take().is_some() {
            warn!(key = %self.key, "Local unsaved change overwritten by another session");
        }
        self.deadline = None;
        self.attempts = 0;
        self.last_written = KeyedStore::to_json(&self.key, &value).ok();
        self.status = SaveStatus::Saved;
        Some(value)
    }
}

impl<T> AutosaveController<T> {
    /// Mirror a value that just reached storage for other sessions
    fn publish(&mut self, json: &str) {
        let at = self.clock.utc_now();
        if let Some(sync) = self.sync.as_mut() {
            if let Err(e) = sync.publish(&self.store, json, at) {
                warn!(key = %self.key, error = %e, "Failed to publish change to other sessions");
            }
        }
    }
}

impl<T> Drop for AutosaveController<T> {
    fn drop(&mut self) {
        // Best effort: one synchronous attempt, no fallback bookkeeping
        if let Some(json) = self.pending.take() {
            match self.store.write_raw(&self.key, &json) {
                Ok(()) => self.publish(&json),
                Err(e) => warn!(key = %self.key, error = %e, "Final flush failed, change lost"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryMedium;
    use chrono::NaiveDate;
    use std::cell::Cell;

    struct Harness {
        primary: MemoryMedium,
        fallback: MemoryMedium,
        clock: Rc<ManualClock>,
        controller: AutosaveController<Vec<u32>>,
    }

    fn harness() -> Harness {
        let primary = MemoryMedium::new();
        let fallback = MemoryMedium::new();
        let clock = Rc::new(ManualClock::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        let controller = AutosaveController::new(
            "numbers",
            Rc::new(KeyedStore::new(primary.clone())),
            Rc::new(KeyedStore::new(fallback.clone())),
            clock.clone(),
            AutosaveConfig::default(),
        );
        Harness { primary, fallback, clock, controller }
    }

    #[test]
    fn test_rapid_changes_coalesce_into_one_write_of_the_last_value() {
        let mut h = harness();

        h.controller.schedule(&vec![1]);
        h.clock.advance_millis(300);
        h.controller.poll();
        h.controller.schedule(&vec![1, 2]);
        h.clock.advance_millis(300);
        h.controller.poll();
        h.controller.schedule(&vec![1, 2, 3]);
        assert_eq!(h.primary.write_count(), 0);
        assert_eq!(h.controller.status(), &SaveStatus::Pending);

        h.clock.advance_millis(999);
        h.controller.poll();
        assert_eq!(h.primary.write_count(), 0);

        h.clock.advance_millis(1);
        h.controller.poll();
        assert_eq!(h.primary.write_count(), 1);
        assert_eq!(h.primary.snapshot()["numbers"], "[1,2,3]");
        assert_eq!(h.controller.status(), &SaveStatus::Saved);
    }

    #[test]
    fn test_unchanged_value_is_not_written_twice() {
        let mut h = harness();

        h.controller.schedule(&vec![7]);
        h.clock.advance_millis(1000);
        h.controller.poll();
        h.controller.schedule(&vec![7]);
        h.clock.advance_millis(1000);
        h.controller.poll();

        assert_eq!(h.primary.write_count(), 1);
        assert!(!h.controller.has_pending());
    }

    #[test]
    fn test_primed_value_is_not_rewritten() {
        let mut h = harness();
        h.controller.prime(&vec![4, 5]);

        h.controller.schedule(&vec![4, 5]);
        h.clock.advance_millis(5000);
        h.controller.poll();

        assert_eq!(h.primary.write_count(), 0);
    }

    #[test]
    fn test_exhausted_retries_park_value_in_fallback_and_fire_callback_once() {
        let mut h = harness();
        h.primary.set_fail_writes(true);
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        h.controller.on_error(move |failure| {
            assert_eq!(failure.key, "numbers");
            assert_eq!(failure.attempts, 4);
            seen.set(seen.get() + 1);
        });

        h.controller.schedule(&vec![9]);
        h.clock.advance_millis(1000);
        h.controller.poll();
        assert_eq!(h.controller.status(), &SaveStatus::Retrying { attempt: 1 });

        for attempt in 2..=3 {
            h.clock.advance_millis(2000);
            h.controller.poll();
            assert_eq!(h.controller.status(), &SaveStatus::Retrying { attempt });
        }
        assert!(h.fallback.snapshot().is_empty());

        h.clock.advance_millis(2000);
        h.controller.poll();
        assert_eq!(h.controller.status(), &SaveStatus::Idle);
        assert_eq!(calls.get(), 1);

        let raw = &h.fallback.snapshot()["fallback:numbers"];
        let record: FallbackRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.value, serde_json::json!([9]));
        assert!(!record.error.is_empty());
        // One debounce plus three retry intervals after midnight
        assert_eq!(record.failed_at.to_rfc3339(), "2024-01-01T00:00:07+00:00");

        // Nothing left to retry
        h.clock.advance_millis(10_000);
        h.controller.poll();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_new_change_while_retrying_replaces_value_and_resets_attempts() {
        let mut h = harness();
        h.primary.set_fail_writes(true);

        h.controller.schedule(&vec![1]);
        h.clock.advance_millis(1000);
        h.controller.poll();
        h.clock.advance_millis(2000);
        h.controller.poll();
        assert_eq!(h.controller.status(), &SaveStatus::Retrying { attempt: 2 });

        h.primary.set_fail_writes(false);
        h.controller.schedule(&vec![2]);
        assert_eq!(h.controller.status(), &SaveStatus::Pending);
        // The old retry deadline no longer applies
        h.clock.advance_millis(999);
        h.controller.poll();
        assert_eq!(h.primary.write_count(), 0);

        h.clock.advance_millis(1);
        h.controller.poll();
        assert_eq!(h.primary.snapshot()["numbers"], "[2]");
    }

    #[test]
    fn test_flush_writes_pending_value_immediately() {
        let mut h = harness();
        h.controller.schedule(&vec![3]);
        h.controller.flush();

        assert_eq!(h.primary.snapshot()["numbers"], "[3]");
        assert_eq!(h.controller.status(), &SaveStatus::Saved);
    }

    #[test]
    fn test_drop_flushes_pending_value() {
        let h = harness();
        let primary = h.primary.clone();
        let mut controller = h.controller;
        controller.schedule(&vec![8]);
        drop(controller);

        assert_eq!(primary.snapshot()["numbers"], "[8]");
    }

    #[test]
    fn test_drop_flush_reaches_other_sessions() {
        let h = harness();
        let shared = Rc::new(KeyedStore::new(h.primary.clone()));
        let mut controller = h.controller.with_sync(KeySync::new("numbers", "leaving"));
        controller.schedule(&vec![8]);
        drop(controller);

        let mut other = KeySync::new("numbers", "staying");
        assert_eq!(other.poll::<Vec<u32>>(&shared), Some(vec![8]));
    }
}
