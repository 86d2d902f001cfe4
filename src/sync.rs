//! Cross-session change notification.
//!
//! Every session that saves a collection also writes a mirror entry
//! (`<key>:sync`) tagged with its session id. Other sessions poll the mirror
//! and adopt values written by someone else. Last observed write wins.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::{KeyedStore, StoreError};

#[derive(Debug, Serialize, Deserialize)]
struct SyncEnvelope {
    writer: String,
    revision: i64,
    value: serde_json::Value,
}

pub struct KeySync {
    mirror_key: String,
    writer_id: String,
    last_revision: i64,
    /// Raw mirror contents last seen, so an unchanged mirror is not re-parsed
    last_raw: Option<String>,
    /// JSON of the value this session currently holds
    last_known: Option<String>,
}

impl KeySync {
    pub fn new(key: &str, writer_id: impl Into<String>) -> Self {
        Self {
            mirror_key: Self::mirror_key(key),
            writer_id: writer_id.into(),
            last_revision: 0,
            last_raw: None,
            last_known: None,
        }
    }

    pub fn mirror_key(key: &str) -> String {
        format!("{}:sync", key)
    }

    /// Record the value this session holds without announcing it
    pub fn note_local(&mut self, json: &str) {
        self.last_known = Some(json.to_string());
    }

    /// Treat whatever the mirror holds right now as already seen.
    ///
    /// Called once after loading, when the primary value is at least as new
    /// as the mirror; only later writes count as foreign changes.
    pub fn catch_up(&mut self, store: &KeyedStore) {
        let Some(raw) = store.read_raw(&self.mirror_key) else {
            return;
        };
        if let Ok(envelope) = serde_json::from_str::<SyncEnvelope>(&raw) {
            self.last_revision = self.last_revision.max(envelope.revision);
        }
        self.last_raw = Some(raw);
    }

    /// Announce a freshly persisted value to other sessions
    pub fn publish(
        &mut self,
        store: &KeyedStore,
        json: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let value = match serde_json::from_str(json) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %self.mirror_key, error = %e, "Refusing to publish non-JSON value");
                return Ok(());
            }
        };
        let revision = at.timestamp_millis().max(self.last_revision + 1);
        let envelope = SyncEnvelope {
            writer: self.writer_id.clone(),
            revision,
            value,
        };
        let raw = KeyedStore::to_json(&self.mirror_key, &envelope)?;
        store.write_raw(&self.mirror_key, &raw)?;

        self.last_revision = revision;
        self.last_raw = Some(raw);
        self.last_known = Some(json.to_string());
        Ok(())
    }

    /// Check the mirror for a value written by another session
    pub fn poll<T: DeserializeOwned>(&mut self, store: &KeyedStore) -> Option<T> {
        let raw = store.read_raw(&self.mirror_key)?;
        if self.last_raw.as_deref() == Some(raw.as_str()) {
            return None;
        }
        self.last_raw = Some(raw.clone());

        let envelope: SyncEnvelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(key = %self.mirror_key, error = %e, "Dropping malformed sync entry");
                return None;
            }
        };
        self.last_revision = self.last_revision.max(envelope.revision);
        if envelope.writer == self.writer_id {
            return None;
        }

        let json = envelope.value.to_string();
        if self.last_known.as_deref() == Some(json.as_str()) {
            return None;
        }

        match serde_json::from_value(envelope.value) {
            Ok(value) => {
                debug!(key = %self.mirror_key, writer = %envelope.writer, "Adopting foreign update");
                self.last_known = Some(json);
                Some(value)
            }
            Err(e) => {
                warn!(key = %self.mirror_key, error = %e, "Dropping foreign value of unexpected shape");
                None
            }
        }
    }
}
