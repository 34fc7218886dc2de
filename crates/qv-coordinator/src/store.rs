//! Durable settings store abstraction
//!
//! The real store is platform-provided (browser sync storage): durable,
//! replicated across the user's devices, schemaless, last-writer-wins per
//! key, no cross-key transactions. This module pins down the narrow
//! interface the coordinator relies on: read-all-or-nothing per call, and
//! change events that fire eventually, at least once, after a successful
//! write.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::mpsc;

use qv_core::settings::{
    Settings, KEY_COLLAB_OPTOUT_ACK, KEY_CUSTOM_SITES, KEY_ENABLED,
};

/// Durable-store failure. Callers fall back to defaults and move on.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
}

/// One key's transition. Delivery is per-key write order; ordering across
/// keys is not guaranteed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Infinite, non-restartable stream of change events.
pub type ChangeStream = mpsc::UnboundedReceiver<ChangeEvent>;

/// The durable settings store seam.
pub trait SettingsStore {
    /// Read a partial snapshot of the requested keys. Missing keys are
    /// simply absent from the result.
    fn get(
        &self,
        keys: &[&str],
    ) -> impl std::future::Future<Output = Result<HashMap<String, Value>, StoreError>> + Send;

    /// Apply a partial patch, last-writer-wins per key.
    fn set(
        &self,
        patch: HashMap<String, Value>,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Register a listener for subsequent changes.
    fn subscribe(&self) -> ChangeStream;
}

// =============================================================================
// Settings Snapshot
// =============================================================================

/// Assemble a [`Settings`] from the durable store.
///
/// Each key is decoded independently so a torn read (one key updated, the
/// other not yet) or a malformed value degrades that one field to its
/// default instead of poisoning the whole snapshot. The enabled flag
/// defaults to true: only an explicit false disables protection.
pub async fn read_settings<S: SettingsStore>(store: &S) -> Result<Settings, StoreError> {
    let snapshot = store
        .get(&[KEY_ENABLED, KEY_CUSTOM_SITES, KEY_COLLAB_OPTOUT_ACK])
        .await?;

    let extension_enabled = snapshot
        .get(KEY_ENABLED)
        .and_then(Value::as_bool)
        .unwrap_or(true);

    let custom_sites = snapshot
        .get(KEY_CUSTOM_SITES)
        .cloned()
        .and_then(|value| serde_json::from_value::<Vec<String>>(value).ok())
        .unwrap_or_default();

    let has_disabled_google_tracking = snapshot
        .get(KEY_COLLAB_OPTOUT_ACK)
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(Settings {
        extension_enabled,
        custom_sites,
        has_disabled_google_tracking,
    })
}

// =============================================================================
// In-memory Store
// =============================================================================

/// In-process [`SettingsStore`] for tests and tooling. Mirrors the
/// platform store's semantics: per-key last-writer-wins, change events to
/// every live subscriber after each write.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    entries: Mutex<HashMap<String, Value>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ChangeEvent>>>,
    unavailable: std::sync::atomic::AtomicBool,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, to exercise degraded paths.
    pub fn poison(&self) {
        self.unavailable
            .store(true, std::sync::atomic::Ordering::Relaxed);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(StoreError::Unavailable("poisoned".into()));
        }
        Ok(())
    }

    fn publish(&self, event: ChangeEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl SettingsStore for MemorySettingsStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        self.check()?;
        let entries = self.entries.lock().unwrap();
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, patch: HashMap<String, Value>) -> Result<(), StoreError> {
        self.check()?;
        let events: Vec<ChangeEvent> = {
            let mut entries = self.entries.lock().unwrap();
            patch
                .into_iter()
                .map(|(key, value)| {
                    let old_value = entries.insert(key.clone(), value.clone());
                    ChangeEvent {
                        key,
                        old_value,
                        new_value: Some(value),
                    }
                })
                .collect()
        };
        for event in events {
            self.publish(event);
        }
        Ok(())
    }

    fn subscribe(&self) -> ChangeStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }
}
