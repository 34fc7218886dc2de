//! Page-world platform adapters
//!
//! The core engine is platform-free; this module supplies its two seams
//! for the browser page world: `localStorage` as the page store and
//! `Date.now()` as the clock.

use qv_core::cache::{CacheError, PageStore};
use qv_core::clock::Clock;

/// `localStorage`-backed [`PageStore`], scoped to this page's storage
/// origin. Acquisition fails on pages that deny storage access (sandboxed
/// frames, some privacy modes); callers degrade to an empty cache.
pub struct LocalStorageStore {
    storage: web_sys::Storage,
}

impl LocalStorageStore {
    pub fn from_window() -> Option<Self> {
        let storage = web_sys::window()?.local_storage().ok().flatten()?;
        Some(Self { storage })
    }
}

impl PageStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.storage
            .get_item(key)
            .map_err(|err| CacheError::Unavailable(format!("{err:?}")))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.storage
            .set_item(key, value)
            .map_err(|err| CacheError::Unavailable(format!("{err:?}")))
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.storage
            .remove_item(key)
            .map_err(|err| CacheError::Unavailable(format!("{err:?}")))
    }
}

/// `Date.now()`-backed clock; `SystemTime` is unavailable on
/// `wasm32-unknown-unknown`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsClock;

impl Clock for JsClock {
    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }
}
