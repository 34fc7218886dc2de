//! Page-local settings cache
//!
//! Every page context keeps a best-effort mirror of the two pieces of
//! durable state the synchronous decision path needs: the user pattern
//! list and the enabled flag. The mirror lives in the page's own storage
//! origin under two JSON keys, each with an embedded epoch-ms timestamp.
//!
//! Freshness is two-tier. The short window (60 s) only gates the
//! coordinator's re-push optimization: a page whose cache is young and
//! content-identical is skipped. The long window (24 h) is the safety
//! bound: past it the decision path refuses to trust the cache at all, so
//! a stale "protect" verdict cannot outlive a user who turned the
//! extension off while the page was dormant.

use serde::{Deserialize, Serialize};

// =============================================================================
// Keys & Windows
// =============================================================================

/// Storage key for the mirrored pattern list.
pub const CACHE_KEY_SITES: &str = "quietview_sites";

/// Storage key for the mirrored enabled flag.
pub const CACHE_KEY_SETTINGS: &str = "quietview_settings";

/// Short window: coordinator skip-if-unchanged re-push optimization.
pub const REFRESH_WINDOW_MS: u64 = 60_000;

/// Long window: hard expiry past which the page refuses the cache.
pub const TRUST_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

// =============================================================================
// Errors
// =============================================================================

/// Page-storage failure. Callers at the page boundary swallow these;
/// breaking the host page is worse than missing a protection opportunity.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("page storage unavailable: {0}")]
    Unavailable(String),
}

// =============================================================================
// Page Store
// =============================================================================

/// Synchronous string KV confined to one page context. Implemented over
/// browser `localStorage` in the bindings and over a hash map in tests.
/// No locking: a page context has no concurrent writers.
pub trait PageStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
    fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// In-memory [`PageStore`] for tests and tooling. `poison()` makes every
/// subsequent call fail, to exercise the degraded paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: std::cell::RefCell<std::collections::HashMap<String, String>>,
    poisoned: std::cell::Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poison(&self) {
        self.poisoned.set(true);
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.poisoned.get() {
            return Err(CacheError::Unavailable("poisoned".into()));
        }
        Ok(())
    }
}

impl PageStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check()?;
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.check()?;
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.check()?;
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// Mirrored pattern list with its write stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitesPayload {
    pub sites: Vec<String>,
    pub timestamp: u64,
}

/// Mirrored enabled flag with its write stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPayload {
    pub extension_enabled: bool,
    pub timestamp: u64,
}

/// The coordinator-to-page push. Timestamps are stamped page-side at apply
/// time, so cross-context clock skew never poisons freshness checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRefresh {
    pub sites: Vec<String>,
    pub extension_enabled: bool,
}

/// What a refresh push did on the page side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Both payloads rewritten (or a write was attempted; storage errors
    /// are swallowed).
    Written,
    /// Cache was young and content-identical; nothing written.
    Fresh,
}

// =============================================================================
// Page Cache
// =============================================================================

/// View over one page's cache entries.
pub struct PageCache<'a, S: PageStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: PageStore + ?Sized> PageCache<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Read the sites payload if it is younger than `max_age_ms`.
    ///
    /// A payload past the hard expiry ([`TRUST_WINDOW_MS`]) is actively
    /// deleted, not merely ignored: nothing else would ever clear it if
    /// the page stops receiving pushes. A payload that only missed a
    /// shorter window stays put. Parse failures and storage errors read
    /// as absent.
    pub fn read_sites_if_fresh(&self, now_ms: u64, max_age_ms: u64) -> Option<SitesPayload> {
        let raw = self.store.get(CACHE_KEY_SITES).ok().flatten()?;
        let payload: SitesPayload = match serde_json::from_str(&raw) {
            Ok(payload) => payload,
            Err(err) => {
                log::warn!("malformed sites payload: {err}");
                return None;
            }
        };

        let age_ms = now_ms.saturating_sub(payload.timestamp);
        if age_ms > max_age_ms {
            if age_ms > TRUST_WINDOW_MS {
                if let Err(err) = self.store.remove(CACHE_KEY_SITES) {
                    log::debug!("failed to drop expired sites payload: {err}");
                }
            }
            return None;
        }

        Some(payload)
    }

    /// Read the settings payload if it is younger than `max_age_ms`.
    /// Expired settings read as absent but are left in place; the next
    /// refresh overwrites them.
    pub fn read_settings_if_fresh(&self, now_ms: u64, max_age_ms: u64) -> Option<SettingsPayload> {
        let raw = self.store.get(CACHE_KEY_SETTINGS).ok().flatten()?;
        let payload: SettingsPayload = match serde_json::from_str(&raw) {
            Ok(payload) => payload,
            Err(err) => {
                log::warn!("malformed settings payload: {err}");
                return None;
            }
        };

        if now_ms.saturating_sub(payload.timestamp) > max_age_ms {
            return None;
        }

        Some(payload)
    }

    /// Write the sites payload. A write whose stamp would move the stored
    /// timestamp backward is dropped: refreshes race navigation pushes and
    /// the cache must stay monotonically non-decreasing.
    pub fn write_sites(&self, payload: &SitesPayload) -> Result<(), CacheError> {
        if let Some(existing) = self.store.get(CACHE_KEY_SITES).ok().flatten() {
            if let Ok(existing) = serde_json::from_str::<SitesPayload>(&existing) {
                if existing.timestamp > payload.timestamp {
                    log::debug!(
                        "dropping backdated sites payload ({} < {})",
                        payload.timestamp,
                        existing.timestamp
                    );
                    return Ok(());
                }
            }
        }
        let raw = serde_json::to_string(payload)
            .map_err(|err| CacheError::Unavailable(err.to_string()))?;
        self.store.set(CACHE_KEY_SITES, &raw)
    }

    /// Write the settings payload, with the same monotonicity guard.
    pub fn write_settings(&self, payload: &SettingsPayload) -> Result<(), CacheError> {
        if let Some(existing) = self.store.get(CACHE_KEY_SETTINGS).ok().flatten() {
            if let Ok(existing) = serde_json::from_str::<SettingsPayload>(&existing) {
                if existing.timestamp > payload.timestamp {
                    log::debug!(
                        "dropping backdated settings payload ({} < {})",
                        payload.timestamp,
                        existing.timestamp
                    );
                    return Ok(());
                }
            }
        }
        let raw = serde_json::to_string(payload)
            .map_err(|err| CacheError::Unavailable(err.to_string()))?;
        self.store.set(CACHE_KEY_SETTINGS, &raw)
    }
}

// =============================================================================
// Refresh Applier
// =============================================================================

/// Apply a coordinator push to this page's cache.
///
/// If both stored payloads are younger than [`REFRESH_WINDOW_MS`] and
/// content-identical to the push, nothing is written. Otherwise both
/// payloads are rewritten with a fresh page-local stamp. Storage failures
/// are swallowed; this runs inside page load and must never break it.
pub fn apply_refresh<S: PageStore + ?Sized>(
    store: &S,
    refresh: &CacheRefresh,
    now_ms: u64,
) -> RefreshOutcome {
    let cache = PageCache::new(store);

    let fresh_sites = cache.read_sites_if_fresh(now_ms, REFRESH_WINDOW_MS);
    let fresh_settings = cache.read_settings_if_fresh(now_ms, REFRESH_WINDOW_MS);
    if let (Some(sites), Some(settings)) = (fresh_sites, fresh_settings) {
        if sites.sites == refresh.sites && settings.extension_enabled == refresh.extension_enabled {
            return RefreshOutcome::Fresh;
        }
    }

    if let Err(err) = cache.write_sites(&SitesPayload {
        sites: refresh.sites.clone(),
        timestamp: now_ms,
    }) {
        log::debug!("sites refresh skipped: {err}");
    }
    if let Err(err) = cache.write_settings(&SettingsPayload {
        extension_enabled: refresh.extension_enabled,
        timestamp: now_ms,
    }) {
        log::debug!("settings refresh skipped: {err}");
    }

    RefreshOutcome::Written
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refresh(sites: &[&str], enabled: bool) -> CacheRefresh {
        CacheRefresh {
            sites: sites.iter().map(|s| s.to_string()).collect(),
            extension_enabled: enabled,
        }
    }

    #[test]
    fn identical_push_within_window_is_noop() {
        let store = MemoryStore::new();
        let push = refresh(&["example.com"], true);

        assert_eq!(apply_refresh(&store, &push, 1_000), RefreshOutcome::Written);
        // Same content 30s later: skipped.
        assert_eq!(apply_refresh(&store, &push, 31_000), RefreshOutcome::Fresh);
        // Stamp unchanged by the skip.
        let cache = PageCache::new(&store);
        let sites = cache.read_sites_if_fresh(31_000, TRUST_WINDOW_MS).unwrap();
        assert_eq!(sites.timestamp, 1_000);
    }

    #[test]
    fn changed_content_rewrites_within_window() {
        let store = MemoryStore::new();
        apply_refresh(&store, &refresh(&["example.com"], true), 1_000);
        let out = apply_refresh(&store, &refresh(&["example.com", "other.org"], true), 2_000);
        assert_eq!(out, RefreshOutcome::Written);

        let cache = PageCache::new(&store);
        let sites = cache.read_sites_if_fresh(2_000, TRUST_WINDOW_MS).unwrap();
        assert_eq!(sites.sites, vec!["example.com", "other.org"]);
        assert_eq!(sites.timestamp, 2_000);
    }

    #[test]
    fn toggled_flag_rewrites_within_window() {
        let store = MemoryStore::new();
        apply_refresh(&store, &refresh(&[], true), 1_000);
        assert_eq!(
            apply_refresh(&store, &refresh(&[], false), 2_000),
            RefreshOutcome::Written
        );
        let cache = PageCache::new(&store);
        let settings = cache.read_settings_if_fresh(2_000, TRUST_WINDOW_MS).unwrap();
        assert!(!settings.extension_enabled);
    }

    #[test]
    fn stale_identical_push_rewrites() {
        let store = MemoryStore::new();
        let push = refresh(&["example.com"], true);
        apply_refresh(&store, &push, 1_000);
        // Past the short window the skip no longer applies.
        let out = apply_refresh(&store, &push, 1_000 + REFRESH_WINDOW_MS + 1);
        assert_eq!(out, RefreshOutcome::Written);
    }

    #[test]
    fn short_window_miss_leaves_payload_in_place() {
        let store = MemoryStore::new();
        let cache = PageCache::new(&store);
        cache
            .write_sites(&SitesPayload { sites: vec!["a.com".into()], timestamp: 1_000 })
            .unwrap();

        // Misses the refresh window but is still inside the trust window:
        // absent for this probe, not deleted.
        assert!(cache.read_sites_if_fresh(70_000, REFRESH_WINDOW_MS).is_none());
        assert!(store.get(CACHE_KEY_SITES).unwrap().is_some());
        assert!(cache.read_sites_if_fresh(70_000, TRUST_WINDOW_MS).is_some());
    }

    #[test]
    fn expired_sites_payload_is_deleted_on_read() {
        let store = MemoryStore::new();
        apply_refresh(&store, &refresh(&["example.com"], true), 1_000);

        let cache = PageCache::new(&store);
        let later = 1_000 + TRUST_WINDOW_MS + 1;
        assert!(cache.read_sites_if_fresh(later, TRUST_WINDOW_MS).is_none());
        // Actively removed, not just ignored.
        assert!(store.get(CACHE_KEY_SITES).unwrap().is_none());
    }

    #[test]
    fn expired_settings_payload_reads_absent_but_stays() {
        let store = MemoryStore::new();
        apply_refresh(&store, &refresh(&[], false), 1_000);

        let cache = PageCache::new(&store);
        let later = 1_000 + TRUST_WINDOW_MS + 1;
        assert!(cache.read_settings_if_fresh(later, TRUST_WINDOW_MS).is_none());
        assert!(store.get(CACHE_KEY_SETTINGS).unwrap().is_some());
    }

    #[test]
    fn malformed_payload_reads_absent() {
        let store = MemoryStore::new();
        store.set(CACHE_KEY_SITES, "{not json").unwrap();
        store.set(CACHE_KEY_SETTINGS, r#"{"sites":[]}"#).unwrap();

        let cache = PageCache::new(&store);
        assert!(cache.read_sites_if_fresh(0, TRUST_WINDOW_MS).is_none());
        // Missing timestamp field fails the parse.
        assert!(cache.read_settings_if_fresh(0, TRUST_WINDOW_MS).is_none());
    }

    #[test]
    fn backdated_write_is_dropped() {
        let store = MemoryStore::new();
        let cache = PageCache::new(&store);
        cache
            .write_sites(&SitesPayload { sites: vec!["a.com".into()], timestamp: 5_000 })
            .unwrap();
        cache
            .write_sites(&SitesPayload { sites: vec!["b.com".into()], timestamp: 4_000 })
            .unwrap();

        let sites = cache.read_sites_if_fresh(5_000, TRUST_WINDOW_MS).unwrap();
        assert_eq!(sites.sites, vec!["a.com"]);
        assert_eq!(sites.timestamp, 5_000);
    }

    #[test]
    fn unavailable_store_degrades_silently() {
        let store = MemoryStore::new();
        store.poison();
        // Apply swallows the failure; read paths report absent.
        assert_eq!(
            apply_refresh(&store, &refresh(&["x.com"], true), 1_000),
            RefreshOutcome::Written
        );
        let cache = PageCache::new(&store);
        assert!(cache.read_sites_if_fresh(1_000, TRUST_WINDOW_MS).is_none());
        assert!(cache.read_settings_if_fresh(1_000, TRUST_WINDOW_MS).is_none());
    }
}
