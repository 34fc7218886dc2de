//! The coordinator
//!
//! Keeps every open page's local cache reasonably fresh so the
//! synchronous early-inject decision always has something recent to read.
//! Sweeps run on settings changes, on page lifecycle events, on install,
//! and on browser startup. Every push is best-effort and per-page
//! isolated: one rejecting page never aborts a sweep, and nothing is
//! retried or surfaced to the user.

use qv_core::cache::CacheRefresh;
use qv_core::classify;
use qv_core::settings::{KEY_COLLAB_OPTOUT_ACK, KEY_CUSTOM_SITES, KEY_ENABLED};

use crate::host::{PageEvent, PageHost, PageRef};
use crate::store::{read_settings, ChangeEvent, ChangeStream, SettingsStore, StoreError};

/// URLs the open-a-page messages resolve to.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// External collaboration-platform activity-controls page.
    pub external_settings_url: String,
    /// Bundled instructions page.
    pub instructions_url: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            external_settings_url:
                "https://myaccount.google.com/activitycontrols/docsactivity".into(),
            instructions_url: "welcome.html#google-instructions".into(),
        }
    }
}

/// Outcome of a full refresh sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub pushed: usize,
    pub restricted: usize,
    pub failed: usize,
}

/// Why the extension lifecycle handler fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallReason {
    Install,
    Update,
}

// =============================================================================
// Coordinator
// =============================================================================

/// The privileged orchestrator. Owns the durable store seam and the
/// browser page surface; contains no per-page state of its own.
pub struct Coordinator<S, H> {
    store: S,
    host: H,
    config: CoordinatorConfig,
}

impl<S: SettingsStore, H: PageHost> Coordinator<S, H> {
    pub fn new(store: S, host: H) -> Self {
        Self::with_config(store, host, CoordinatorConfig::default())
    }

    pub fn with_config(store: S, host: H, config: CoordinatorConfig) -> Self {
        Self { store, host, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Build the push payload from the durable store.
    async fn snapshot(&self) -> Result<CacheRefresh, StoreError> {
        let settings = read_settings(&self.store).await?;
        Ok(CacheRefresh {
            sites: settings.custom_sites,
            extension_enabled: settings.extension_enabled,
        })
    }

    /// Push a fresh payload into every open, non-restricted page.
    ///
    /// The settings are read once per sweep; per-page failures are
    /// logged, counted, and skipped. A store failure makes the whole
    /// sweep a no-op.
    pub async fn refresh_all_pages(&self) -> SweepStats {
        let refresh = match self.snapshot().await {
            Ok(refresh) => refresh,
            Err(err) => {
                log::warn!("refresh sweep skipped: {err}");
                return SweepStats::default();
            }
        };

        let mut stats = SweepStats::default();
        for page in self.host.list_pages().await {
            if page.is_restricted() {
                stats.restricted += 1;
                continue;
            }
            match self.host.push_refresh(&page, &refresh).await {
                Ok(()) => stats.pushed += 1,
                Err(err) => {
                    log::debug!("push to page {} skipped: {err}", page.id);
                    stats.failed += 1;
                }
            }
        }

        log::debug!(
            "refresh sweep: {} pushed, {} restricted, {} failed",
            stats.pushed,
            stats.restricted,
            stats.failed
        );
        stats
    }

    /// Defensive single-page refresh. The skip-if-unchanged-and-fresh
    /// check runs page-side, so this pushes unconditionally.
    pub async fn ensure_page(&self, page: &PageRef) -> bool {
        if page.is_restricted() {
            return false;
        }
        let refresh = match self.snapshot().await {
            Ok(refresh) => refresh,
            Err(err) => {
                log::warn!("ensure skipped for page {}: {err}", page.id);
                return false;
            }
        };
        match self.host.push_refresh(page, &refresh).await {
            Ok(()) => true,
            Err(err) => {
                log::debug!("ensure push to page {} skipped: {err}", page.id);
                false
            }
        }
    }

    /// React to a durable-store change. Only the enabled flag and the
    /// pattern list matter; anything else (including the opt-out
    /// acknowledgment) leaves page caches untouched.
    pub async fn on_change(&self, event: &ChangeEvent) -> Option<SweepStats> {
        match event.key.as_str() {
            KEY_ENABLED | KEY_CUSTOM_SITES => Some(self.refresh_all_pages().await),
            _ => None,
        }
    }

    /// Drain the change subscription until the store side closes it.
    pub async fn run_change_loop(&self, stream: &mut ChangeStream) {
        while let Some(event) = stream.recv().await {
            self.on_change(&event).await;
        }
    }

    /// React to a page lifecycle event. Navigation-start is the ordering-
    /// critical push (it must race the new document's scripts and win
    /// when the platform allows); the other two bound staleness in case
    /// a change event was missed.
    pub async fn on_page_event(&self, page: &PageRef, event: PageEvent) {
        match event {
            PageEvent::NavigationStarted
            | PageEvent::NavigationComplete
            | PageEvent::Activated => {
                self.ensure_page(page).await;
            }
        }
    }

    /// Authoritative classification against the durable store (not the
    /// page cache). Answers the `checkIfProtected` query; a store failure
    /// reads as unprotected.
    pub async fn is_protected_site(&self, url: &str) -> bool {
        match read_settings(&self.store).await {
            Ok(settings) => classify::is_in_scope(
                url,
                settings.extension_enabled,
                &settings.custom_sites,
            ),
            Err(err) => {
                log::warn!("protection query degraded: {err}");
                false
            }
        }
    }

    /// Extension lifecycle: first install seeds the defaults, then every
    /// install/update refreshes all pages.
    pub async fn on_installed(&self, reason: InstallReason) {
        if reason == InstallReason::Install {
            let defaults = std::collections::HashMap::from([
                (KEY_ENABLED.to_string(), serde_json::json!(true)),
                (KEY_CUSTOM_SITES.to_string(), serde_json::json!([])),
                (KEY_COLLAB_OPTOUT_ACK.to_string(), serde_json::json!(false)),
            ]);
            if let Err(err) = self.store.set(defaults).await {
                log::warn!("failed to seed default settings: {err}");
            }
        }
        self.refresh_all_pages().await;
    }

    /// Browser startup: page caches may be arbitrarily old.
    pub async fn on_startup(&self) {
        self.refresh_all_pages().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::FakeHost;
    use crate::store::MemorySettingsStore;
    use serde_json::json;
    use std::collections::HashMap;

    fn pages() -> Vec<PageRef> {
        vec![
            PageRef::new(1, "https://mycourse.instructure.com/"),
            PageRef::new(2, "https://example.com/"),
            PageRef::new(3, "chrome://settings"),
        ]
    }

    fn coordinator() -> Coordinator<MemorySettingsStore, FakeHost> {
        Coordinator::new(MemorySettingsStore::new(), FakeHost::new(pages()))
    }

    #[tokio::test]
    async fn sweep_skips_restricted_pages() {
        let coordinator = coordinator();
        let stats = coordinator.refresh_all_pages().await;
        assert_eq!(stats, SweepStats { pushed: 2, restricted: 1, failed: 0 });
        assert_eq!(coordinator.host().pushes_to(3), 0);
    }

    #[tokio::test]
    async fn sweep_isolates_per_page_failures() {
        let coordinator = coordinator();
        coordinator.host().rejecting.lock().unwrap().push(1);

        let stats = coordinator.refresh_all_pages().await;
        assert_eq!(stats, SweepStats { pushed: 1, restricted: 1, failed: 1 });
        // The rejecting page did not stop the other one.
        assert_eq!(coordinator.host().pushes_to(2), 1);
    }

    #[tokio::test]
    async fn sweep_payload_mirrors_settings() {
        let coordinator = coordinator();
        coordinator
            .store()
            .set(HashMap::from([
                (KEY_CUSTOM_SITES.to_string(), json!(["example.com"])),
                (KEY_ENABLED.to_string(), json!(false)),
            ]))
            .await
            .unwrap();

        coordinator.refresh_all_pages().await;
        let pushes = coordinator.host().pushes.lock().unwrap();
        let (_, refresh) = &pushes[0];
        assert_eq!(refresh.sites, vec!["example.com"]);
        assert!(!refresh.extension_enabled);
    }

    #[tokio::test]
    async fn store_failure_makes_sweep_a_noop() {
        let coordinator = coordinator();
        coordinator.store().poison();
        let stats = coordinator.refresh_all_pages().await;
        assert_eq!(stats, SweepStats::default());
        assert!(coordinator.host().pushes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_relevant_keys_trigger_resweep() {
        let coordinator = coordinator();

        let event = ChangeEvent {
            key: KEY_CUSTOM_SITES.to_string(),
            old_value: None,
            new_value: Some(json!(["example.com"])),
        };
        assert!(coordinator.on_change(&event).await.is_some());

        let irrelevant = ChangeEvent {
            key: KEY_COLLAB_OPTOUT_ACK.to_string(),
            old_value: None,
            new_value: Some(json!(true)),
        };
        assert!(coordinator.on_change(&irrelevant).await.is_none());
    }

    #[tokio::test]
    async fn change_loop_drains_synthetic_stream() {
        let coordinator = coordinator();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        for key in [KEY_ENABLED, KEY_COLLAB_OPTOUT_ACK, KEY_CUSTOM_SITES] {
            tx.send(ChangeEvent {
                key: key.to_string(),
                old_value: None,
                new_value: Some(json!(null)),
            })
            .unwrap();
        }
        drop(tx);

        coordinator.run_change_loop(&mut rx).await;
        // Two relevant changes, two pushable pages each.
        assert_eq!(coordinator.host().pushes.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn page_events_push_defensively() {
        let coordinator = coordinator();
        let page = PageRef::new(2, "https://example.com/");

        coordinator.on_page_event(&page, PageEvent::NavigationStarted).await;
        coordinator.on_page_event(&page, PageEvent::NavigationComplete).await;
        coordinator.on_page_event(&page, PageEvent::Activated).await;
        assert_eq!(coordinator.host().pushes_to(2), 3);

        let restricted = PageRef::new(3, "chrome://settings");
        coordinator.on_page_event(&restricted, PageEvent::Activated).await;
        assert_eq!(coordinator.host().pushes_to(3), 0);
    }

    #[tokio::test]
    async fn protection_query_uses_durable_store() {
        let coordinator = coordinator();
        assert!(coordinator.is_protected_site("https://canvas.school.edu/").await);
        assert!(!coordinator.is_protected_site("https://example.com/").await);

        coordinator
            .store()
            .set(HashMap::from([(
                KEY_CUSTOM_SITES.to_string(),
                json!(["example.com"]),
            )]))
            .await
            .unwrap();
        assert!(coordinator.is_protected_site("https://example.com/").await);

        coordinator
            .store()
            .set(HashMap::from([(KEY_ENABLED.to_string(), json!(false))]))
            .await
            .unwrap();
        assert!(!coordinator.is_protected_site("https://canvas.school.edu/").await);
    }

    #[tokio::test]
    async fn first_install_seeds_defaults_and_sweeps() {
        let coordinator = coordinator();
        coordinator.on_installed(InstallReason::Install).await;

        let settings = read_settings(coordinator.store()).await.unwrap();
        assert_eq!(settings, qv_core::Settings::default());
        assert_eq!(coordinator.host().pushes.lock().unwrap().len(), 2);

        coordinator.on_installed(InstallReason::Update).await;
        assert_eq!(coordinator.host().pushes.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn startup_sweeps() {
        let coordinator = coordinator();
        coordinator.on_startup().await;
        assert_eq!(coordinator.host().pushes.lock().unwrap().len(), 2);
    }
}
