//! Coordinator message surface
//!
//! UI collaborators (popup, options page) talk to the coordinator through
//! an explicit command protocol instead of ambient callbacks. Delivery is
//! best-effort; only `checkIfProtected` carries a response, and callers
//! that want it must opt in by awaiting one.

use serde::{Deserialize, Serialize};

use crate::coordinator::Coordinator;
use crate::host::PageHost;
use crate::store::{SettingsStore, StoreError};
use qv_core::settings::KEY_ENABLED;

/// A command from a UI collaborator. Wire form is `{"action": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Open the external collaboration-platform activity-controls page.
    OpenExternalSettings,
    /// Open the bundled instructions page.
    OpenInstructionsPage,
    /// Settings changed out-of-band; re-sweep all pages.
    UpdateProtection,
    /// Flip the kill switch, then re-sweep.
    ToggleExtension { enabled: bool },
    /// Is this URL currently in scope for protection?
    CheckIfProtected { url: String },
}

/// Response to [`Request::CheckIfProtected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionStatus {
    pub is_protected: bool,
}

impl<S: SettingsStore, H: PageHost> Coordinator<S, H> {
    /// Handle one command. Returns a response only for the query request;
    /// everything else is fire-and-forget. Internal failures degrade
    /// silently (a failed toggle write still triggers the sweep, which
    /// then no-ops on the store error).
    pub async fn handle(&self, request: Request) -> Option<ProtectionStatus> {
        match request {
            Request::OpenExternalSettings => {
                let url = self.config().external_settings_url.clone();
                if let Err(err) = self.host().open_page(&url).await {
                    log::debug!("open external settings failed: {err}");
                }
                None
            }
            Request::OpenInstructionsPage => {
                let url = self.config().instructions_url.clone();
                if let Err(err) = self.host().open_page(&url).await {
                    log::debug!("open instructions failed: {err}");
                }
                None
            }
            Request::UpdateProtection => {
                self.refresh_all_pages().await;
                None
            }
            Request::ToggleExtension { enabled } => {
                let patch = std::collections::HashMap::from([(
                    KEY_ENABLED.to_string(),
                    serde_json::json!(enabled),
                )]);
                if let Err(err @ StoreError::Unavailable(_)) = self.store().set(patch).await {
                    log::warn!("toggle write failed: {err}");
                }
                self.refresh_all_pages().await;
                None
            }
            Request::CheckIfProtected { url } => Some(ProtectionStatus {
                is_protected: self.is_protected_site(&url).await,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FakeHost, PageRef};
    use crate::store::{read_settings, MemorySettingsStore};
    use serde_json::json;

    fn coordinator() -> Coordinator<MemorySettingsStore, FakeHost> {
        Coordinator::new(
            MemorySettingsStore::new(),
            FakeHost::new(vec![PageRef::new(1, "https://example.com/")]),
        )
    }

    #[test]
    fn wire_form_round_trips() {
        let toggle: Request =
            serde_json::from_value(json!({"action": "toggleExtension", "enabled": false})).unwrap();
        assert_eq!(toggle, Request::ToggleExtension { enabled: false });

        let check: Request = serde_json::from_value(
            json!({"action": "checkIfProtected", "url": "https://x.com/"}),
        )
        .unwrap();
        assert_eq!(check, Request::CheckIfProtected { url: "https://x.com/".into() });

        assert_eq!(
            serde_json::to_value(Request::UpdateProtection).unwrap(),
            json!({"action": "updateProtection"})
        );
        assert_eq!(
            serde_json::to_value(ProtectionStatus { is_protected: true }).unwrap(),
            json!({"isProtected": true})
        );
    }

    #[tokio::test]
    async fn open_messages_route_to_host() {
        let coordinator = coordinator();
        assert!(coordinator.handle(Request::OpenExternalSettings).await.is_none());
        assert!(coordinator.handle(Request::OpenInstructionsPage).await.is_none());

        let opened = coordinator.host().opened.lock().unwrap();
        assert_eq!(opened.len(), 2);
        assert_eq!(opened[0], coordinator.config().external_settings_url);
        assert_eq!(opened[1], coordinator.config().instructions_url);
    }

    #[tokio::test]
    async fn update_protection_sweeps() {
        let coordinator = coordinator();
        coordinator.handle(Request::UpdateProtection).await;
        assert_eq!(coordinator.host().pushes_to(1), 1);
    }

    #[tokio::test]
    async fn toggle_writes_then_sweeps() {
        let coordinator = coordinator();
        coordinator
            .handle(Request::ToggleExtension { enabled: false })
            .await;

        let settings = read_settings(coordinator.store()).await.unwrap();
        assert!(!settings.extension_enabled);

        // The sweep that followed carries the new flag.
        let pushes = coordinator.host().pushes.lock().unwrap();
        assert!(!pushes[0].1.extension_enabled);
    }

    #[tokio::test]
    async fn check_if_protected_answers() {
        let coordinator = coordinator();
        let status = coordinator
            .handle(Request::CheckIfProtected {
                url: "https://docs.google.com/document/d/x".into(),
            })
            .await
            .unwrap();
        assert!(status.is_protected);

        let status = coordinator
            .handle(Request::CheckIfProtected { url: "https://example.com/".into() })
            .await
            .unwrap();
        assert!(!status.is_protected);
    }
}
