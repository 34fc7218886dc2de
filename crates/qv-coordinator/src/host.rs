//! Page host abstraction
//!
//! The browser side of the coordinator: enumerating open pages, injecting
//! cache refreshes into a page's storage origin, opening URLs, and
//! delivering page lifecycle events. Injection is best-effort by design;
//! a page that rejects it (restricted scheme, closed tab, permission
//! denial) is skipped, never retried.

use std::sync::Mutex;

use qv_core::cache::CacheRefresh;
use qv_core::url::is_restricted_scheme;

/// Host page identifier (tab id).
pub type PageId = i32;

/// One open page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    pub id: PageId,
    pub url: String,
}

impl PageRef {
    pub fn new(id: PageId, url: impl Into<String>) -> Self {
        Self { id, url: url.into() }
    }

    /// Browser-internal pages never receive injected payloads.
    pub fn is_restricted(&self) -> bool {
        is_restricted_scheme(&self.url)
    }
}

/// Page lifecycle moments the coordinator reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    /// The URL is changing; the new document's scripts have not run yet.
    /// This is the critical injection point: a refresh pushed here wins
    /// the race against the early-inject decision.
    NavigationStarted,
    /// The new document finished loading.
    NavigationComplete,
    /// The page's tab became active.
    Activated,
}

/// A payload push into a page was rejected.
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error("page rejected injection: {0}")]
    Rejected(String),
    #[error("page is gone")]
    Closed,
}

/// The privileged browser surface the coordinator drives.
pub trait PageHost {
    /// Enumerate all open pages.
    fn list_pages(&self) -> impl std::future::Future<Output = Vec<PageRef>> + Send;

    /// Push a cache refresh into the page's storage origin. The freshness
    /// skip happens page-side; this call just delivers.
    fn push_refresh(
        &self,
        page: &PageRef,
        refresh: &CacheRefresh,
    ) -> impl std::future::Future<Output = Result<(), InjectError>> + Send;

    /// Open a URL in a new page (used by the open-a-page messages).
    fn open_page(&self, url: &str) -> impl std::future::Future<Output = Result<(), InjectError>> + Send;
}

// =============================================================================
// Test Host
// =============================================================================

/// Scriptable [`PageHost`] for tests: a fixed page list, a set of page
/// ids that reject injection, and a log of everything pushed or opened.
#[derive(Debug, Default)]
pub struct FakeHost {
    pub pages: Mutex<Vec<PageRef>>,
    pub rejecting: Mutex<Vec<PageId>>,
    pub pushes: Mutex<Vec<(PageId, CacheRefresh)>>,
    pub opened: Mutex<Vec<String>>,
}

impl FakeHost {
    pub fn new(pages: Vec<PageRef>) -> Self {
        Self {
            pages: Mutex::new(pages),
            ..Self::default()
        }
    }

    pub fn pushes_to(&self, id: PageId) -> usize {
        self.pushes
            .lock()
            .unwrap()
            .iter()
            .filter(|(page_id, _)| *page_id == id)
            .count()
    }
}

impl PageHost for FakeHost {
    async fn list_pages(&self) -> Vec<PageRef> {
        self.pages.lock().unwrap().clone()
    }

    async fn push_refresh(&self, page: &PageRef, refresh: &CacheRefresh) -> Result<(), InjectError> {
        if self.rejecting.lock().unwrap().contains(&page.id) {
            return Err(InjectError::Rejected(page.url.clone()));
        }
        self.pushes
            .lock()
            .unwrap()
            .push((page.id, refresh.clone()));
        Ok(())
    }

    async fn open_page(&self, url: &str) -> Result<(), InjectError> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}
