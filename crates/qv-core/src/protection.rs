//! Per-page protection controller
//!
//! The controller runs at the earliest executable moment of a page load,
//! strictly synchronously: it cannot await a permission check or a
//! message round-trip, because page scripts that read the visibility APIs
//! may run immediately after it. Everything it needs must already sit in
//! the page-local cache.
//!
//! State machine per page load: `Init -> Classifying -> {Protected,
//! Unprotected}`, terminal. The decision is computed once and never
//! recomputed within the page's lifetime; later cache pushes only affect
//! the next navigation.

use crate::cache::{PageCache, PageStore, TRUST_WINDOW_MS};
use crate::classify;
use crate::clock::Clock;
use crate::suppress::{
    self, HookSurface, InstallReport, SuppressionPolicy, VISIBILITY_OVERRIDES,
};

/// Re-assertion cadence.
pub const REASSERT_INTERVAL_MS: u64 = 1_000;

/// Re-assertion attempt bound. Property pins are not immune to later
/// `defineProperty` calls by the host page, but ten seconds outlasts
/// typical page-initialization races and indefinite polling is waste.
pub const REASSERT_ATTEMPTS: u32 = 10;

/// Terminal classification for one page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Protected,
    Unprotected,
}

// =============================================================================
// Controller
// =============================================================================

/// Per-page, ephemeral protection state. Created once per page load,
/// destroyed on navigation.
#[derive(Debug)]
pub struct ProtectionController {
    decision: Decision,
    hooks_installed: bool,
}

impl ProtectionController {
    /// Make the synchronous early-load decision for `url`.
    ///
    /// Reads the page-local cache under the 24 h trust window. An enabled
    /// flag that is present and explicitly false short-circuits to
    /// `Unprotected` before any classification. An absent or expired
    /// cache fails open toward the built-in rules (enabled is assumed
    /// true) and fails closed on custom sites (patterns read as empty).
    pub fn decide<S, C>(url: &str, store: &S, clock: &C) -> Self
    where
        S: PageStore + ?Sized,
        C: Clock,
    {
        let now = clock.now_ms();
        let cache = PageCache::new(store);

        if let Some(settings) = cache.read_settings_if_fresh(now, TRUST_WINDOW_MS) {
            if !settings.extension_enabled {
                log::debug!("protection disabled, skipping classification");
                return Self {
                    decision: Decision::Unprotected,
                    hooks_installed: false,
                };
            }
        }

        let sites = cache
            .read_sites_if_fresh(now, TRUST_WINDOW_MS)
            .map(|payload| payload.sites)
            .unwrap_or_default();

        let decision = if classify::is_in_scope(url, true, &sites) {
            Decision::Protected
        } else {
            Decision::Unprotected
        };

        Self {
            decision,
            hooks_installed: false,
        }
    }

    /// The terminal decision for this page load. Never changes; a cache
    /// push landing after `decide` is informational only.
    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn hooks_installed(&self) -> bool {
        self.hooks_installed
    }

    /// Install the suppression hooks. Only meaningful from `Protected`,
    /// and only once: repeat calls (and calls on an unprotected page)
    /// return `None`.
    pub fn protect<S: HookSurface + ?Sized>(
        &mut self,
        surface: &mut S,
    ) -> Option<(InstallReport, ReassertionTask)> {
        if self.decision != Decision::Protected || self.hooks_installed {
            return None;
        }

        let policy = SuppressionPolicy::standard();
        let report = suppress::install(&policy, surface);
        self.hooks_installed = true;

        Some((report, ReassertionTask::new()))
    }
}

// =============================================================================
// Re-assertion
// =============================================================================

/// Result of one re-assertion tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep the timer running; `remaining` attempts left.
    Continue { remaining: u32 },
    /// Budget exhausted; the driver must cancel its timer.
    Done,
}

/// Bounded scheduled task defending the visibility pins against later
/// scripts. The driver owns the actual timer (one tick per
/// [`REASSERT_INTERVAL_MS`]) and cancels it on [`TickOutcome::Done`].
#[derive(Debug)]
pub struct ReassertionTask {
    remaining: u32,
}

impl ReassertionTask {
    pub fn new() -> Self {
        Self {
            remaining: REASSERT_ATTEMPTS,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Check the `hidden` / `visibilityState` pins and re-apply the
    /// visibility overrides if a later script stomped them. Re-apply
    /// failures are ignored; the next tick retries.
    pub fn tick<S: HookSurface + ?Sized>(&mut self, surface: &mut S) -> TickOutcome {
        if self.remaining == 0 {
            return TickOutcome::Done;
        }
        self.remaining -= 1;

        let holds = VISIBILITY_OVERRIDES
            .iter()
            .filter(|ov| matches!(ov.property, "hidden" | "visibilityState"))
            .all(|ov| surface.property_holds(ov));

        if !holds {
            log::debug!("visibility pins stomped, re-asserting");
            for ov in &VISIBILITY_OVERRIDES {
                if let Err(err) = surface.override_property(ov) {
                    log::debug!("re-assert failed for {}: {err}", ov.property);
                }
            }
        }

        if self.remaining == 0 {
            TickOutcome::Done
        } else {
            TickOutcome::Continue {
                remaining: self.remaining,
            }
        }
    }
}

impl Default for ReassertionTask {
    fn default() -> Self {
        Self::new()
    }
}
