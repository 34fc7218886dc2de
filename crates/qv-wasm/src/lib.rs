//! WebAssembly bindings for QuietView
//!
//! Two call sites consume these bindings: the early-inject script, which
//! must decide and patch synchronously before any page code runs, and the
//! background script, which pushes cache refreshes and classifies URLs.
//! Every export is infallible from JS's point of view; failure modes
//! degrade to "no protection" rather than throwing into the page.

mod hooks;
mod page;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use qv_core::cache::{apply_refresh, CacheRefresh, MemoryStore, RefreshOutcome};
use qv_core::clock::Clock;
use qv_core::protection::{
    Decision, ProtectionController, ReassertionTask, TickOutcome, REASSERT_INTERVAL_MS,
};
use qv_core::suppress::SignalEvents;

use hooks::JsHookSurface;
use page::{JsClock, LocalStorageStore};

/// Synchronous early-inject entry point.
///
/// Reads the page-local cache, decides, and on a protect decision
/// installs the suppression hooks and starts the bounded re-assertion
/// interval. Returns whether protection was applied.
#[wasm_bindgen]
pub fn early_protect(url: &str) -> bool {
    let mut controller = match LocalStorageStore::from_window() {
        Some(store) => ProtectionController::decide(url, &store, &JsClock),
        // No storage access: decide against an empty cache, which still
        // protects built-in sites.
        None => ProtectionController::decide(url, &MemoryStore::new(), &JsClock),
    };

    if controller.decision() != Decision::Protected {
        return false;
    }

    let mut surface = match JsHookSurface::acquire() {
        Some(surface) => surface,
        None => return false,
    };

    match controller.protect(&mut surface) {
        Some((_report, task)) => {
            start_reassertion(task, surface);
            true
        }
        None => false,
    }
}

/// Background-push applier: mirror the given pattern list and enabled
/// flag into this page's cache. Returns true when the cache was written
/// (false means it was already fresh and identical, or storage is
/// unavailable in a way that also made the freshness read fail open).
#[wasm_bindgen]
pub fn apply_cache_refresh(sites: JsValue, extension_enabled: bool) -> bool {
    let store = match LocalStorageStore::from_window() {
        Some(store) => store,
        None => return false,
    };

    let refresh = CacheRefresh {
        sites: collect_strings(&sites),
        extension_enabled,
    };
    apply_refresh(&store, &refresh, JsClock.now_ms()) == RefreshOutcome::Written
}

/// Classify a URL against an explicit pattern list and enabled flag.
/// Used by background/popup glue that already holds the settings.
#[wasm_bindgen]
pub fn classify_url(url: &str, sites: JsValue, extension_enabled: bool) -> bool {
    qv_core::is_in_scope(url, extension_enabled, &collect_strings(&sites))
}

/// Is this event name one of the suppressed signal events?
#[wasm_bindgen]
pub fn is_event_blocked(name: &str) -> bool {
    SignalEvents::is_blocked(name)
}

fn collect_strings(value: &JsValue) -> Vec<String> {
    js_sys::Array::from(value)
        .iter()
        .filter_map(|entry| entry.as_string())
        .collect()
}

/// Drive the re-assertion task on a real interval, self-terminating when
/// the task reports done.
fn start_reassertion(task: ReassertionTask, surface: JsHookSurface) {
    let window = match web_sys::window() {
        Some(window) => window,
        None => return,
    };

    let task = Rc::new(RefCell::new(task));
    let surface = Rc::new(RefCell::new(surface));
    let interval_id = Rc::new(Cell::new(0i32));

    let id_slot = Rc::clone(&interval_id);
    let tick = Closure::wrap(Box::new(move || {
        let outcome = task.borrow_mut().tick(&mut *surface.borrow_mut());
        if outcome == TickOutcome::Done {
            if let Some(window) = web_sys::window() {
                window.clear_interval_with_handle(id_slot.get());
            }
        }
    }) as Box<dyn FnMut()>);

    match window.set_interval_with_callback_and_timeout_and_arguments_0(
        tick.as_ref().unchecked_ref(),
        REASSERT_INTERVAL_MS as i32,
    ) {
        Ok(id) => interval_id.set(id),
        Err(_) => return,
    }
    tick.forget();
}
