//! Time source abstraction
//!
//! Freshness checks compare epoch-millisecond timestamps embedded in cache
//! payloads. The wasm page world has no usable `SystemTime`, so every
//! caller takes a [`Clock`] and the bindings supply a `Date.now()`-backed
//! implementation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Epoch-millisecond time source.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall-clock time via `std::time::SystemTime`. Not available in the page
/// world; used by the coordinator, the CLI, and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::Relaxed);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
