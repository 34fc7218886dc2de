//! QuietView Background Coordinator
//!
//! This crate is the privileged half of the protection protocol: it
//! watches the durable settings store and keeps every open page's local
//! cache fresh enough for the synchronous early-inject decision in
//! `qv-core` to be right. All platform touchpoints (the sync storage, the
//! tab surface) are trait seams, so the whole orchestration runs under
//! test against in-process fakes.

pub mod coordinator;
pub mod host;
pub mod message;
pub mod store;

pub use coordinator::{Coordinator, CoordinatorConfig, InstallReason, SweepStats};
pub use host::{FakeHost, InjectError, PageEvent, PageHost, PageId, PageRef};
pub use message::{ProtectionStatus, Request};
pub use store::{
    read_settings, ChangeEvent, ChangeStream, MemorySettingsStore, SettingsStore, StoreError,
};
