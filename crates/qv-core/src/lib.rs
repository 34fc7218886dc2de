//! QuietView Core Library
//!
//! This crate provides the protection engine for the QuietView
//! visibility-privacy extension: deciding whether a page is in scope for
//! protection and neutralizing the page-visibility/focus signals a remote
//! document or course owner could use to watch the local user.
//!
//! # Architecture
//!
//! The engine is strictly synchronous. The hard constraint is the
//! early-inject moment: the decision must land before any page script can
//! observe the visibility APIs, so it cannot await storage, permissions,
//! or messaging. The durable settings therefore get mirrored into each
//! page's own storage origin by a privileged coordinator (see the
//! `qv-coordinator` crate), and everything here reads that mirror.
//!
//! # Modules
//!
//! - `url`: allocation-free URL helpers for the hot path
//! - `pattern`: user-pattern matching (five pattern shapes)
//! - `classify`: built-in LMS/collab rules + user patterns -> in scope?
//! - `settings`: durable settings model and persisted key names
//! - `cache`: page-local mirror payloads and two-tier freshness
//! - `suppress`: the suppression policy and its install directives
//! - `protection`: the per-page decision state machine and re-assertion
//! - `clock`: epoch-ms time source abstraction

pub mod cache;
pub mod classify;
pub mod clock;
pub mod pattern;
pub mod protection;
pub mod settings;
pub mod suppress;
pub mod url;

// Re-export commonly used types
pub use cache::{apply_refresh, CacheRefresh, PageCache, PageStore, RefreshOutcome};
pub use classify::{is_in_scope, ScopeReason};
pub use clock::{Clock, SystemClock};
pub use protection::{Decision, ProtectionController, ReassertionTask, TickOutcome};
pub use settings::Settings;
pub use suppress::{HookSurface, InstallReport, SignalEvents, SuppressionPolicy};
