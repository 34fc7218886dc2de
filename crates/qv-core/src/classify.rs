//! Site classification
//!
//! Decides whether a URL is in scope for protection: the global enabled
//! flag dominates everything, then the built-in LMS and collaboration-doc
//! rules, then the user's own pattern list.

use crate::pattern;
use crate::url::extract_host;

/// Hostname substrings identifying LMS/course platforms. Substring matching
/// is deliberately broad: institutions host Canvas under arbitrary
/// subdomains (`mycourse.instructure.com`, `canvas.university.edu`).
pub const LMS_HOST_MARKERS: [&str; 3] = ["canvas", "instructure", "canvaslms"];

/// The fixed pair of collaboration-document hosts, matched exactly.
pub const COLLAB_HOSTS: [&str; 2] = ["docs.google.com", "slides.google.com"];

// =============================================================================
// Built-in Rules
// =============================================================================

/// Built-in rule A: LMS hostnames, case-insensitive substring match.
#[inline]
pub fn is_lms_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    LMS_HOST_MARKERS.iter().any(|marker| host.contains(marker))
}

/// Built-in rule B: exact match against the collaboration-document pair.
#[inline]
pub fn is_collab_host(host: &str) -> bool {
    COLLAB_HOSTS.iter().any(|known| host.eq_ignore_ascii_case(known))
}

// =============================================================================
// Classification
// =============================================================================

/// Why a URL was classified in scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeReason {
    /// Matched the built-in LMS substring rule.
    Lms,
    /// Matched one of the known collaboration-document hosts.
    Collab,
    /// Matched the user pattern at this index.
    UserPattern(usize),
}

/// Classify a URL, reporting the first rule that put it in scope.
///
/// Returns `None` when the URL is out of scope, including whenever
/// `enabled` is false: the kill switch dominates all other logic.
pub fn classification(url: &str, enabled: bool, user_patterns: &[String]) -> Option<ScopeReason> {
    if !enabled {
        return None;
    }

    if let Some(host) = extract_host(url) {
        if is_lms_host(host) {
            return Some(ScopeReason::Lms);
        }
        if is_collab_host(host) {
            return Some(ScopeReason::Collab);
        }
    }

    user_patterns
        .iter()
        .position(|p| pattern::matches(url, p))
        .map(ScopeReason::UserPattern)
}

/// Is this URL in scope for protection?
#[inline]
pub fn is_in_scope(url: &str, enabled: bool, user_patterns: &[String]) -> bool {
    classification(url, enabled, user_patterns).is_some()
}
