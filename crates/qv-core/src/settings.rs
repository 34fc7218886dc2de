//! Durable settings model
//!
//! The authoritative settings live in a platform-synchronized key-value
//! store owned by the coordinator; this module defines the value shapes,
//! the persisted key names, and the defaults seeded on first install.
//! Pattern validity is the UI's problem: a malformed pattern stored here is
//! tolerated everywhere downstream and simply never matches.

use serde::{Deserialize, Serialize};

/// Persisted key: the global kill switch (defaults to true).
pub const KEY_ENABLED: &str = "extensionEnabled";

/// Persisted key: the ordered user pattern list (defaults to empty).
pub const KEY_CUSTOM_SITES: &str = "customSites";

/// Persisted key: whether the user acknowledged the external
/// collaboration-platform opt-out flow (defaults to false).
pub const KEY_COLLAB_OPTOUT_ACK: &str = "hasDisabledGoogleTracking";

/// The settings singleton.
///
/// `custom_sites` keeps insertion order; duplicates are refused at the
/// write API, not silently dropped on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub extension_enabled: bool,
    pub custom_sites: Vec<String>,
    pub has_disabled_google_tracking: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            extension_enabled: true,
            custom_sites: Vec::new(),
            has_disabled_google_tracking: false,
        }
    }
}

impl Settings {
    /// Append a pattern, preserving insertion order.
    /// Returns false (and leaves the list untouched) on duplicates.
    pub fn add_pattern(&mut self, pattern: &str) -> bool {
        let pattern = pattern.trim();
        if pattern.is_empty() || self.custom_sites.iter().any(|p| p == pattern) {
            return false;
        }
        self.custom_sites.push(pattern.to_string());
        true
    }

    /// Remove a pattern by value. Returns whether anything was removed.
    pub fn remove_pattern(&mut self, pattern: &str) -> bool {
        let before = self.custom_sites.len();
        self.custom_sites.retain(|p| p != pattern);
        self.custom_sites.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert!(settings.extension_enabled);
        assert!(settings.custom_sites.is_empty());
        assert!(!settings.has_disabled_google_tracking);
    }

    #[test]
    fn add_keeps_order_and_refuses_duplicates() {
        let mut settings = Settings::default();
        assert!(settings.add_pattern("b.com"));
        assert!(settings.add_pattern("a.com"));
        assert!(!settings.add_pattern("b.com"));
        assert!(!settings.add_pattern("  "));
        assert_eq!(settings.custom_sites, vec!["b.com", "a.com"]);
    }

    #[test]
    fn remove_by_value() {
        let mut settings = Settings::default();
        settings.add_pattern("a.com");
        settings.add_pattern("b.com");
        assert!(settings.remove_pattern("a.com"));
        assert!(!settings.remove_pattern("a.com"));
        assert_eq!(settings.custom_sites, vec!["b.com"]);
    }

    #[test]
    fn wire_form_is_camel_case() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(json["extensionEnabled"], true);
        assert!(json["customSites"].as_array().unwrap().is_empty());
        assert_eq!(json["hasDisabledGoogleTracking"], false);
    }

    #[test]
    fn partial_wire_form_fills_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"customSites":["x.com"]}"#).unwrap();
        assert!(settings.extension_enabled);
        assert_eq!(settings.custom_sites, vec!["x.com"]);
    }
}
