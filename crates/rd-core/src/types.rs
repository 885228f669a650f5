//! Core type definitions for Redirector
//!
//! These types map directly to the persisted rule records and to the
//! navigation events delivered by the browser.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::RuleError;

// =============================================================================
// Rules
// =============================================================================

/// Identifier of a persisted rule.
pub type RuleId = u64;

/// A single pattern -> destination rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique within a RuleSet, immutable after creation
    pub id: RuleId,
    /// Wildcard pattern matched against the full navigated URL
    pub pattern: String,
    /// Absolute URL to navigate to on match
    pub redirect: String,
    /// Disabled rules are skipped during evaluation
    pub enabled: bool,
}

impl Rule {
    /// Create an enabled rule, validating the redirect target.
    pub fn new(id: RuleId, pattern: impl Into<String>, redirect: impl Into<String>) -> Result<Self, RuleError> {
        let redirect = redirect.into();
        validate_redirect(&redirect)?;
        Ok(Self {
            id,
            pattern: pattern.into(),
            redirect,
            enabled: true,
        })
    }
}

/// Check that a redirect target is a syntactically valid absolute URL.
pub fn validate_redirect(redirect: &str) -> Result<(), RuleError> {
    Url::parse(redirect)
        .map(|_| ())
        .map_err(|source| RuleError::InvalidRedirectTarget {
            redirect: redirect.to_string(),
            source,
        })
}

// =============================================================================
// Rule Set
// =============================================================================

/// Ordered list of rules. Order is evaluation priority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate rules in stored order.
    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    /// Next free identifier: one past the largest id in the set.
    ///
    /// Monotonic within a set, so two rules created back to back never collide.
    pub fn next_id(&self) -> RuleId {
        self.rules
            .iter()
            .map(|rule| rule.id)
            .max()
            .map_or(1, |max| max.saturating_add(1))
    }

    /// Append a rule, rejecting a duplicate id.
    pub fn push(&mut self, rule: Rule) -> Result<(), RuleError> {
        if self.get(rule.id).is_some() {
            return Err(RuleError::DuplicateId(rule.id));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Create a new enabled rule at the end of the set. Returns its id.
    pub fn add(&mut self, pattern: impl Into<String>, redirect: impl Into<String>) -> Result<RuleId, RuleError> {
        let rule = Rule::new(self.next_id(), pattern, redirect)?;
        let id = rule.id;
        self.rules.push(rule);
        Ok(id)
    }

    /// Flip `enabled` on the rule with `id`. Returns the new state.
    pub fn toggle(&mut self, id: RuleId) -> Option<bool> {
        let rule = self.rules.iter_mut().find(|rule| rule.id == id)?;
        rule.enabled = !rule.enabled;
        Some(rule.enabled)
    }
}

impl From<Vec<Rule>> for RuleSet {
    fn from(rules: Vec<Rule>) -> Self {
        Self { rules }
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

// =============================================================================
// Storage Mode
// =============================================================================

/// Which backing store is current for rule reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Synchronized across the user's browsers
    Sync,
    /// Local to this browser profile
    #[default]
    Local,
}

// =============================================================================
// Navigation
// =============================================================================

/// Frame id of the top-level document.
pub const TOP_LEVEL_FRAME: i32 = 0;

/// Pre-navigation event delivered by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEvent {
    pub tab_id: i32,
    pub url: String,
    pub frame_id: i32,
}

impl NavigationEvent {
    pub fn new(tab_id: i32, url: impl Into<String>, frame_id: i32) -> Self {
        Self {
            tab_id,
            url: url.into(),
            frame_id,
        }
    }

    /// Is this the primary document of the tab?
    pub fn is_top_level(&self) -> bool {
        self.frame_id == TOP_LEVEL_FRAME
    }
}

/// Command to point an already-open tab at a new URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationCommand {
    pub tab_id: i32,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_set_wire_shape() {
        let json = r#"[{"id":1,"pattern":"https://a.com/*","redirect":"https://b.com","enabled":true},
                       {"id":7,"pattern":"*","redirect":"https://x.com","enabled":false}]"#;
        let rules: RuleSet = serde_json::from_str(json).unwrap();
        assert_eq!(rules.len(), 2);
        let ids: Vec<_> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 7]);
        assert!(!rules.get(7).unwrap().enabled);

        let back = serde_json::to_value(&rules).unwrap();
        assert!(back.is_array());
        assert_eq!(back[1]["pattern"], "*");
    }

    #[test]
    fn test_next_id_is_monotonic() {
        let mut rules = RuleSet::new();
        assert_eq!(rules.next_id(), 1);
        let first = rules.add("https://a.com", "https://b.com").unwrap();
        let second = rules.add("https://c.com", "https://d.com").unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);

        rules.push(Rule::new(40, "x", "https://y.com").unwrap()).unwrap();
        assert_eq!(rules.next_id(), 41);
    }

    #[test]
    fn test_push_rejects_duplicate_id() {
        let mut rules = RuleSet::new();
        rules.push(Rule::new(3, "a", "https://b.com").unwrap()).unwrap();
        let err = rules.push(Rule::new(3, "c", "https://d.com").unwrap()).unwrap_err();
        assert!(matches!(err, RuleError::DuplicateId(3)));
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_add_rejects_relative_redirect() {
        let mut rules = RuleSet::new();
        let err = rules.add("https://a.com", "/relative/path").unwrap_err();
        assert!(matches!(err, RuleError::InvalidRedirectTarget { .. }));
        assert!(rules.is_empty());
    }

    #[test]
    fn test_toggle() {
        let mut rules = RuleSet::new();
        let id = rules.add("https://a.com", "https://b.com").unwrap();
        assert_eq!(rules.get(id).map(|r| r.redirect.as_str()), Some("https://b.com"));
        assert_eq!(rules.toggle(id), Some(false));
        assert_eq!(rules.toggle(id), Some(true));
        assert_eq!(rules.toggle(999), None);
    }

    #[test]
    fn test_navigation_event_wire_shape() {
        let event: NavigationEvent =
            serde_json::from_str(r#"{"tabId":4,"url":"https://a.com","frameId":0}"#).unwrap();
        assert_eq!(event, NavigationEvent::new(4, "https://a.com", 0));
        assert!(event.is_top_level());
        assert!(!NavigationEvent::new(4, "https://a.com", 3).is_top_level());
    }

    #[test]
    fn test_storage_mode_names() {
        assert_eq!(serde_json::to_string(&StorageMode::Sync).unwrap(), "\"sync\"");
        let mode: StorageMode = serde_json::from_str("\"local\"").unwrap();
        assert_eq!(mode, StorageMode::Local);
        assert_eq!(StorageMode::default(), StorageMode::Local);
    }
}
