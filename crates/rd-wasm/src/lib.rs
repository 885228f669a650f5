//! WebAssembly bindings for Redirector
//!
//! The extension's background script owns the browser APIs (storage,
//! webNavigation, tabs). It hands the rule list it read to these functions
//! and applies whatever command comes back.

use std::sync::OnceLock;

use log::warn;
use wasm_bindgen::prelude::*;

use rd_core::{
    config::EngineConfig,
    interceptor::evaluate,
    lifecycle::bootstrap_value,
    pattern::{expression, PatternCache},
    store::decode_rules,
    types::{validate_redirect, NavigationEvent, RuleId, RuleSet},
};

mod console;

struct EngineState {
    patterns: PatternCache,
}

static ENGINE_STATE: OnceLock<EngineState> = OnceLock::new();

/// Initialize the engine. `config_json` may be omitted for defaults.
#[wasm_bindgen]
pub fn init(config_json: Option<String>) -> Result<(), JsValue> {
    if ENGINE_STATE.get().is_some() {
        return Err(JsValue::from_str("Already initialized. Reload the extension to reinitialize."));
    }

    let config = match config_json.as_deref() {
        Some(text) => EngineConfig::from_json(text)
            .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?,
        None => EngineConfig::default(),
    };

    ENGINE_STATE
        .set(EngineState {
            patterns: PatternCache::new(config.patterns),
        })
        .map_err(|_| JsValue::from_str("Failed to set engine state"))?;

    Ok(())
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    ENGINE_STATE.get().is_some()
}

/// Route `log` output to the browser console at `level`.
#[wasm_bindgen]
pub fn init_logging(level: &str) {
    console::install(console::parse_level(level));
}

/// Evaluate one navigation event against `rules_json`.
///
/// Returns `{ tabId, url, ruleId }` when the tab should be redirected, or
/// `null` for no action. An unreadable rule list counts as empty.
#[wasm_bindgen]
pub fn select_redirect(rules_json: &str, tab_id: i32, url: &str, frame_id: i32) -> JsValue {
    let event = NavigationEvent::new(tab_id, url, frame_id);
    match select_with(ENGINE_STATE.get(), rules_json, &event) {
        Some((rule_id, redirect)) => {
            let result = js_sys::Object::new();
            let _ = js_sys::Reflect::set(&result, &"tabId".into(), &JsValue::from(tab_id));
            let _ = js_sys::Reflect::set(&result, &"url".into(), &JsValue::from_str(&redirect));
            let _ = js_sys::Reflect::set(&result, &"ruleId".into(), &JsValue::from(rule_id as f64));
            result.into()
        }
        None => JsValue::NULL,
    }
}

/// Anchored expression a pattern compiles to.
#[wasm_bindgen]
pub fn compile_pattern(pattern: &str) -> String {
    expression(pattern)
}

#[wasm_bindgen]
pub fn pattern_matches(pattern: &str, url: &str) -> bool {
    match ENGINE_STATE.get() {
        Some(state) => state.patterns.get(pattern).is_match(url),
        None => rd_core::pattern::compile(pattern).is_match(url),
    }
}

/// Rule list to write on install: `"[]"` when nothing is stored yet,
/// `undefined` when the stored list must be left alone.
#[wasm_bindgen]
pub fn bootstrap_rules(existing_json: Option<String>) -> Result<Option<String>, JsValue> {
    bootstrap(existing_json.as_deref()).map_err(|e| JsValue::from_str(&e))
}

#[wasm_bindgen]
pub fn is_valid_redirect(redirect: &str) -> bool {
    validate_redirect(redirect).is_ok()
}

/// Identifier for the next rule appended to `rules_json`.
#[wasm_bindgen]
pub fn next_rule_id(rules_json: &str) -> Result<f64, JsValue> {
    let rules = parse_rules(rules_json).map_err(|e| JsValue::from_str(&e))?;
    Ok(rules.next_id() as f64)
}

fn parse_rules(rules_json: &str) -> Result<RuleSet, String> {
    let value: serde_json::Value =
        serde_json::from_str(rules_json).map_err(|e| format!("Invalid rule list: {}", e))?;
    decode_rules(value).map_err(|e| format!("Invalid rule list: {}", e))
}

/// No engine state means no action.
fn select_with(
    state: Option<&EngineState>,
    rules_json: &str,
    event: &NavigationEvent,
) -> Option<(RuleId, String)> {
    let state = state?;
    select(rules_json, event, &state.patterns)
}

fn select(rules_json: &str, event: &NavigationEvent, patterns: &PatternCache) -> Option<(RuleId, String)> {
    if !event.is_top_level() {
        return None;
    }

    let rules = match parse_rules(rules_json) {
        Ok(rules) => rules,
        Err(e) => {
            warn!("{e}");
            return None;
        }
    };

    evaluate(&rules, &event.url, patterns).map(|rule| (rule.id, rule.redirect.clone()))
}

fn bootstrap(existing_json: Option<&str>) -> Result<Option<String>, String> {
    let existing = existing_json.map(parse_rules).transpose()?;
    match bootstrap_value(existing.as_ref()) {
        Some(rules) => serde_json::to_string(&rules)
            .map(Some)
            .map_err(|e| format!("Failed to encode rule list: {}", e)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = r#"[
        {"id":1,"pattern":"*","redirect":"https://x.com","enabled":false},
        {"id":2,"pattern":"https://a.com","redirect":"https://b.com","enabled":true}
    ]"#;

    #[test]
    fn test_select_skips_disabled_rule() {
        let patterns = PatternCache::default();
        let event = NavigationEvent::new(3, "https://a.com", 0);
        assert_eq!(select(RULES, &event, &patterns), Some((2, "https://b.com".to_string())));
    }

    #[test]
    fn test_select_ignores_sub_frames() {
        let patterns = PatternCache::default();
        let event = NavigationEvent::new(3, "https://a.com", 1);
        assert_eq!(select(RULES, &event, &patterns), None);
    }

    #[test]
    fn test_select_treats_bad_rule_list_as_empty() {
        let patterns = PatternCache::default();
        let event = NavigationEvent::new(3, "https://a.com", 0);
        assert_eq!(select("{oops", &event, &patterns), None);
    }

    #[test]
    fn test_select_uninitialized_is_no_action() {
        let event = NavigationEvent::new(3, "https://a.com", 0);
        assert_eq!(select_with(None, RULES, &event), None);

        let state = EngineState {
            patterns: PatternCache::default(),
        };
        assert_eq!(select_with(Some(&state), RULES, &event), Some((2, "https://b.com".to_string())));
    }

    #[test]
    fn test_select_keeps_rules_around_a_bad_record() {
        let patterns = PatternCache::default();
        let rules = r#"[
            {"id":1,"pattern":"https://a.com","redirect":"https://b.com","enabled":true},
            {"id":2,"pattern":"https://c.com","redirect":"https://d.com"}
        ]"#;
        let event = NavigationEvent::new(3, "https://a.com", 0);
        assert_eq!(select(rules, &event, &patterns), Some((1, "https://b.com".to_string())));
        assert_eq!(next_rule_id(rules).ok(), Some(2.0));
    }

    #[test]
    fn test_bootstrap() {
        assert_eq!(bootstrap(None).unwrap(), Some("[]".to_string()));
        assert_eq!(bootstrap(Some("[]")).unwrap(), None);
        assert_eq!(bootstrap(Some(RULES)).unwrap(), None);
        assert!(bootstrap(Some("42")).is_err());
    }

    #[test]
    fn test_compile_pattern() {
        assert_eq!(compile_pattern("https://a.com/*"), r"^https://a\.com/.*$");
        assert!(is_valid_redirect("https://b.com/path"));
        assert!(!is_valid_redirect("b.com/path"));
    }
}
