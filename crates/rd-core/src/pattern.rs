//! Wildcard Pattern Compiler
//!
//! Turns a rule pattern into a case-insensitive matcher over full URLs.
//! `*` is the only special character; everything else matches literally.
//!
//! Anchoring: a pattern that does not end in `*` also accepts exactly one
//! trailing `/`, so `https://a.com/old` matches `https://a.com/old/`.
//! A trailing `*` already absorbs any suffix and only needs the end anchor.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use log::{trace, warn};
use lru::LruCache;
use regex::{Regex, RegexBuilder};

use crate::config::PatternConfig;
use crate::error::PatternError;

/// Expression token substituted for each `*`.
pub const ANY_SEQUENCE: &str = ".*";

/// Expression appended to patterns that do not end in `*`.
const OPTIONAL_TRAILING_SLASH: &str = "/?";

// =============================================================================
// Matcher
// =============================================================================

/// Compiled matcher for one pattern.
///
/// A matcher built from a pattern that failed to compile rejects every URL.
#[derive(Debug, Clone)]
pub struct UrlMatcher {
    regex: Option<Regex>,
}

impl UrlMatcher {
    /// A matcher that never matches.
    pub fn never() -> Self {
        Self { regex: None }
    }

    /// Test a full navigated URL.
    #[inline]
    pub fn is_match(&self, url: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(url),
            None => false,
        }
    }

    /// Did the pattern compile?
    pub fn is_valid(&self) -> bool {
        self.regex.is_some()
    }

    /// The anchored expression, if the pattern compiled.
    pub fn as_str(&self) -> Option<&str> {
        self.regex.as_ref().map(Regex::as_str)
    }
}

// =============================================================================
// Compilation
// =============================================================================

/// Build the anchored expression source for `pattern`.
pub fn expression(pattern: &str) -> String {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(ANY_SEQUENCE);

    if pattern.ends_with('*') {
        format!("^{body}$")
    } else {
        format!("^{body}{OPTIONAL_TRAILING_SLASH}$")
    }
}

/// Compile `pattern`, surfacing the failure.
pub fn try_compile(pattern: &str, config: &PatternConfig) -> Result<Regex, PatternError> {
    RegexBuilder::new(&expression(pattern))
        .case_insensitive(true)
        .size_limit(config.size_limit)
        .build()
        .map_err(|source| PatternError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// Compile `pattern` with default settings.
///
/// Never fails: an uncompilable pattern yields [`UrlMatcher::never`].
pub fn compile(pattern: &str) -> UrlMatcher {
    compile_with(pattern, &PatternConfig::default())
}

/// Compile `pattern` with explicit settings. See [`compile`].
pub fn compile_with(pattern: &str, config: &PatternConfig) -> UrlMatcher {
    match try_compile(pattern, config) {
        Ok(regex) => UrlMatcher { regex: Some(regex) },
        Err(e) => {
            warn!("{e}; rule will never match");
            UrlMatcher::never()
        }
    }
}

// =============================================================================
// Cache
// =============================================================================

/// Memoizes compiled matchers by pattern string.
///
/// Holds derived data only. Rules are never cached here, so every event still
/// evaluates against the snapshot it read itself. Bounded by
/// `PatternConfig::capacity`; the least recently used pattern is evicted first.
#[derive(Debug)]
pub struct PatternCache {
    config: PatternConfig,
    matchers: Mutex<LruCache<String, Arc<UrlMatcher>>>,
}

impl PatternCache {
    pub fn new(config: PatternConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            matchers: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Get the matcher for `pattern`, compiling it on first use.
    pub fn get(&self, pattern: &str) -> Arc<UrlMatcher> {
        if !self.config.cache {
            return Arc::new(compile_with(pattern, &self.config));
        }

        // A poisoned lock still holds valid matchers.
        let mut matchers = self.matchers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(matcher) = matchers.get(pattern) {
            trace!("pattern cache hit: {pattern}");
            return Arc::clone(matcher);
        }

        let matcher = Arc::new(compile_with(pattern, &self.config));
        matchers.put(pattern.to_string(), Arc::clone(&matcher));
        matcher
    }

    /// Is a compiled matcher for `pattern` currently held?
    pub fn contains(&self, pattern: &str) -> bool {
        self.matchers.lock().unwrap_or_else(|e| e.into_inner()).contains(pattern)
    }

    /// Number of cached matchers.
    pub fn len(&self) -> usize {
        self.matchers.lock().map(|m| m.len()).unwrap_or_else(|e| e.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.matchers.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(PatternConfig::default())
    }
}
