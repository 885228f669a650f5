//! Engine configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};

use crate::types::StorageMode;

/// Default compiled-pattern size limit (1 MiB).
pub const DEFAULT_PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Default number of compiled matchers kept in the cache.
pub const DEFAULT_PATTERN_CACHE_CAPACITY: usize = 1024;

/// Pattern compilation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Upper bound on the compiled expression size. Patterns over it never match.
    pub size_limit: usize,

    /// Memoize compiled matchers by pattern string
    pub cache: bool,

    /// Most matchers kept when caching; least recently used go first
    pub capacity: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            size_limit: DEFAULT_PATTERN_SIZE_LIMIT,
            cache: true,
            capacity: DEFAULT_PATTERN_CACHE_CAPACITY,
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend used when no storage-mode flag has been persisted
    pub default_mode: StorageMode,
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub patterns: PatternConfig,
    pub storage: StorageConfig,
}

impl EngineConfig {
    /// Parse from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.patterns.cache);
        assert_eq!(config.patterns.size_limit, DEFAULT_PATTERN_SIZE_LIMIT);
        assert_eq!(config.patterns.capacity, DEFAULT_PATTERN_CACHE_CAPACITY);
        assert_eq!(config.storage.default_mode, StorageMode::Local);
    }

    #[test]
    fn test_partial_config() {
        let config =
            EngineConfig::from_json(r#"{"patterns":{"cache":false},"storage":{"default_mode":"sync"}}"#).unwrap();
        assert!(!config.patterns.cache);
        assert_eq!(config.patterns.size_limit, DEFAULT_PATTERN_SIZE_LIMIT);
        assert_eq!(config.storage.default_mode, StorageMode::Sync);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(EngineConfig::from_json(r#"{"storage":{"default_mode":"cloud"}}"#).is_err());
    }
}
