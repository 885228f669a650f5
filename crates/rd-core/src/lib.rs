//! Redirector Core Library
//!
//! This crate provides the rule matching and navigation interception engine
//! for the Redirector browser extension.
//!
//! # Architecture
//!
//! Users keep an ordered list of wildcard pattern -> destination rules. On
//! every top-level navigation the interceptor reads the current rule list,
//! walks it in stored order and redirects the tab to the first enabled rule
//! whose pattern matches and whose destination differs from the current URL.
//!
//! # Modules
//!
//! - `pattern`: wildcard pattern compilation and matcher cache
//! - `interceptor`: per-event evaluation and redirect dispatch
//! - `lifecycle`: install-time bootstrap of the rule list
//! - `store`: key-value backends and storage-mode selection
//! - `config`: engine configuration
//! - `types`: shared type definitions

pub mod config;
pub mod error;
pub mod interceptor;
pub mod lifecycle;
pub mod pattern;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{PatternError, RuleError, SinkError, StoreError};
pub use interceptor::{
    evaluate, NavigationCommandSink, NavigationEventSource, NavigationInterceptor, NoActionReason, Outcome,
    RunStats,
};
pub use lifecycle::{on_install, InstallOutcome};
pub use pattern::{compile, PatternCache, UrlMatcher};
pub use store::{KeyValueStore, MemoryStore, RuleStore, StorageProvider};
pub use types::{NavigationCommand, NavigationEvent, Rule, RuleId, RuleSet, StorageMode};
