//! Error types for the redirect engine.

use crate::types::RuleId;

/// A pattern that could not be turned into a matching expression.
///
/// Never returned from [`crate::pattern::compile`]; it is what gets logged
/// when a pattern degrades to a never-matching matcher.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Rule construction failures.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("Invalid redirect target '{redirect}': {source}")]
    InvalidRedirectTarget {
        redirect: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Duplicate rule id: {0}")]
    DuplicateId(RuleId),
}

/// Rule store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Malformed value under '{key}': {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Navigation command sink failures.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Navigation of tab {tab_id} rejected: {reason}")]
    Rejected { tab_id: i32, reason: String },
}
