//! Install-time bootstrap
//!
//! Makes sure a rule list exists after install. An existing list, even an
//! empty one, is never touched.

use log::{debug, info};

use crate::error::StoreError;
use crate::store::RuleStore;
use crate::types::RuleSet;

/// Result of [`on_install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// No rule list existed; an empty one was written
    Initialized,
    /// A rule list was already present and left unchanged
    AlreadyPresent,
}

/// Value to write on install, if any: an empty set only when the key is absent.
pub fn bootstrap_value(existing: Option<&RuleSet>) -> Option<RuleSet> {
    match existing {
        Some(_) => None,
        None => Some(RuleSet::new()),
    }
}

/// Idempotent install hook. Performs at most one write.
pub async fn on_install(store: &dyn RuleStore) -> Result<InstallOutcome, StoreError> {
    let existing = store.load_rules().await?;

    match bootstrap_value(existing.as_ref()) {
        Some(rules) => {
            store.save_rules(&rules).await?;
            info!("initialized empty rule list");
            Ok(InstallOutcome::Initialized)
        }
        None => {
            debug!("rule list already present, leaving it untouched");
            Ok(InstallOutcome::AlreadyPresent)
        }
    }
}
