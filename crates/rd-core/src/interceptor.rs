//! Navigation Interceptor
//!
//! Every top-level navigation runs through here. Each event is handled on
//! its own: it reads its own RuleSet snapshot, walks the rules in stored
//! order and issues at most one navigation command.
//!
//! Per-event states: Idle -> LoadingRules -> Evaluating -> Redirected | NoAction.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::mpsc;

use crate::config::PatternConfig;
use crate::error::SinkError;
use crate::pattern::PatternCache;
use crate::store::RuleStore;
use crate::types::{NavigationCommand, NavigationEvent, Rule, RuleSet};

// =============================================================================
// Host Capabilities
// =============================================================================

/// Receives redirect commands. Fire-and-forget: a command is never revoked.
pub trait NavigationCommandSink: Send + Sync {
    fn navigate(&self, command: &NavigationCommand) -> Result<(), SinkError>;
}

/// Delivers pre-navigation events. `None` once the source is closed.
#[async_trait]
pub trait NavigationEventSource: Send {
    async fn next_event(&mut self) -> Option<NavigationEvent>;
}

#[async_trait]
impl NavigationEventSource for mpsc::Receiver<NavigationEvent> {
    async fn next_event(&mut self) -> Option<NavigationEvent> {
        self.recv().await
    }
}

#[async_trait]
impl NavigationEventSource for mpsc::UnboundedReceiver<NavigationEvent> {
    async fn next_event(&mut self) -> Option<NavigationEvent> {
        self.recv().await
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// Why an event produced no redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoActionReason {
    /// Embedded frame, not the tab's primary document
    SubFrame,
    /// RuleStore read failed; treated as an empty RuleSet
    StorageUnavailable,
    /// No rule list has been persisted yet
    NoRuleSet,
    /// No enabled, non-looping rule matched
    NoMatch,
}

/// Terminal state of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Redirected(NavigationCommand),
    NoAction(NoActionReason),
}

impl Outcome {
    pub fn is_redirect(&self) -> bool {
        matches!(self, Outcome::Redirected(_))
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Select the rule to apply to `url`: the first enabled rule whose pattern
/// matches and whose redirect differs from `url`.
///
/// A match that would redirect to the URL itself is skipped, and evaluation
/// continues with the next rule.
pub fn evaluate<'a>(rules: &'a RuleSet, url: &str, patterns: &PatternCache) -> Option<&'a Rule> {
    for rule in rules {
        if !rule.enabled {
            debug!("rule {} skipped: disabled", rule.id);
            continue;
        }

        if !patterns.get(&rule.pattern).is_match(url) {
            debug!("rule {} skipped: pattern does not match", rule.id);
            continue;
        }

        if rule.redirect == url {
            debug!("rule {} skipped: redirect equals current url", rule.id);
            continue;
        }

        return Some(rule);
    }

    None
}

// =============================================================================
// Interceptor
// =============================================================================

/// Counters from [`NavigationInterceptor::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub events: usize,
    pub redirects: usize,
}

pub struct NavigationInterceptor {
    rules: Arc<dyn RuleStore>,
    sink: Arc<dyn NavigationCommandSink>,
    patterns: PatternCache,
}

impl NavigationInterceptor {
    pub fn new(rules: Arc<dyn RuleStore>, sink: Arc<dyn NavigationCommandSink>) -> Self {
        Self::with_config(rules, sink, PatternConfig::default())
    }

    pub fn with_config(
        rules: Arc<dyn RuleStore>,
        sink: Arc<dyn NavigationCommandSink>,
        config: PatternConfig,
    ) -> Self {
        Self {
            rules,
            sink,
            patterns: PatternCache::new(config),
        }
    }

    pub fn patterns(&self) -> &PatternCache {
        &self.patterns
    }

    /// Handle one pre-navigation event.
    pub async fn handle(&self, event: &NavigationEvent) -> Outcome {
        if !event.is_top_level() {
            return Outcome::NoAction(NoActionReason::SubFrame);
        }

        let rules = match self.rules.load_rules().await {
            Ok(Some(rules)) => rules,
            Ok(None) => return Outcome::NoAction(NoActionReason::NoRuleSet),
            Err(e) => {
                warn!("failed to load rules for tab {}: {e}", event.tab_id);
                return Outcome::NoAction(NoActionReason::StorageUnavailable);
            }
        };

        let rule = match evaluate(&rules, &event.url, &self.patterns) {
            Some(rule) => rule,
            None => return Outcome::NoAction(NoActionReason::NoMatch),
        };

        let command = NavigationCommand {
            tab_id: event.tab_id,
            url: rule.redirect.clone(),
        };
        debug!(
            "rule {} redirects tab {}: {} -> {}",
            rule.id, event.tab_id, event.url, command.url
        );

        if let Err(e) = self.sink.navigate(&command) {
            warn!("{e}");
        }

        Outcome::Redirected(command)
    }

    /// Drain `source`, handling each event in its own task.
    ///
    /// Returns once the source is closed and every in-flight event is done.
    #[cfg(feature = "runtime")]
    pub async fn run<S: NavigationEventSource>(self: Arc<Self>, mut source: S) -> RunStats {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let redirects = Arc::new(AtomicUsize::new(0));
        // Each task holds a sender; recv() yields None once all are dropped.
        let (done_tx, mut done_rx) = mpsc::channel::<()>(1);
        let mut events = 0usize;

        while let Some(event) = source.next_event().await {
            events += 1;
            let this = Arc::clone(&self);
            let redirects = Arc::clone(&redirects);
            let done = done_tx.clone();
            tokio::spawn(async move {
                if this.handle(&event).await.is_redirect() {
                    redirects.fetch_add(1, Ordering::Relaxed);
                }
                drop(done);
            });
        }

        drop(done_tx);
        let _ = done_rx.recv().await;

        RunStats {
            events,
            redirects: redirects.load(Ordering::Relaxed),
        }
    }
}
