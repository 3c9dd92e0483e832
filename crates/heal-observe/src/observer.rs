//! Sink for healing audit records

use std::sync::Arc;

use selfheal_core_types::{HealingAttempt, HealingEvent};

/// Receives audit records from the healing engine.
///
/// Calls happen inline on the healing task, so implementations should
/// only record and return.
pub trait HealingObserver: Send + Sync {
    /// One strategy finished (successfully or not)
    fn on_attempt(&self, attempt: &HealingAttempt);

    /// One healing run finished
    fn on_event(&self, event: &HealingEvent);
}

/// Observer that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl HealingObserver for NoopObserver {
    fn on_attempt(&self, _attempt: &HealingAttempt) {}

    fn on_event(&self, _event: &HealingEvent) {}
}

/// Fan-out to several observers in registration order
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn HealingObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observer: Arc<dyn HealingObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl HealingObserver for ObserverSet {
    fn on_attempt(&self, attempt: &HealingAttempt) {
        for observer in &self.observers {
            observer.on_attempt(attempt);
        }
    }

    fn on_event(&self, event: &HealingEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.observers.len())
            .finish()
    }
}
