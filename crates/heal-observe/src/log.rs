//! Bounded healing history
//!
//! Runs and attempts are kept in two drop-oldest rings. Queries walk the
//! ring newest first so `limit` always returns the most recent matches.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use selfheal_core_types::{HealingAttempt, HealingEvent, StrategyKind};
use serde::{Deserialize, Serialize};

use crate::observer::HealingObserver;

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Filter for history queries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub strategy: Option<StrategyKind>,
    pub element_type: Option<String>,
    pub success: Option<bool>,
    pub original_selector: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn element_type(mut self, element_type: impl Into<String>) -> Self {
        self.element_type = Some(element_type.into());
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    pub fn original_selector(mut self, selector: impl Into<String>) -> Self {
        self.original_selector = Some(selector.into());
        self
    }

    pub fn since(mut self, ts: DateTime<Utc>) -> Self {
        self.since = Some(ts);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches_common(
        &self,
        timestamp: &DateTime<Utc>,
        element_type: Option<&str>,
        original_selector: &str,
        success: bool,
    ) -> bool {
        if let Some(since) = &self.since {
            if timestamp < since {
                return false;
            }
        }
        if let Some(expected) = &self.element_type {
            if element_type != Some(expected.as_str()) {
                return false;
            }
        }
        if let Some(expected) = &self.original_selector {
            if original_selector != expected {
                return false;
            }
        }
        self.success.map(|s| s == success).unwrap_or(true)
    }

    /// A run matches a strategy filter when it healed with that strategy
    pub fn matches_event(&self, event: &HealingEvent) -> bool {
        if let Some(strategy) = self.strategy {
            if event.strategy != Some(strategy) {
                return false;
            }
        }
        self.matches_common(
            &event.timestamp,
            event.element_type.as_deref(),
            &event.original_selector,
            event.success,
        )
    }

    pub fn matches_attempt(&self, attempt: &HealingAttempt) -> bool {
        if let Some(strategy) = self.strategy {
            if attempt.strategy != strategy {
                return false;
            }
        }
        self.matches_common(
            &attempt.timestamp,
            attempt.element_type.as_deref(),
            &attempt.original_selector,
            attempt.success,
        )
    }
}

#[derive(Debug)]
struct Ring<T> {
    capacity: usize,
    queue: Mutex<VecDeque<T>>,
}

impl<T: Clone> Ring<T> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
        }
    }

    fn push(&self, item: T) {
        let mut guard = self.queue.lock();
        if self.capacity == 0 {
            return;
        }
        while guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(item);
    }

    fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Newest matches, returned oldest first
    fn collect_tail(&self, limit: Option<usize>, keep: impl Fn(&T) -> bool) -> Vec<T> {
        let guard = self.queue.lock();
        let limit = limit.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        for item in guard.iter().rev() {
            if out.len() == limit {
                break;
            }
            if keep(item) {
                out.push(item.clone());
            }
        }
        out.reverse();
        out
    }

    fn clear(&self) {
        self.queue.lock().clear();
    }
}

/// In-memory history of healing runs and strategy attempts
#[derive(Debug)]
pub struct HealingLog {
    events: Ring<HealingEvent>,
    attempts: Ring<HealingAttempt>,
}

impl Default for HealingLog {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HealingLog {
    /// Create a log keeping at most `capacity` runs and `capacity` attempts
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Ring::new(capacity),
            attempts: Ring::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.events.capacity
    }

    pub fn record_event(&self, event: HealingEvent) {
        self.events.push(event);
    }

    pub fn record_attempt(&self, attempt: HealingAttempt) {
        self.attempts.push(attempt);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// Runs matching `filter`, oldest first
    pub fn history(&self, filter: &HistoryFilter) -> Vec<HealingEvent> {
        self.events
            .collect_tail(filter.limit, |event| filter.matches_event(event))
    }

    /// Strategy attempts matching `filter`, oldest first
    pub fn attempts(&self, filter: &HistoryFilter) -> Vec<HealingAttempt> {
        self.attempts
            .collect_tail(filter.limit, |attempt| filter.matches_attempt(attempt))
    }

    /// Share of matching runs that healed; 0.0 when nothing matches.
    ///
    /// With a strategy filter the rate is computed over that strategy's
    /// attempts, since a run only names the strategy that won.
    pub fn success_rate(&self, filter: &HistoryFilter) -> f64 {
        let outcomes: Vec<bool> = if filter.strategy.is_some() {
            self.attempts(filter).iter().map(|a| a.success).collect()
        } else {
            self.history(filter).iter().map(|e| e.success).collect()
        };
        if outcomes.is_empty() {
            return 0.0;
        }
        outcomes.iter().filter(|s| **s).count() as f64 / outcomes.len() as f64
    }

    pub fn clear(&self) {
        self.events.clear();
        self.attempts.clear();
    }
}

impl HealingObserver for HealingLog {
    fn on_attempt(&self, attempt: &HealingAttempt) {
        self.record_attempt(attempt.clone());
    }

    fn on_event(&self, event: &HealingEvent) {
        self.record_event(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use selfheal_core_types::RunId;

    fn event(selector: &str, element_type: &str, success: bool) -> HealingEvent {
        HealingEvent {
            run_id: RunId::new(),
            timestamp: Utc::now(),
            original_selector: selector.to_string(),
            element_type: Some(element_type.to_string()),
            success,
            strategy: success.then_some(StrategyKind::Css),
            new_selector: success.then(|| "css:#ok".to_string()),
            confidence: if success { 0.95 } else { 0.0 },
            strategies_tried: vec![StrategyKind::Css],
            alternatives: 0,
            duration_ms: 3,
            error: (!success).then(|| "no candidate matched".to_string()),
        }
    }

    fn attempt(strategy: StrategyKind, success: bool) -> HealingAttempt {
        HealingAttempt {
            run_id: RunId::new(),
            timestamp: Utc::now(),
            strategy,
            original_selector: "#gone".to_string(),
            element_type: Some("button".to_string()),
            candidates_generated: 3,
            candidates_validated: 1,
            selected: None,
            success,
            confidence: 0.0,
            duration_ms: 1,
            error: None,
        }
    }

    #[test]
    fn test_drops_oldest_when_full() {
        let log = HealingLog::new(3);
        for i in 0..5 {
            log.record_event(event(&format!("#e{}", i), "button", true));
        }
        assert_eq!(log.len(), 3);
        let history = log.history(&HistoryFilter::new());
        let selectors: Vec<_> = history.iter().map(|e| e.original_selector.as_str()).collect();
        assert_eq!(selectors, vec!["#e2", "#e3", "#e4"]);
    }

    #[test]
    fn test_filtered_history_with_limit() {
        let log = HealingLog::default();
        log.record_event(event("#a", "button", true));
        log.record_event(event("#b", "input", false));
        log.record_event(event("#c", "button", false));
        log.record_event(event("#d", "button", true));

        let buttons = log.history(&HistoryFilter::new().element_type("button"));
        assert_eq!(buttons.len(), 3);

        let latest = log.history(&HistoryFilter::new().element_type("button").limit(2));
        assert_eq!(latest[0].original_selector, "#c");
        assert_eq!(latest[1].original_selector, "#d");

        let failures = log.history(&HistoryFilter::new().success(false));
        assert_eq!(failures.len(), 2);
    }

    #[test]
    fn test_success_rate() {
        let log = HealingLog::default();
        assert_eq!(log.success_rate(&HistoryFilter::new()), 0.0);

        log.record_event(event("#a", "button", true));
        log.record_event(event("#b", "button", false));
        log.record_event(event("#c", "link", true));
        log.record_event(event("#d", "button", true));

        assert!((log.success_rate(&HistoryFilter::new()) - 0.75).abs() < 1e-9);
        let rate = log.success_rate(&HistoryFilter::new().element_type("button"));
        assert!((rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_strategy_rate_uses_attempts() {
        let log = HealingLog::default();
        log.on_attempt(&attempt(StrategyKind::Css, false));
        log.on_attempt(&attempt(StrategyKind::Xpath, true));
        log.on_attempt(&attempt(StrategyKind::Css, true));
        log.on_attempt(&attempt(StrategyKind::Css, false));

        let rate = log.success_rate(&HistoryFilter::new().strategy(StrategyKind::Css));
        assert!((rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(log.attempt_count(), 4);
    }

    #[test]
    fn test_concurrent_appends_stay_bounded() {
        let log = std::sync::Arc::new(HealingLog::new(50));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        log.record_event(event(&format!("#t{}-{}", t, i), "button", true));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.len(), 50);
    }
}
