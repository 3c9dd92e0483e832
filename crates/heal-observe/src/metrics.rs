//! Success-rate metrics
//!
//! Strategy counters come from attempts, element-type counters come from
//! runs. Latency is tracked per key in an HDR histogram.

use std::collections::BTreeMap;

use dashmap::DashMap;
use hdrhistogram::Histogram;
use selfheal_core_types::{HealingAttempt, HealingEvent, StrategyKind};
use serde::{Deserialize, Serialize};

use crate::observer::HealingObserver;

const UNKNOWN_ELEMENT_TYPE: &str = "unknown";

/// Aggregated outcome counters for one key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuccessSummary {
    pub attempts: u64,
    pub successes: u64,
    pub success_rate: f64,

    /// Mean confidence over successful outcomes
    pub avg_confidence: f64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
}

struct StatEntry {
    attempts: u64,
    successes: u64,
    confidence_sum: f64,
    latency: Option<Histogram<u64>>,
}

impl StatEntry {
    fn new() -> Self {
        Self {
            attempts: 0,
            successes: 0,
            confidence_sum: 0.0,
            latency: Histogram::<u64>::new(3).ok(),
        }
    }

    fn record(&mut self, success: bool, confidence: f64, duration_ms: u64) {
        self.attempts += 1;
        if success {
            self.successes += 1;
            self.confidence_sum += confidence;
        }
        if let Some(hist) = self.latency.as_mut() {
            let _ = hist.record(duration_ms);
        }
    }

    fn summary(&self) -> SuccessSummary {
        let quantile = |q: f64| {
            self.latency
                .as_ref()
                .filter(|h| h.len() > 0)
                .map(|h| h.value_at_quantile(q))
                .unwrap_or(0)
        };
        SuccessSummary {
            attempts: self.attempts,
            successes: self.successes,
            success_rate: ratio(self.successes as f64, self.attempts),
            avg_confidence: ratio(self.confidence_sum, self.successes),
            p50_latency_ms: quantile(0.5),
            p95_latency_ms: quantile(0.95),
        }
    }
}

fn ratio(numerator: f64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

/// Metrics sink owned by one engine instance
#[derive(Default)]
pub struct MetricsCollector {
    strategies: DashMap<StrategyKind, StatEntry>,
    element_types: DashMap<String, StatEntry>,
    runs: DashMap<bool, u64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self, attempt: &HealingAttempt) {
        self.strategies
            .entry(attempt.strategy)
            .or_insert_with(StatEntry::new)
            .record(attempt.success, attempt.confidence, attempt.duration_ms);
    }

    pub fn record_event(&self, event: &HealingEvent) {
        let key = event
            .element_type
            .clone()
            .unwrap_or_else(|| UNKNOWN_ELEMENT_TYPE.to_string());
        self.element_types
            .entry(key)
            .or_insert_with(StatEntry::new)
            .record(event.success, event.confidence, event.duration_ms);
        *self.runs.entry(event.success).or_insert(0) += 1;
    }

    pub fn strategy_summary(&self, strategy: StrategyKind) -> Option<SuccessSummary> {
        self.strategies.get(&strategy).map(|entry| entry.summary())
    }

    /// Per-strategy summaries in execution-order naming
    pub fn strategy_summaries(&self) -> BTreeMap<String, SuccessSummary> {
        self.strategies
            .iter()
            .map(|entry| (entry.key().name().to_string(), entry.value().summary()))
            .collect()
    }

    pub fn element_type_summaries(&self) -> BTreeMap<String, SuccessSummary> {
        self.element_types
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().summary()))
            .collect()
    }

    pub fn total_runs(&self) -> u64 {
        self.runs.iter().map(|entry| *entry.value()).sum()
    }

    /// Share of healed runs across all element types
    pub fn overall_success_rate(&self) -> f64 {
        let healed = self.runs.get(&true).map(|v| *v).unwrap_or(0);
        ratio(healed as f64, self.total_runs())
    }

    pub fn reset(&self) {
        self.strategies.clear();
        self.element_types.clear();
        self.runs.clear();
    }

    /// Prometheus text exposition, sorted by metric and labels
    pub fn render_prometheus(&self) -> String {
        let mut output = String::new();

        for (healed, count) in self.runs_sorted() {
            output.push_str(&format!(
                "selfheal_runs_total{{success=\"{}\"}} {}\n",
                healed, count
            ));
        }
        for (name, summary) in self.strategy_summaries() {
            write_summary(&mut output, "strategy", &name, &summary);
        }
        for (name, summary) in self.element_type_summaries() {
            write_summary(&mut output, "element_type", &name, &summary);
        }

        output
    }

    fn runs_sorted(&self) -> BTreeMap<bool, u64> {
        self.runs
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }
}

fn write_summary(output: &mut String, label: &str, value: &str, summary: &SuccessSummary) {
    let labels = format!("{}=\"{}\"", label, value.replace('"', "\\\""));
    output.push_str(&format!(
        "selfheal_{}_attempts_total{{{}}} {}\n",
        label, labels, summary.attempts
    ));
    output.push_str(&format!(
        "selfheal_{}_successes_total{{{}}} {}\n",
        label, labels, summary.successes
    ));
    output.push_str(&format!(
        "selfheal_{}_success_rate{{{}}} {:.6}\n",
        label, labels, summary.success_rate
    ));
    for (q, v) in [(0.5, summary.p50_latency_ms), (0.95, summary.p95_latency_ms)] {
        output.push_str(&format!(
            "selfheal_{}_latency_ms{{{},quantile=\"{:.2}\"}} {}\n",
            label, labels, q, v
        ));
    }
}

impl HealingObserver for MetricsCollector {
    fn on_attempt(&self, attempt: &HealingAttempt) {
        self.record_attempt(attempt);
    }

    fn on_event(&self, event: &HealingEvent) {
        self.record_event(event);
    }
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("strategies", &self.strategies.len())
            .field("element_types", &self.element_types.len())
            .finish()
    }
}
