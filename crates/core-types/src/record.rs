//! Healing results and audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rank::cap_alternatives;
use crate::selector::{ElementSelector, Metadata, StrategyKind};
use crate::RunId;

/// Terminal outcome of a healing run (or of a single strategy within one)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealingResult {
    pub success: bool,
    pub new_selector: Option<ElementSelector>,
    pub strategy: Option<StrategyKind>,
    pub confidence: f64,
    /// Ranked, capped, never containing `new_selector`
    pub alternatives: Vec<ElementSelector>,
    #[serde(default)]
    pub strategies_tried: Vec<StrategyKind>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub metadata: Metadata,
    pub error: Option<String>,
}

impl HealingResult {
    /// Successful result for a live-validated selector.
    ///
    /// An empty selector can never count as healed, so it degrades to a
    /// failure instead.
    pub fn healed(
        strategy: StrategyKind,
        selector: ElementSelector,
        alternatives: Vec<ElementSelector>,
        max_alternatives: usize,
    ) -> Self {
        if selector.value.trim().is_empty() {
            return Self::failed(
                Some(strategy),
                "validated selector was empty",
                alternatives,
                max_alternatives,
            );
        }
        let alternatives = cap_alternatives(
            alternatives
                .into_iter()
                .filter(|alt| !(alt.kind == selector.kind && alt.value == selector.value))
                .collect(),
            max_alternatives,
        );
        Self {
            success: true,
            confidence: selector.confidence,
            new_selector: Some(selector),
            strategy: Some(strategy),
            alternatives,
            strategies_tried: vec![strategy],
            duration_ms: 0,
            metadata: Metadata::new(),
            error: None,
        }
    }

    pub fn failed(
        strategy: Option<StrategyKind>,
        error: impl Into<String>,
        alternatives: Vec<ElementSelector>,
        max_alternatives: usize,
    ) -> Self {
        Self {
            success: false,
            new_selector: None,
            strategy,
            confidence: 0.0,
            alternatives: cap_alternatives(alternatives, max_alternatives),
            strategies_tried: strategy.into_iter().collect(),
            duration_ms: 0,
            metadata: Metadata::new(),
            error: Some(error.into()),
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_strategies_tried(mut self, tried: Vec<StrategyKind>) -> Self {
        self.strategies_tried = tried;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn selector_value(&self) -> Option<&str> {
        self.new_selector.as_ref().map(|s| s.value.as_str())
    }
}

/// Audit record for one strategy attempt inside a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealingAttempt {
    pub run_id: RunId,
    pub timestamp: DateTime<Utc>,
    pub strategy: StrategyKind,
    pub original_selector: String,
    pub element_type: Option<String>,
    pub candidates_generated: usize,
    pub candidates_validated: usize,
    pub selected: Option<ElementSelector>,
    pub success: bool,
    pub confidence: f64,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Audit record for a whole healing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealingEvent {
    pub run_id: RunId,
    pub timestamp: DateTime<Utc>,
    pub original_selector: String,
    pub element_type: Option<String>,
    pub success: bool,
    pub strategy: Option<StrategyKind>,
    pub new_selector: Option<String>,
    pub confidence: f64,
    pub strategies_tried: Vec<StrategyKind>,
    pub alternatives: usize,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl HealingEvent {
    pub fn from_result(
        run_id: RunId,
        original_selector: impl Into<String>,
        element_type: Option<String>,
        result: &HealingResult,
    ) -> Self {
        Self {
            run_id,
            timestamp: Utc::now(),
            original_selector: original_selector.into(),
            element_type,
            success: result.success,
            strategy: result.strategy,
            new_selector: result.new_selector.as_ref().map(|s| s.to_string()),
            confidence: result.confidence,
            strategies_tried: result.strategies_tried.clone(),
            alternatives: result.alternatives.len(),
            duration_ms: result.duration_ms,
            error: result.error.clone(),
        }
    }
}
