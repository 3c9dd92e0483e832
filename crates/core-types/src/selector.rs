//! Selector and strategy identifiers

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ModelError;

/// Free-form diagnostics attached to selectors and results.
///
/// A `BTreeMap` keeps serialization order stable between runs.
pub type Metadata = BTreeMap<String, Value>;

/// Selector language understood by the page collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Css,
    Xpath,
    /// `text=<literal>` for an exact match, `text=/<regex>/i` for a
    /// case-insensitive pattern.
    Text,
    Visual,
    Structural,
}

impl SelectorKind {
    pub fn name(&self) -> &'static str {
        match self {
            SelectorKind::Css => "css",
            SelectorKind::Xpath => "xpath",
            SelectorKind::Text => "text",
            SelectorKind::Visual => "visual",
            SelectorKind::Structural => "structural",
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Healing strategy identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Css,
    Xpath,
    Text,
    Structural,
    Visual,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Css => "css",
            StrategyKind::Xpath => "xpath",
            StrategyKind::Text => "text",
            StrategyKind::Structural => "structural",
            StrategyKind::Visual => "visual",
        }
    }

    /// Cheapest-first execution order. Image work is the most expensive, so
    /// visual recognition always runs last.
    pub fn default_order() -> Vec<StrategyKind> {
        vec![
            StrategyKind::Css,
            StrategyKind::Xpath,
            StrategyKind::Text,
            StrategyKind::Structural,
            StrategyKind::Visual,
        ]
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Clamp a confidence into `[0, 1]`. NaN maps to zero.
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Candidate selector with a confidence score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSelector {
    pub kind: SelectorKind,
    pub value: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl ElementSelector {
    /// Create a selector, clamping the confidence into range
    pub fn new(kind: SelectorKind, value: impl Into<String>, confidence: f64) -> Self {
        Self {
            kind,
            value: value.into(),
            confidence: clamp_confidence(confidence),
            metadata: Metadata::new(),
        }
    }

    /// Strict constructor rejecting empty values and non-finite scores
    pub fn try_new(
        kind: SelectorKind,
        value: impl Into<String>,
        confidence: f64,
    ) -> Result<Self, ModelError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ModelError::EmptySelector);
        }
        if !confidence.is_finite() {
            return Err(ModelError::InvalidConfidence(confidence));
        }
        Ok(Self::new(kind, value, confidence))
    }

    pub fn css(value: impl Into<String>, confidence: f64) -> Self {
        Self::new(SelectorKind::Css, value, confidence)
    }

    pub fn xpath(value: impl Into<String>, confidence: f64) -> Self {
        Self::new(SelectorKind::Xpath, value, confidence)
    }

    pub fn text(value: impl Into<String>, confidence: f64) -> Self {
        Self::new(SelectorKind::Text, value, confidence)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Copy of this selector with its confidence multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        let mut scaled = self.clone();
        scaled.confidence = clamp_confidence(self.confidence * factor);
        scaled
    }

    /// Check if this is a high-confidence candidate (>= 0.8)
    pub fn is_high_confidence(&self) -> bool {
        self.confidence >= 0.8
    }

    pub fn meets(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }
}

impl fmt::Display for ElementSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(ElementSelector::css("#a", 1.7).confidence, 1.0);
        assert_eq!(ElementSelector::css("#a", -0.2).confidence, 0.0);
        assert_eq!(ElementSelector::css("#a", f64::NAN).confidence, 0.0);
    }

    #[test]
    fn test_try_new_rejects_empty() {
        assert_eq!(
            ElementSelector::try_new(SelectorKind::Css, "  ", 0.5),
            Err(ModelError::EmptySelector)
        );
        assert!(ElementSelector::try_new(SelectorKind::Css, "#ok", f64::INFINITY).is_err());
    }

    #[test]
    fn test_display_and_kind_names() {
        let selector = ElementSelector::xpath("//button", 0.5);
        assert_eq!(selector.to_string(), "xpath://button");
        assert_eq!(
            serde_json::to_string(&SelectorKind::Structural).unwrap(),
            "\"structural\""
        );
    }

    #[test]
    fn test_scaled_keeps_range() {
        let selector = ElementSelector::css(".a", 0.8).scaled(0.75);
        assert!((selector.confidence - 0.6).abs() < 1e-9);
        assert_eq!(ElementSelector::css(".a", 0.9).scaled(2.0).confidence, 1.0);
    }

    #[test]
    fn test_default_order_is_cheapest_first() {
        let order = StrategyKind::default_order();
        assert_eq!(order.first(), Some(&StrategyKind::Css));
        assert_eq!(order.last(), Some(&StrategyKind::Visual));
    }
}
