//! Healing configuration
//!
//! Strategy order in `strategies` is execution order; a strategy that is
//! not listed is disabled. Each entry carries its own typed tuning.

use std::collections::{BTreeMap, BTreeSet};

use selfheal_core_types::{StrategyKind, DEFAULT_MAX_ALTERNATIVES};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use visual_match::MatchMethod;

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Strategy '{0}' is listed more than once")]
    DuplicateStrategy(StrategyKind),

    #[error("No healing strategy is enabled")]
    NoStrategies,

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn check_unit(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(field, format!("{} is outside [0, 1]", value)));
    }
    Ok(())
}

fn check_positive(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(invalid(field, "must be greater than zero"));
    }
    Ok(())
}

/// CSS generator tuning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CssSettings {
    /// Attributes allowed to seed candidates; empty allows all
    pub attribute_allow: Vec<String>,

    /// Attributes never used; wins over the allow-list
    pub attribute_deny: Vec<String>,
}

impl CssSettings {
    pub fn permits(&self, attribute: &str) -> bool {
        if self
            .attribute_deny
            .iter()
            .any(|a| a.eq_ignore_ascii_case(attribute))
        {
            return false;
        }
        self.attribute_allow.is_empty()
            || self
                .attribute_allow
                .iter()
                .any(|a| a.eq_ignore_ascii_case(attribute))
    }
}

/// XPath generator tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XpathSettings {
    /// Ancestors used in path expressions
    pub max_depth: usize,
}

impl Default for XpathSettings {
    fn default() -> Self {
        Self { max_depth: 5 }
    }
}

/// Text matcher tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSettings {
    /// Overrides the global `text_similarity_threshold`
    pub fuzzy_threshold: Option<f64>,

    /// Page texts kept from the fuzzy scan
    pub fuzzy_limit: usize,

    /// Multiplier applied to fuzzy similarity
    pub fuzzy_discount: f64,
}

impl Default for TextSettings {
    fn default() -> Self {
        Self {
            fuzzy_threshold: None,
            fuzzy_limit: 3,
            fuzzy_discount: 0.75,
        }
    }
}

/// Structural analyzer tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralSettings {
    pub max_parent_depth: usize,

    /// Minimum similarity for a page element to be considered
    pub min_similarity: f64,

    /// Accepted page elements expanded into selectors
    pub max_candidates: usize,

    /// Importance of each attribute; unlisted attributes use `default_weight`
    pub attribute_weights: BTreeMap<String, f64>,
    pub default_weight: f64,
}

impl Default for StructuralSettings {
    fn default() -> Self {
        let attribute_weights = [
            ("id", 1.0),
            ("data-testid", 0.95),
            ("data-test", 0.95),
            ("data-cy", 0.95),
            ("class", 0.8),
            ("name", 0.85),
            ("role", 0.75),
            ("aria-label", 0.75),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            max_parent_depth: 5,
            min_similarity: 0.6,
            max_candidates: 5,
            attribute_weights,
            default_weight: 0.5,
        }
    }
}

impl StructuralSettings {
    pub fn weight(&self, attribute: &str) -> f64 {
        self.attribute_weights
            .get(attribute)
            .copied()
            .unwrap_or(self.default_weight)
    }
}

/// Visual recognizer tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualSettings {
    /// Overrides the global `visual_similarity_threshold`
    pub threshold: Option<f64>,
    pub method: MatchMethod,
    pub iou_threshold: f64,
    pub max_detections: usize,
    pub max_regions: usize,

    /// Multiplier turning a match score into a selector confidence
    pub confidence_factor: f64,

    /// Upper bound on `page px * reference px` before downscaling
    pub search_budget: u64,
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            threshold: None,
            method: MatchMethod::default(),
            iou_threshold: 0.3,
            max_detections: 500,
            max_regions: 5,
            confidence_factor: 0.9,
            search_budget: 400_000_000,
        }
    }
}

/// One enabled strategy with its tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum StrategySettings {
    Css(CssSettings),
    Xpath(XpathSettings),
    Text(TextSettings),
    Structural(StructuralSettings),
    Visual(VisualSettings),
}

impl StrategySettings {
    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategySettings::Css(_) => StrategyKind::Css,
            StrategySettings::Xpath(_) => StrategyKind::Xpath,
            StrategySettings::Text(_) => StrategyKind::Text,
            StrategySettings::Structural(_) => StrategyKind::Structural,
            StrategySettings::Visual(_) => StrategyKind::Visual,
        }
    }

    /// Default tuning for a strategy
    pub fn defaults_for(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Css => StrategySettings::Css(CssSettings::default()),
            StrategyKind::Xpath => StrategySettings::Xpath(XpathSettings::default()),
            StrategyKind::Text => StrategySettings::Text(TextSettings::default()),
            StrategyKind::Structural => {
                StrategySettings::Structural(StructuralSettings::default())
            }
            StrategyKind::Visual => StrategySettings::Visual(VisualSettings::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            StrategySettings::Css(_) => Ok(()),
            StrategySettings::Xpath(s) => {
                check_positive("xpath.max_depth", s.max_depth as u64)
            }
            StrategySettings::Text(s) => {
                if let Some(t) = s.fuzzy_threshold {
                    check_unit("text.fuzzy_threshold", t)?;
                }
                check_unit("text.fuzzy_discount", s.fuzzy_discount)
            }
            StrategySettings::Structural(s) => {
                check_unit("structural.min_similarity", s.min_similarity)?;
                check_positive("structural.max_candidates", s.max_candidates as u64)?;
                for (name, weight) in &s.attribute_weights {
                    if !weight.is_finite() || *weight < 0.0 {
                        return Err(invalid(
                            &format!("structural.attribute_weights.{}", name),
                            format!("{} is not a non-negative number", weight),
                        ));
                    }
                }
                Ok(())
            }
            StrategySettings::Visual(s) => {
                if let Some(t) = s.threshold {
                    check_unit("visual.threshold", t)?;
                }
                check_unit("visual.iou_threshold", s.iou_threshold)?;
                check_unit("visual.confidence_factor", s.confidence_factor)?;
                check_positive("visual.max_regions", s.max_regions as u64)
            }
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealingConfig {
    /// Enabled strategies in execution order
    pub strategies: Vec<StrategySettings>,

    /// Candidates live-validated per strategy
    pub max_attempts: usize,

    /// Candidates below this are reported but never validated
    pub confidence_threshold: f64,

    /// Hard bound on a whole healing run
    pub timeout_ms: u64,

    /// Bound on each live validation query
    pub validation_timeout_ms: u64,

    pub visual_similarity_threshold: f64,
    pub text_similarity_threshold: f64,

    /// Allow capturing a fresh reference image from the live page
    pub enable_screenshots: bool,

    /// Allow describing elements on the live page to seed locations
    pub enable_dom_snapshots: bool,

    pub max_alternatives: usize,

    /// Runs and attempts kept in the in-memory history
    pub history_capacity: usize,
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            strategies: StrategyKind::default_order()
                .into_iter()
                .map(StrategySettings::defaults_for)
                .collect(),
            max_attempts: 10,
            confidence_threshold: 0.3,
            timeout_ms: 30_000,
            validation_timeout_ms: 250,
            visual_similarity_threshold: 0.8,
            text_similarity_threshold: 0.6,
            enable_screenshots: true,
            enable_dom_snapshots: true,
            max_alternatives: DEFAULT_MAX_ALTERNATIVES,
            history_capacity: 1000,
        }
    }
}

impl HealingConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let config: HealingConfig =
            serde_yaml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategies.is_empty() {
            return Err(ConfigError::NoStrategies);
        }
        let mut seen = BTreeSet::new();
        for settings in &self.strategies {
            if !seen.insert(settings.kind()) {
                return Err(ConfigError::DuplicateStrategy(settings.kind()));
            }
            settings.validate()?;
        }

        check_positive("max_attempts", self.max_attempts as u64)?;
        check_unit("confidence_threshold", self.confidence_threshold)?;
        check_positive("timeout_ms", self.timeout_ms)?;
        check_positive("validation_timeout_ms", self.validation_timeout_ms)?;
        check_unit(
            "visual_similarity_threshold",
            self.visual_similarity_threshold,
        )?;
        check_unit("text_similarity_threshold", self.text_similarity_threshold)?;
        check_positive("max_alternatives", self.max_alternatives as u64)?;
        Ok(())
    }

    /// Enabled strategies in execution order
    pub fn strategy_order(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(StrategySettings::kind).collect()
    }

    /// Keep only the listed strategies, in the given order, with default
    /// tuning for any not already configured
    pub fn with_strategies(mut self, order: &[StrategyKind]) -> Self {
        let mut existing = std::mem::take(&mut self.strategies);
        self.strategies = order
            .iter()
            .map(|kind| {
                existing
                    .iter()
                    .position(|s| s.kind() == *kind)
                    .map(|i| existing.remove(i))
                    .unwrap_or_else(|| StrategySettings::defaults_for(*kind))
            })
            .collect();
        self
    }

    pub fn settings(&self, kind: StrategyKind) -> Option<&StrategySettings> {
        self.strategies.iter().find(|s| s.kind() == kind)
    }

    /// CSS tuning, also used for selectors derived by other strategies
    pub fn css_settings(&self) -> CssSettings {
        match self.settings(StrategyKind::Css) {
            Some(StrategySettings::Css(css)) => css.clone(),
            _ => CssSettings::default(),
        }
    }
}
