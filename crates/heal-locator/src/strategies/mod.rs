//! Healing strategies
//!
//! Five strategies in default (cheapest first) order:
//! 1. CSS - attribute, class and ancestry based CSS selectors
//! 2. XPath - the same tiers as XPath, plus text and sibling expressions
//! 3. Text - exact, case-insensitive, partial and fuzzy text selectors
//! 4. Structural - similar elements on the page by weighted structure
//! 5. Visual - template matching against a reference image
//!
//! A strategy only proposes candidates. Ranking, thresholding and live
//! validation are done by the engine so every strategy is held to the
//! same acceptance rule.

pub mod css;
pub mod structural;
pub mod text;
pub mod visual;
pub mod xpath;

use std::sync::Arc;

use async_trait::async_trait;
use selfheal_core_types::{ElementLocation, ElementSelector, StrategyKind};

use crate::config::{HealingConfig, StrategySettings};
use crate::context::HealingContext;
use crate::errors::HealError;

pub use css::{CssGenerator, CssStrategy};
pub use structural::{StructuralAnalyzer, StructuralInfo};
pub use text::TextMatcher;
pub use visual::VisualRecognizer;
pub use xpath::{optimize_xpath, XpathGenerator, XpathStrategy};

/// Strategy trait for selector healing
#[async_trait]
pub trait HealingStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Get strategy name
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Candidate selectors for the element, best first.
    ///
    /// `location` is the best available description of the element; `None`
    /// when neither a snapshot nor the original selector could supply one.
    async fn candidates(
        &self,
        ctx: &HealingContext,
        location: Option<&ElementLocation>,
    ) -> Result<Vec<ElementSelector>, HealError>;

    /// Error reported when candidates were built but none validated
    fn unmatched_error(&self, generated: usize, tried: usize) -> HealError {
        HealError::NoCandidateValidated { generated, tried }
    }
}

/// Build the configured strategies in execution order
pub fn build_strategies(config: &HealingConfig) -> Vec<Arc<dyn HealingStrategy>> {
    config
        .strategies
        .iter()
        .map(|settings| build_strategy(settings, config))
        .collect()
}

pub fn build_strategy(
    settings: &StrategySettings,
    config: &HealingConfig,
) -> Arc<dyn HealingStrategy> {
    match settings {
        StrategySettings::Css(css) => Arc::new(CssStrategy::new(css.clone())),
        StrategySettings::Xpath(xpath) => Arc::new(XpathStrategy::new(xpath.clone())),
        StrategySettings::Text(text) => Arc::new(TextMatcher::new(
            text.clone(),
            config.text_similarity_threshold,
        )),
        StrategySettings::Structural(structural) => {
            Arc::new(
                StructuralAnalyzer::new(structural.clone())
                    .with_css_settings(config.css_settings()),
            )
        }
        StrategySettings::Visual(visual) => Arc::new(VisualRecognizer::new(
            visual.clone(),
            config.visual_similarity_threshold,
            config.enable_screenshots,
        )),
    }
}

/// Location required by description-driven strategies
pub(crate) fn require_location<'a>(
    location: Option<&'a ElementLocation>,
    ctx: &HealingContext,
) -> Result<&'a ElementLocation, HealError> {
    location.ok_or_else(|| {
        HealError::ElementNotFound(format!(
            "no element description available for {}",
            ctx.original_selector
        ))
    })
}
