//! Text content matcher
//!
//! Visible text tends to survive refactors that rename ids and classes.
//! Candidates go from strict to loose: exact, case-insensitive, partial,
//! then a fuzzy scan of same-tag elements on the live page.

use async_trait::async_trait;
use selfheal_core_types::escape::{regex_literal, xpath_literal};
use selfheal_core_types::{
    rank_selectors, ElementLocation, ElementSelector, SelectorKind, StrategyKind,
};
use tracing::debug;

use super::css::lowercase_tag;
use super::HealingStrategy;
use crate::config::TextSettings;
use crate::context::HealingContext;
use crate::errors::HealError;
use crate::page::soften;
use crate::similarity::{normalize, significant_words, text_similarity};

const EXACT: f64 = 0.95;
const CASE_INSENSITIVE: f64 = 0.90;
const SUBSTRING: f64 = 0.80;
const SIGNIFICANT_WORD: f64 = 0.60;
const XPATH_NORMALIZED: f64 = 0.85;
const XPATH_CONTAINS: f64 = 0.70;

/// Substring matching only for text longer than this
const MIN_SUBSTRING_CHARS: usize = 5;
const SIGNIFICANT_WORDS: usize = 3;

const TEXT_PREFIX: &str = "text=";

/// Text the element is known by: the description first, then a text
/// selector that used to work
fn source_text<'a>(
    ctx: &'a HealingContext,
    location: Option<&'a ElementLocation>,
) -> Option<&'a str> {
    if let Some(text) = location.and_then(ElementLocation::text_content) {
        return Some(text);
    }
    let original = &ctx.original_selector;
    if original.kind != SelectorKind::Text {
        return None;
    }
    let value = original.value.strip_prefix(TEXT_PREFIX).unwrap_or(&original.value);
    let value = value.trim();
    // A regex form carries no literal text
    if value.is_empty() || value.starts_with('/') {
        None
    } else {
        Some(value)
    }
}

/// `text=<literal>`, or the anchored regex form when the literal would
/// read as a regex
fn exact_text(text: &str) -> String {
    if text.starts_with('/') {
        format!("{}/^{}$/i", TEXT_PREFIX, regex_literal(text))
    } else {
        format!("{}{}", TEXT_PREFIX, text)
    }
}

/// Text matching strategy
#[derive(Debug, Clone)]
pub struct TextMatcher {
    settings: TextSettings,
    threshold: f64,
}

impl TextMatcher {
    /// `threshold` is the fuzzy cut-off unless the settings override it
    pub fn new(settings: TextSettings, threshold: f64) -> Self {
        let threshold = settings.fuzzy_threshold.unwrap_or(threshold);
        Self {
            settings,
            threshold,
        }
    }

    /// Candidates derivable from the text alone, without the page
    pub fn text_candidates(&self, text: &str, tag: &str) -> Vec<ElementSelector> {
        let mut out = Vec::new();
        let escaped = regex_literal(text);

        out.push(ElementSelector::text(exact_text(text), EXACT));
        out.push(ElementSelector::text(
            format!("{}/^{}$/i", TEXT_PREFIX, escaped),
            CASE_INSENSITIVE,
        ));
        if text.chars().count() > MIN_SUBSTRING_CHARS {
            out.push(ElementSelector::text(
                format!("{}/{}/i", TEXT_PREFIX, escaped),
                SUBSTRING,
            ));
        }

        let words = significant_words(text);
        if words.len() > 1 {
            for word in words.iter().take(SIGNIFICANT_WORDS) {
                out.push(ElementSelector::text(
                    format!("{}/{}/i", TEXT_PREFIX, regex_literal(word)),
                    SIGNIFICANT_WORD,
                ));
            }
        }

        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        out.push(ElementSelector::xpath(
            format!(
                "//{}[normalize-space(text())={}]",
                tag,
                xpath_literal(&normalized)
            ),
            XPATH_NORMALIZED,
        ));
        out.push(ElementSelector::xpath(
            format!("//{}[contains(text(),{})]", tag, xpath_literal(&normalized)),
            XPATH_CONTAINS,
        ));
        out
    }

    /// Texts of same-tag page elements scored against `text`, best
    /// `fuzzy_limit` kept
    pub fn fuzzy_candidates(&self, text: &str, page_elements: &[ElementLocation]) -> Vec<ElementSelector> {
        let target = normalize(text);
        let mut scored: Vec<(f64, &str)> = Vec::new();
        for element in page_elements {
            let Some(candidate) = element.text_content() else {
                continue;
            };
            if scored.iter().any(|(_, seen)| *seen == candidate) {
                continue;
            }
            let similarity = text_similarity(&target, candidate);
            if similarity >= self.threshold {
                scored.push((similarity, candidate));
            }
        }
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.settings.fuzzy_limit);

        scored
            .into_iter()
            .map(|(similarity, candidate)| {
                ElementSelector::text(
                    exact_text(candidate),
                    similarity * self.settings.fuzzy_discount,
                )
                .with_metadata("text_similarity", similarity)
            })
            .collect()
    }
}

#[async_trait]
impl HealingStrategy for TextMatcher {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Text
    }

    async fn candidates(
        &self,
        ctx: &HealingContext,
        location: Option<&ElementLocation>,
    ) -> Result<Vec<ElementSelector>, HealError> {
        let Some(text) = source_text(ctx, location) else {
            return Err(HealError::NoCandidatesGenerated(
                "no text content available".to_string(),
            ));
        };
        let tag = location
            .map(lowercase_tag)
            .unwrap_or_else(|| "*".to_string());

        let mut candidates = self.text_candidates(text, &tag);

        if tag != "*" {
            let page_elements = soften(ctx.page.query_all(&tag).await, "query_all")?;
            let fuzzy = self.fuzzy_candidates(text, &page_elements);
            debug!(
                "Fuzzy text scan over {} <{}> elements kept {}",
                page_elements.len(),
                tag,
                fuzzy.len()
            );
            candidates.extend(fuzzy);
        }

        Ok(rank_selectors(candidates))
    }
}
