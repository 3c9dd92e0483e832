//! Structural analyzer
//!
//! Finds page elements that sit in the same place in the document and
//! look the same structurally, even after every identifying attribute
//! changed. Scores are weighted sums over whichever signals both sides
//! actually carry.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use selfheal_core_types::{
    rank_selectors, AncestorNode, ElementLocation, ElementSelector, StrategyKind,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::css::{lowercase_tag, CssGenerator};
use super::{require_location, HealingStrategy};
use crate::config::{CssSettings, StructuralSettings};
use crate::context::HealingContext;
use crate::errors::HealError;
use crate::page::soften;
use crate::similarity::text_similarity;

const TAG_WEIGHT: f64 = 1.0;
const ANCESTOR_WEIGHT: f64 = 0.5;
const CHILD_COUNT_WEIGHT: f64 = 0.3;
const TEXT_WEIGHT: f64 = 0.4;
const SIBLING_WEIGHT: f64 = 0.2;

/// Attributes too volatile to compare
const IGNORED_ATTRIBUTES: [&str; 1] = ["style"];

/// Structural snapshot of one element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralInfo {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,

    /// Nearest first, at most `max_parent_depth`
    pub ancestors: Vec<AncestorNode>,

    /// 1-based index among same-tag siblings
    pub sibling_index: Option<usize>,
    pub child_count: Option<usize>,
    pub text: Option<String>,
}

impl StructuralInfo {
    pub fn from_location(location: &ElementLocation, max_parent_depth: usize) -> Self {
        Self {
            tag: lowercase_tag(location),
            attributes: location
                .attributes
                .iter()
                .filter(|(name, value)| {
                    !value.trim().is_empty() && !IGNORED_ATTRIBUTES.contains(&name.as_str())
                })
                .map(|(name, value)| (name.clone(), value.trim().to_string()))
                .collect(),
            ancestors: location
                .ancestors
                .iter()
                .take(max_parent_depth)
                .cloned()
                .collect(),
            sibling_index: location.position.map(|p| p.index),
            child_count: location.position.map(|p| p.child_count),
            text: location.text_content().map(str::to_string),
        }
    }
}

fn class_set(value: &str) -> BTreeSet<&str> {
    value.split_whitespace().collect()
}

fn jaccard(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    a.intersection(b).count() as f64 / a.union(b).count() as f64
}

fn attribute_similarity(name: &str, a: &str, b: &str) -> f64 {
    if name == "class" {
        return jaccard(&class_set(a), &class_set(b));
    }
    if a == b {
        1.0
    } else {
        strsim::normalized_levenshtein(a, b)
    }
}

fn ancestor_match(a: &AncestorNode, b: &AncestorNode) -> f64 {
    if a.tag != b.tag {
        return 0.0;
    }
    if a.id.is_some() || b.id.is_some() {
        return if a.id == b.id { 1.0 } else { 0.5 };
    }
    if a.classes.is_empty() && b.classes.is_empty() {
        return 1.0;
    }
    let left: BTreeSet<&str> = a.classes.iter().map(String::as_str).collect();
    let right: BTreeSet<&str> = b.classes.iter().map(String::as_str).collect();
    0.5 + 0.5 * jaccard(&left, &right)
}

/// Nearest-outward comparison; level `i` carries weight `1 / (i + 1)`
fn ancestor_similarity(a: &[AncestorNode], b: &[AncestorNode]) -> f64 {
    let depth = a.len().max(b.len());
    let mut score = 0.0;
    let mut total = 0.0;
    for level in 0..depth {
        let decay = 1.0 / (level as f64 + 1.0);
        total += decay;
        if let (Some(x), Some(y)) = (a.get(level), b.get(level)) {
            score += decay * ancestor_match(x, y);
        }
    }
    if total == 0.0 {
        1.0
    } else {
        score / total
    }
}

/// Weighted structural similarity in `[0, 1]`
pub fn structural_similarity(
    target: &StructuralInfo,
    candidate: &StructuralInfo,
    settings: &StructuralSettings,
) -> f64 {
    let mut score = 0.0;
    let mut total = 0.0;

    total += TAG_WEIGHT;
    if target.tag == candidate.tag {
        score += TAG_WEIGHT;
    }

    let names: BTreeSet<&String> = target
        .attributes
        .keys()
        .chain(candidate.attributes.keys())
        .collect();
    for name in names {
        let weight = settings.weight(name);
        total += weight;
        if let (Some(a), Some(b)) = (target.attributes.get(name), candidate.attributes.get(name))
        {
            score += weight * attribute_similarity(name, a, b);
        }
    }

    if !target.ancestors.is_empty() || !candidate.ancestors.is_empty() {
        total += ANCESTOR_WEIGHT;
        score += ANCESTOR_WEIGHT * ancestor_similarity(&target.ancestors, &candidate.ancestors);
    }

    if let (Some(a), Some(b)) = (target.child_count, candidate.child_count) {
        let largest = a.max(b).max(1) as f64;
        total += CHILD_COUNT_WEIGHT;
        score += CHILD_COUNT_WEIGHT * (1.0 - a.abs_diff(b) as f64 / largest);
    }

    match (&target.text, &candidate.text) {
        (Some(a), Some(b)) => {
            total += TEXT_WEIGHT;
            score += TEXT_WEIGHT * text_similarity(a, b);
        }
        (Some(_), None) | (None, Some(_)) => total += TEXT_WEIGHT,
        (None, None) => {}
    }

    if let (Some(a), Some(b)) = (target.sibling_index, candidate.sibling_index) {
        total += SIBLING_WEIGHT;
        score += SIBLING_WEIGHT / (1.0 + a.abs_diff(b) as f64);
    }

    if total == 0.0 {
        0.0
    } else {
        (score / total).clamp(0.0, 1.0)
    }
}

/// Structural similarity strategy
#[derive(Debug, Clone)]
pub struct StructuralAnalyzer {
    settings: StructuralSettings,
    css: CssGenerator,
}

impl Default for StructuralAnalyzer {
    fn default() -> Self {
        Self::new(StructuralSettings::default())
    }
}

impl StructuralAnalyzer {
    pub fn new(settings: StructuralSettings) -> Self {
        Self {
            settings,
            css: CssGenerator::new(CssSettings::default()),
        }
    }

    /// Derive match selectors under the CSS strategy's attribute filters
    pub fn with_css_settings(mut self, css: CssSettings) -> Self {
        self.css = CssGenerator::new(css);
        self
    }

    /// Page elements at or above `min_similarity`, most similar first
    pub fn rank_elements<'a>(
        &self,
        target: &ElementLocation,
        page_elements: &'a [ElementLocation],
    ) -> Vec<(f64, &'a ElementLocation)> {
        let depth = self.settings.max_parent_depth;
        let target = StructuralInfo::from_location(target, depth);
        let mut accepted: Vec<(f64, &ElementLocation)> = page_elements
            .iter()
            .map(|element| {
                let info = StructuralInfo::from_location(element, depth);
                (structural_similarity(&target, &info, &self.settings), element)
            })
            .filter(|(similarity, _)| *similarity >= self.settings.min_similarity)
            .collect();
        accepted.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        accepted.truncate(self.settings.max_candidates);
        accepted
    }

    /// CSS tiers for each accepted element, scaled by its similarity
    pub fn selectors_for(&self, accepted: &[(f64, &ElementLocation)]) -> Vec<ElementSelector> {
        let mut out = Vec::new();
        for (similarity, element) in accepted {
            for selector in self.css.generate(element) {
                out.push(
                    selector
                        .scaled(*similarity)
                        .with_metadata("structural_similarity", *similarity),
                );
            }
        }
        rank_selectors(out)
    }
}

#[async_trait]
impl HealingStrategy for StructuralAnalyzer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Structural
    }

    async fn candidates(
        &self,
        ctx: &HealingContext,
        location: Option<&ElementLocation>,
    ) -> Result<Vec<ElementSelector>, HealError> {
        let target = require_location(location, ctx)?;
        let tag = lowercase_tag(target);
        let page_elements = soften(ctx.page.query_all(&tag).await, "query_all")?;

        let accepted = self.rank_elements(target, &page_elements);
        debug!(
            "Structural scan accepted {} of {} <{}> elements",
            accepted.len(),
            page_elements.len(),
            tag
        );
        if accepted.is_empty() {
            return Err(HealError::ElementNotFound(format!(
                "no structurally similar <{}> element on the page",
                tag
            )));
        }
        Ok(self.selectors_for(&accepted))
    }
}
