//! Visual recognizer
//!
//! Last resort when the DOM no longer describes the element: find where
//! its reference image appears in a fresh page screenshot, then ask the
//! page which element sits under each match.

use async_trait::async_trait;
use selfheal_core_types::escape::{css_ident, xpath_literal};
use selfheal_core_types::{rank_selectors, ElementLocation, ElementSelector, StrategyKind};
use serde_json::Value;
use tracing::debug;
use visual_match::decode::{crop, decode};
use visual_match::{
    hash_similarity, perceptual_hash, ImageSimilarity, MatchOptions, Region, TemplateMatcher,
    VisualError,
};

use super::css::lowercase_tag;
use super::xpath::indexed_step;
use super::HealingStrategy;
use crate::config::VisualSettings;
use crate::context::HealingContext;
use crate::errors::HealError;
use crate::page::soften;

/// XPath synthesized from a visual match is trusted slightly less
const XPATH_FACTOR: f64 = 0.95;

/// One retained template match
#[derive(Debug, Clone)]
pub struct VisualMatch {
    pub region: Region,

    /// Tri-modal similarity of the reference and the matched crop
    pub image_similarity: f64,
    pub perceptual_hash: u64,
}

fn failure(reason: &str) -> HealError {
    HealError::VisualRecognitionFailure(reason.to_string())
}

/// `#id`, else `tag.class...`; `None` for an element with neither
pub fn css_for(element: &ElementLocation) -> Option<String> {
    if let Some(id) = element.id() {
        return Some(format!("#{}", css_ident(id)));
    }
    let classes = element.classes();
    if classes.is_empty() {
        return None;
    }
    let mut selector = lowercase_tag(element);
    for class in classes {
        selector.push('.');
        selector.push_str(&css_ident(class));
    }
    Some(selector)
}

/// `//*[@id=..]`, else an indexed path through the ancestor chain
pub fn xpath_for(element: &ElementLocation) -> String {
    if let Some(id) = element.id() {
        return format!("//*[@id={}]", xpath_literal(id));
    }
    let mut steps: Vec<String> = element
        .ancestors
        .iter()
        .rev()
        .map(|a| indexed_step(&a.tag, a.index))
        .collect();
    steps.push(indexed_step(
        &lowercase_tag(element),
        element.position.map(|p| p.index).unwrap_or(1),
    ));
    let rooted = element.ancestors.last().map(|a| a.tag.as_str()) == Some("html");
    format!("{}{}", if rooted { "/" } else { "//" }, steps.join("/"))
}

/// Visual template-matching strategy
#[derive(Debug, Clone)]
pub struct VisualRecognizer {
    settings: VisualSettings,
    threshold: f64,
    capture_reference: bool,
}

impl VisualRecognizer {
    /// `threshold` is the match cut-off unless the settings override it.
    /// With `capture_reference` off, a reference image must be supplied.
    pub fn new(settings: VisualSettings, threshold: f64, capture_reference: bool) -> Self {
        let threshold = settings.threshold.unwrap_or(threshold);
        Self {
            settings,
            threshold,
            capture_reference,
        }
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            threshold: self.threshold,
            method: self.settings.method,
            iou_threshold: self.settings.iou_threshold,
            max_detections: self.settings.max_detections,
            max_regions: self.settings.max_regions,
            search_budget: self.settings.search_budget,
        }
    }

    /// Supplied reference, else a capture of the original selector's box
    async fn reference_image(&self, ctx: &HealingContext) -> Result<Vec<u8>, HealError> {
        if let Some(image) = ctx.reference_screenshot.as_ref().filter(|i| !i.is_empty()) {
            return Ok(image.clone());
        }
        if !self.capture_reference {
            return Err(failure("no reference image available"));
        }

        let clip = soften(
            ctx.page.bounding_box(&ctx.original_selector).await,
            "bounding_box",
        )?;
        let Some(clip) = clip.filter(|b| b.width > 0.0 && b.height > 0.0) else {
            return Err(failure("no reference image available"));
        };
        let image = soften(ctx.page.screenshot(Some(clip)).await, "reference capture")?;
        if image.is_empty() {
            return Err(failure("no reference image available"));
        }
        debug!("Captured reference image from original selector");
        Ok(image)
    }

    /// Match `reference` inside `page`, both encoded. CPU bound.
    pub fn find_matches(
        &self,
        page: &[u8],
        reference: &[u8],
    ) -> Result<Vec<VisualMatch>, VisualError> {
        let page = decode(page)?;
        let template = decode(reference)?;
        let regions = TemplateMatcher::new(self.match_options()).find(&page, &template)?;

        let scorer = ImageSimilarity::default();
        regions
            .into_iter()
            .map(|region| -> Result<VisualMatch, VisualError> {
                let matched = crop(&page, &region.bounding_box())?;
                Ok(VisualMatch {
                    region,
                    image_similarity: scorer.compare(&template, &matched).combined,
                    perceptual_hash: perceptual_hash(&matched),
                })
            })
            .collect()
    }

    fn selectors_for(
        &self,
        found: &VisualMatch,
        element: &ElementLocation,
        known_hash: Option<u64>,
    ) -> Vec<ElementSelector> {
        let base = found.region.score * self.settings.confidence_factor;
        let annotate = |selector: ElementSelector| {
            let mut selector = selector
                .with_metadata("source", "visual")
                .with_metadata("match_score", found.region.score)
                .with_metadata(
                    "region",
                    serde_json::to_value(found.region).unwrap_or(Value::Null),
                )
                .with_metadata("image_similarity", found.image_similarity)
                .with_metadata("perceptual_hash", found.perceptual_hash);
            if let Some(hash) = known_hash {
                selector = selector
                    .with_metadata("hash_similarity", hash_similarity(hash, found.perceptual_hash));
            }
            selector
        };

        let mut out = Vec::new();
        if let Some(css) = css_for(element) {
            out.push(annotate(ElementSelector::css(css, base)));
        }
        out.push(annotate(ElementSelector::xpath(
            xpath_for(element),
            base * XPATH_FACTOR,
        )));
        out
    }
}

#[async_trait]
impl HealingStrategy for VisualRecognizer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Visual
    }

    async fn candidates(
        &self,
        ctx: &HealingContext,
        location: Option<&ElementLocation>,
    ) -> Result<Vec<ElementSelector>, HealError> {
        let reference = self.reference_image(ctx).await?;
        let screenshot = match ctx.page.screenshot(None).await {
            Ok(bytes) => bytes,
            Err(err) if err.is_fatal() => return Err(err.into()),
            Err(err) => return Err(failure(&format!("page screenshot failed: {}", err))),
        };

        let recognizer = self.clone();
        let matches = tokio::task::spawn_blocking(move || {
            recognizer.find_matches(&screenshot, &reference)
        })
        .await
        .map_err(|e| HealError::Internal(format!("visual matching task failed: {}", e)))?
        .map_err(|e| HealError::VisualRecognitionFailure(e.to_string()))?;

        if matches.is_empty() {
            return Err(failure("no visually similar elements found"));
        }
        debug!("Template matching retained {} regions", matches.len());

        let known_hash = location.and_then(|l| l.perceptual_hash);
        let mut candidates = Vec::new();
        for found in &matches {
            let (x, y) = found.region.center();
            let element = soften(ctx.page.element_at_point(x, y).await, "element_at_point")?;
            match element {
                Some(element) => candidates.extend(self.selectors_for(found, &element, known_hash)),
                None => debug!("No element under match centre ({:.0}, {:.0})", x, y),
            }
        }

        if candidates.is_empty() {
            return Err(failure("match found but no selector could be synthesized"));
        }
        Ok(rank_selectors(candidates))
    }

    fn unmatched_error(&self, _generated: usize, _tried: usize) -> HealError {
        failure("match found but no selector could be validated")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use selfheal_core_types::{AncestorNode, SiblingPosition};

    #[test]
    fn test_css_synthesis() {
        let with_id = ElementLocation::new("button").with_attribute("id", "buy");
        assert_eq!(css_for(&with_id).as_deref(), Some("#buy"));

        let with_classes = ElementLocation::new("DIV").with_attribute("class", "card featured");
        assert_eq!(css_for(&with_classes).as_deref(), Some("div.card.featured"));

        assert_eq!(css_for(&ElementLocation::new("span")), None);
    }

    #[test]
    fn test_xpath_synthesis() {
        let with_id = ElementLocation::new("button").with_attribute("id", "buy");
        assert_eq!(xpath_for(&with_id), "//*[@id='buy']");

        let rooted = ElementLocation::new("img")
            .with_ancestors(vec![
                AncestorNode::new("div").with_index(3),
                AncestorNode::new("body"),
                AncestorNode::new("html"),
            ])
            .with_position(SiblingPosition::new(2, 2, 0));
        assert_eq!(xpath_for(&rooted), "/html/body/div[3]/img[2]");

        let partial = ElementLocation::new("a").with_ancestors(vec![AncestorNode::new("li")]);
        assert_eq!(xpath_for(&partial), "//li/a");
    }

    #[test]
    fn test_settings_override_threshold() {
        let recognizer = VisualRecognizer::new(
            VisualSettings {
                threshold: Some(0.95),
                ..VisualSettings::default()
            },
            0.8,
            true,
        );
        assert_eq!(recognizer.match_options().threshold, 0.95);
        let recognizer = VisualRecognizer::new(VisualSettings::default(), 0.7, true);
        assert_eq!(recognizer.match_options().threshold, 0.7);
    }

    #[test]
    fn test_confidence_is_score_times_factor() {
        let recognizer = VisualRecognizer::new(VisualSettings::default(), 0.8, true);
        let found = VisualMatch {
            region: Region {
                x: 10,
                y: 20,
                width: 30,
                height: 10,
                score: 0.9,
            },
            image_similarity: 0.97,
            perceptual_hash: 0xff,
        };
        let element = ElementLocation::new("button").with_attribute("id", "buy");
        let selectors = recognizer.selectors_for(&found, &element, Some(0xff));
        assert!((selectors[0].confidence - 0.81).abs() < 1e-9);
        assert!((selectors[1].confidence - 0.81 * 0.95).abs() < 1e-9);
        assert_eq!(selectors[0].metadata["match_score"], serde_json::json!(0.9));
        assert_eq!(selectors[0].metadata["hash_similarity"], serde_json::json!(1.0));
        assert_eq!(selectors[0].metadata["region"]["width"], serde_json::json!(30));
    }
}
