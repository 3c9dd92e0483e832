//! CSS alternative generator
//!
//! Candidates are produced tier by tier from the element description, each
//! tier with a fixed base confidence. Values are escaped before they are
//! interpolated so a hostile id or class cannot break the selector.

use async_trait::async_trait;
use selfheal_core_types::escape::{css_ident, css_string};
use selfheal_core_types::{rank_selectors, ElementLocation, ElementSelector, StrategyKind};
use tracing::debug;

use super::{require_location, HealingStrategy};
use crate::config::CssSettings;
use crate::context::HealingContext;
use crate::errors::HealError;

/// Base confidences shared by the CSS, XPath and structural generators
pub mod tier {
    pub const ID: f64 = 0.95;
    pub const TEST_ID: f64 = 0.90;
    pub const NAMING: f64 = 0.85;
    pub const TAG_ATTRIBUTE: f64 = 0.80;
    pub const ATTRIBUTE: f64 = 0.75;
    pub const CLASS_COMBINED: f64 = 0.80;
    pub const TAG_CLASS: f64 = 0.75;
    pub const CLASS: f64 = 0.70;
    pub const ARIA: f64 = 0.75;
    pub const SUBSTRING: f64 = 0.65;
    pub const ANCESTRY: f64 = 0.50;
    pub const POSITIONAL: f64 = 0.30;
}

pub(crate) const TEST_ATTRIBUTES: [&str; 3] = ["data-testid", "data-test", "data-cy"];

/// Values longer than this are treated as content, not identity
const MAX_ATTRIBUTE_LEN: usize = 100;

/// Ancestors used for chain selectors
const CHAIN_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttributeTier {
    Id,
    TestId,
    Naming,
    Aria,
    Generic,
    Skip,
}

pub(crate) fn attribute_tier(name: &str, value: &str) -> AttributeTier {
    let valid_name = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid_name || value.chars().count() > MAX_ATTRIBUTE_LEN || value.contains('\n') {
        return AttributeTier::Skip;
    }
    match name {
        "id" => AttributeTier::Id,
        "class" | "style" => AttributeTier::Skip,
        "name" | "type" => AttributeTier::Naming,
        n if TEST_ATTRIBUTES.contains(&n) => AttributeTier::TestId,
        n if n.starts_with("aria-") => AttributeTier::Aria,
        n if n.starts_with("on") => AttributeTier::Skip,
        _ => AttributeTier::Generic,
    }
}

/// Stable prefix of a value with a generated suffix: `login-btn-4821` keeps
/// `login-btn`
pub(crate) fn value_stem(value: &str) -> Option<&str> {
    let stem = value
        .trim_end_matches(|c: char| c.is_ascii_digit())
        .trim_end_matches(['-', '_', ':']);
    if stem.chars().count() >= 3 && stem.len() < value.len() {
        Some(stem)
    } else {
        None
    }
}

pub(crate) fn lowercase_tag(location: &ElementLocation) -> String {
    let tag = location.tag.trim().to_ascii_lowercase();
    if tag.is_empty() {
        "*".to_string()
    } else {
        tag
    }
}

/// Pure CSS selector synthesis from an element description
#[derive(Debug, Clone, Default)]
pub struct CssGenerator {
    settings: CssSettings,
}

impl CssGenerator {
    pub fn new(settings: CssSettings) -> Self {
        Self { settings }
    }

    /// Ranked CSS candidates for `location`
    pub fn generate(&self, location: &ElementLocation) -> Vec<ElementSelector> {
        let tag = lowercase_tag(location);
        let mut out = Vec::new();

        self.attribute_candidates(location, &tag, &mut out);
        if self.settings.permits("class") {
            class_candidates(location, &tag, &mut out);
        }
        ancestry_candidates(location, &tag, &mut out);
        positional_candidates(location, &tag, &mut out);

        rank_selectors(out)
    }

    fn attribute_candidates(
        &self,
        location: &ElementLocation,
        tag: &str,
        out: &mut Vec<ElementSelector>,
    ) {
        for (name, value) in &location.attributes {
            let value = value.trim();
            if value.is_empty() || !self.settings.permits(name) {
                continue;
            }
            let quoted = css_string(value);
            let kind = attribute_tier(name, value);
            match kind {
                AttributeTier::Id => {
                    out.push(ElementSelector::css(format!("#{}", css_ident(value)), tier::ID));
                }
                AttributeTier::TestId => {
                    out.push(ElementSelector::css(
                        format!("[{}={}]", name, quoted),
                        tier::TEST_ID,
                    ));
                }
                AttributeTier::Naming => {
                    out.push(ElementSelector::css(
                        format!("{}[{}={}]", tag, name, quoted),
                        tier::NAMING,
                    ));
                }
                AttributeTier::Aria => {
                    out.push(ElementSelector::css(
                        format!("[{}={}]", name, quoted),
                        tier::ARIA,
                    ));
                }
                AttributeTier::Generic => {
                    out.push(ElementSelector::css(
                        format!("{}[{}={}]", tag, name, quoted),
                        tier::TAG_ATTRIBUTE,
                    ));
                    out.push(ElementSelector::css(
                        format!("[{}={}]", name, quoted),
                        tier::ATTRIBUTE,
                    ));
                }
                AttributeTier::Skip => continue,
            }

            let stem_tier =
                matches!(kind, AttributeTier::Id | AttributeTier::TestId) || name == "name";
            if stem_tier {
                if let Some(stem) = value_stem(value) {
                    out.push(ElementSelector::css(
                        format!("{}[{}*={}]", tag, name, css_string(stem)),
                        tier::SUBSTRING,
                    ));
                }
            }
        }
    }
}

fn class_candidates(location: &ElementLocation, tag: &str, out: &mut Vec<ElementSelector>) {
    let mut classes: Vec<&str> = Vec::new();
    for class in location.classes() {
        if !classes.contains(&class) {
            classes.push(class);
        }
    }

    if classes.len() >= 2 {
        let combined: String = classes
            .iter()
            .map(|c| format!(".{}", css_ident(c)))
            .collect();
        out.push(ElementSelector::css(combined, tier::CLASS_COMBINED));
    }
    for class in &classes {
        let ident = css_ident(class);
        out.push(ElementSelector::css(
            format!("{}.{}", tag, ident),
            tier::TAG_CLASS,
        ));
        out.push(ElementSelector::css(format!(".{}", ident), tier::CLASS));
    }
}

fn ancestry_candidates(location: &ElementLocation, tag: &str, out: &mut Vec<ElementSelector>) {
    if location.ancestors.is_empty() {
        return;
    }

    if let Some(anchor) = location
        .ancestors
        .iter()
        .take(CHAIN_DEPTH)
        .find(|a| a.is_identifiable())
    {
        out.push(ElementSelector::css(
            format!("{} {}", anchor.css_fragment(), tag),
            tier::ANCESTRY,
        ));
    }

    let mut chain: Vec<String> = location
        .ancestors
        .iter()
        .take(CHAIN_DEPTH)
        .map(|a| a.css_fragment())
        .collect();
    chain.reverse();
    chain.push(tag.to_string());
    out.push(ElementSelector::css(chain.join(" > "), tier::ANCESTRY));
}

fn positional_candidates(location: &ElementLocation, tag: &str, out: &mut Vec<ElementSelector>) {
    let Some(position) = location.position else {
        return;
    };
    let prefix = location
        .ancestors
        .first()
        .map(|parent| format!("{} > ", parent.css_fragment()))
        .unwrap_or_default();

    if position.is_first() {
        out.push(ElementSelector::css(
            format!("{}{}:first-child", prefix, tag),
            tier::POSITIONAL,
        ));
    }
    if position.is_last() {
        out.push(ElementSelector::css(
            format!("{}{}:last-child", prefix, tag),
            tier::POSITIONAL,
        ));
    }
}

/// CSS selector strategy
#[derive(Debug, Clone, Default)]
pub struct CssStrategy {
    generator: CssGenerator,
}

impl CssStrategy {
    pub fn new(settings: CssSettings) -> Self {
        Self {
            generator: CssGenerator::new(settings),
        }
    }
}

#[async_trait]
impl HealingStrategy for CssStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Css
    }

    async fn candidates(
        &self,
        ctx: &HealingContext,
        location: Option<&ElementLocation>,
    ) -> Result<Vec<ElementSelector>, HealError> {
        let location = require_location(location, ctx)?;
        let candidates = self.generator.generate(location);
        debug!("CSS generator produced {} candidates", candidates.len());
        if candidates.is_empty() {
            return Err(HealError::NoCandidatesGenerated(
                "no identifying attributes".to_string(),
            ));
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use selfheal_core_types::{is_ranked, AncestorNode, SiblingPosition};

    fn values(candidates: &[ElementSelector]) -> Vec<&str> {
        candidates.iter().map(|c| c.value.as_str()).collect()
    }

    fn find<'a>(candidates: &'a [ElementSelector], value: &str) -> &'a ElementSelector {
        candidates
            .iter()
            .find(|c| c.value == value)
            .unwrap_or_else(|| panic!("missing {} in {:?}", value, values(candidates)))
    }

    #[test]
    fn test_id_ranks_first() {
        let location = ElementLocation::new("button")
            .with_attribute("id", "login-btn")
            .with_attribute("class", "btn primary")
            .with_attribute("type", "submit");
        let candidates = CssGenerator::default().generate(&location);
        assert_eq!(candidates[0].value, "#login-btn");
        assert_eq!(candidates[0].confidence, 0.95);
        assert_eq!(find(&candidates, "button[type=\"submit\"]").confidence, 0.85);
        assert!(is_ranked(&candidates));
    }

    #[test]
    fn test_class_tiers() {
        let location =
            ElementLocation::new("button").with_attribute("class", "btn-primary btn-lg");
        let candidates = CssGenerator::default().generate(&location);
        assert_eq!(candidates[0].value, ".btn-primary.btn-lg");
        assert_eq!(candidates[0].confidence, 0.80);
        assert_eq!(find(&candidates, "button.btn-lg").confidence, 0.75);
        assert_eq!(find(&candidates, ".btn-primary").confidence, 0.70);
    }

    #[test]
    fn test_attribute_tiers() {
        let location = ElementLocation::new("a")
            .with_attribute("data-testid", "nav-home")
            .with_attribute("href", "/home")
            .with_attribute("aria-label", "Home")
            .with_attribute("onclick", "go()")
            .with_attribute("style", "color: red");
        let candidates = CssGenerator::default().generate(&location);
        assert_eq!(candidates[0].value, "[data-testid=\"nav-home\"]");
        assert_eq!(find(&candidates, "a[href=\"/home\"]").confidence, 0.80);
        assert_eq!(find(&candidates, "[href=\"/home\"]").confidence, 0.75);
        assert_eq!(find(&candidates, "[aria-label=\"Home\"]").confidence, 0.75);
        assert!(!candidates.iter().any(|c| c.value.contains("onclick")));
        assert!(!candidates.iter().any(|c| c.value.contains("style")));
    }

    #[test]
    fn test_substring_on_generated_suffix() {
        let location = ElementLocation::new("input").with_attribute("id", "email-4821");
        let candidates = CssGenerator::default().generate(&location);
        assert_eq!(find(&candidates, "input[id*=\"email\"]").confidence, 0.65);
    }

    #[test]
    fn test_escapes_special_characters() {
        let location = ElementLocation::new("div")
            .with_attribute("id", "1st:item")
            .with_attribute("title", "say \"hi\"");
        let candidates = CssGenerator::default().generate(&location);
        find(&candidates, "#\\31 st\\:item");
        find(&candidates, "div[title=\"say \\\"hi\\\"\"]");
    }

    #[test]
    fn test_ancestry_and_position() {
        let location = ElementLocation::new("li")
            .with_ancestors(vec![
                AncestorNode::new("ul"),
                AncestorNode::new("nav").with_id("main-nav"),
            ])
            .with_position(SiblingPosition::new(1, 4, 0));
        let candidates = CssGenerator::default().generate(&location);
        assert_eq!(find(&candidates, "nav#main-nav li").confidence, 0.50);
        assert_eq!(find(&candidates, "nav#main-nav > ul > li").confidence, 0.50);
        assert_eq!(find(&candidates, "ul > li:first-child").confidence, 0.30);
        assert!(!candidates.iter().any(|c| c.value.ends_with(":last-child")));
    }

    #[test]
    fn test_deny_list_filters_attributes() {
        let generator = CssGenerator::new(CssSettings {
            attribute_allow: Vec::new(),
            attribute_deny: vec!["id".into()],
        });
        let location = ElementLocation::new("button")
            .with_attribute("id", "login-btn")
            .with_attribute("name", "login");
        let candidates = generator.generate(&location);
        assert_eq!(candidates[0].value, "button[name=\"login\"]");
        assert!(!candidates.iter().any(|c| c.value.contains("login-btn")));
    }

    #[test]
    fn test_generation_is_idempotent() {
        let location = ElementLocation::new("button")
            .with_attribute("id", "save")
            .with_attribute("class", "a b c")
            .with_ancestors(vec![AncestorNode::new("form").with_classes(["checkout"])]);
        let generator = CssGenerator::default();
        assert_eq!(generator.generate(&location), generator.generate(&location));
    }

    #[test]
    fn test_anonymous_element_yields_nothing() {
        assert!(CssGenerator::default()
            .generate(&ElementLocation::new("span"))
            .is_empty());
    }
}
