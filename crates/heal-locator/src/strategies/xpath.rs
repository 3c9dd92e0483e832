//! XPath alternative generator
//!
//! Mirrors the CSS tiers and adds what only XPath can express: text
//! predicates and sibling axes. Every expression goes through
//! [`optimize_xpath`] and is then penalized for brittleness.

use async_trait::async_trait;
use selfheal_core_types::escape::xpath_literal;
use selfheal_core_types::{
    rank_selectors, AncestorNode, ElementLocation, ElementSelector, StrategyKind,
};
use tracing::debug;

use super::css::{attribute_tier, lowercase_tag, tier, value_stem, AttributeTier, TEST_ATTRIBUTES};
use super::{require_location, HealingStrategy};
use crate::config::XpathSettings;
use crate::context::HealingContext;
use crate::errors::HealError;
use crate::similarity::significant_words;

const TEXT_EXACT: f64 = 0.75;
const TEXT_NORMALIZED: f64 = 0.72;
const TEXT_CONTAINS: f64 = 0.65;
const TEXT_PARTIAL: f64 = 0.55;
const SIBLING: f64 = 0.40;

/// Text longer than this also gets word-level partial expressions
const LONG_TEXT_CHARS: usize = 30;
const MAX_TEXT_CHARS: usize = 200;
const PARTIAL_WORDS: usize = 3;

const ABSOLUTE_PENALTY: f64 = 0.6;
const PREDICATE_PENALTY: f64 = 0.8;
const MAX_PREDICATES: usize = 3;

/// Simplify an expression without changing what it selects in practice.
///
/// Redundant descendant steps collapse into `//`, and a trailing `[1]` is
/// dropped when the step it filters is already anchored on a unique
/// attribute.
pub fn optimize_xpath(expression: &str) -> String {
    let mut out = expression.replace("/descendant-or-self::node()/", "//");
    loop {
        let next = out.replace("//*//", "//").replace("////", "//");
        if next == out {
            break;
        }
        out = next;
    }
    strip_redundant_first(out)
}

fn strip_redundant_first(expression: String) -> String {
    let Some(head) = expression.strip_suffix("[1]") else {
        return expression;
    };
    let grouped = head
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .filter(|_| is_single_group(head));
    match grouped {
        Some(inner) if final_step_anchored(inner) => inner.to_string(),
        None if final_step_anchored(head) => head.to_string(),
        _ => expression,
    }
}

/// Blank out quoted literal contents, keeping byte offsets and the quotes
fn mask_literals(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut quote: Option<char> = None;
    for ch in expression.chars() {
        match quote {
            Some(q) if ch == q => {
                quote = None;
                out.push(ch);
            }
            Some(_) => out.extend(std::iter::repeat('_').take(ch.len_utf8())),
            None => {
                if ch == '\'' || ch == '"' {
                    quote = Some(ch);
                }
                out.push(ch);
            }
        }
    }
    out
}

/// `(..)` whose opening paren closes at the very end
fn is_single_group(expression: &str) -> bool {
    let masked = mask_literals(expression);
    let mut depth = 0usize;
    for (i, ch) in masked.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i + 1 == masked.len();
                }
            }
            _ => {}
        }
    }
    false
}

/// Whether the last location step carries an id or test attribute predicate
fn final_step_anchored(expression: &str) -> bool {
    let masked = mask_literals(expression);
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in masked.char_indices() {
        match ch {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => start = i + 1,
            _ => {}
        }
    }
    let step = &masked[start..];
    step.contains("@id=")
        || TEST_ATTRIBUTES
            .iter()
            .any(|attr| step.contains(&format!("@{}=", attr)))
}

/// Bracketed predicates plus `and` conjunctions, outside literals
fn predicate_count(expression: &str) -> usize {
    let masked = mask_literals(expression);
    masked.matches('[').count() + masked.matches(" and ").count()
}

/// Base confidence scaled down for absolute paths and long predicate lists
pub fn penalized_confidence(expression: &str, base: f64) -> f64 {
    let mut confidence = base;
    if expression.starts_with("/html") {
        confidence *= ABSOLUTE_PENALTY;
    }
    if predicate_count(expression) > MAX_PREDICATES {
        confidence *= PREDICATE_PENALTY;
    }
    confidence
}

fn class_predicate(class: &str) -> String {
    format!("contains(@class,{})", xpath_literal(class))
}

/// `tag[@id=..]`, else `tag[contains(@class,..)]`, else the bare tag
fn ancestor_step(ancestor: &AncestorNode) -> String {
    if let Some(id) = ancestor.id.as_deref().filter(|id| !id.trim().is_empty()) {
        return format!("{}[@id={}]", ancestor.tag, xpath_literal(id));
    }
    match ancestor.classes.first() {
        Some(class) => format!("{}[{}]", ancestor.tag, class_predicate(class)),
        None => ancestor.tag.clone(),
    }
}

/// Pure XPath synthesis from an element description
#[derive(Debug, Clone, Default)]
pub struct XpathGenerator {
    settings: XpathSettings,
}

impl XpathGenerator {
    pub fn new(settings: XpathSettings) -> Self {
        Self { settings }
    }

    /// Ranked XPath candidates for `location`
    pub fn generate(&self, location: &ElementLocation) -> Vec<ElementSelector> {
        let tag = lowercase_tag(location);
        let mut raw: Vec<(String, f64)> = Vec::new();

        attribute_expressions(location, &tag, &mut raw);
        class_expressions(location, &tag, &mut raw);
        text_expressions(location, &tag, &mut raw);
        self.structural_expressions(location, &tag, &mut raw);

        let candidates = raw
            .into_iter()
            .map(|(expression, base)| {
                let expression = optimize_xpath(&expression);
                let confidence = penalized_confidence(&expression, base);
                ElementSelector::xpath(expression, confidence)
            })
            .collect();
        rank_selectors(candidates)
    }

    fn structural_expressions(
        &self,
        location: &ElementLocation,
        tag: &str,
        raw: &mut Vec<(String, f64)>,
    ) {
        let ancestors: Vec<&AncestorNode> = location
            .ancestors
            .iter()
            .take(self.settings.max_depth)
            .collect();

        if !ancestors.is_empty() {
            let mut steps: Vec<String> = ancestors.iter().map(|a| ancestor_step(a)).collect();
            steps.reverse();
            raw.push((format!("//{}/{}", steps.join("/"), tag), tier::ANCESTRY));

            if let Some(anchor) = ancestors.iter().find(|a| a.is_identifiable()) {
                raw.push((
                    format!("//{}//{}", ancestor_step(anchor), tag),
                    tier::ANCESTRY,
                ));
            }
        }

        let parent = ancestors
            .first()
            .map(|p| format!("//{}/", ancestor_step(p)))
            .unwrap_or_else(|| "//".to_string());

        if let Some(position) = location.position {
            if position.index > 1 {
                raw.push((
                    format!(
                        "{}{}[count(preceding-sibling::{})={}]",
                        parent,
                        tag,
                        tag,
                        position.index - 1
                    ),
                    SIBLING,
                ));
            }
            if position.is_first() {
                raw.push((format!("{}{}[1]", parent, tag), tier::POSITIONAL));
            }
            if position.is_last() {
                raw.push((format!("{}{}[last()]", parent, tag), tier::POSITIONAL));
            }
        }

        // A full chain up to <html> also yields an absolute path
        let rooted = location.ancestors.len() <= self.settings.max_depth
            && location.ancestors.last().map(|a| a.tag.as_str()) == Some("html");
        if rooted {
            let mut steps: Vec<String> = location
                .ancestors
                .iter()
                .rev()
                .map(|a| indexed_step(&a.tag, a.index))
                .collect();
            steps.push(indexed_step(
                tag,
                location.position.map(|p| p.index).unwrap_or(1),
            ));
            raw.push((format!("/{}", steps.join("/")), tier::ANCESTRY));
        }
    }
}

/// `tag[n]`, with the redundant `[1]` left out
pub(crate) fn indexed_step(tag: &str, index: usize) -> String {
    if index > 1 {
        format!("{}[{}]", tag, index)
    } else {
        tag.to_string()
    }
}

fn attribute_expressions(location: &ElementLocation, tag: &str, raw: &mut Vec<(String, f64)>) {
    for (name, value) in &location.attributes {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let literal = xpath_literal(value);
        let kind = attribute_tier(name, value);
        match kind {
            AttributeTier::Id => raw.push((format!("//*[@id={}]", literal), tier::ID)),
            AttributeTier::TestId => {
                raw.push((format!("//*[@{}={}]", name, literal), tier::TEST_ID))
            }
            AttributeTier::Naming => {
                raw.push((format!("//{}[@{}={}]", tag, name, literal), tier::NAMING))
            }
            AttributeTier::Aria => raw.push((format!("//*[@{}={}]", name, literal), tier::ARIA)),
            AttributeTier::Generic => {
                raw.push((
                    format!("//{}[@{}={}]", tag, name, literal),
                    tier::TAG_ATTRIBUTE,
                ));
                raw.push((format!("//*[@{}={}]", name, literal), tier::ATTRIBUTE));
            }
            AttributeTier::Skip => continue,
        }

        let stem_tier = matches!(kind, AttributeTier::Id | AttributeTier::TestId) || name == "name";
        if stem_tier {
            if let Some(stem) = value_stem(value) {
                raw.push((
                    format!("//{}[contains(@{},{})]", tag, name, xpath_literal(stem)),
                    tier::SUBSTRING,
                ));
            }
        }
    }
}

fn class_expressions(location: &ElementLocation, tag: &str, raw: &mut Vec<(String, f64)>) {
    let mut classes: Vec<&str> = Vec::new();
    for class in location.classes() {
        if !classes.contains(&class) {
            classes.push(class);
        }
    }

    if classes.len() >= 2 {
        let predicates: Vec<String> = classes.iter().map(|c| class_predicate(c)).collect();
        raw.push((
            format!("//{}[{}]", tag, predicates.join(" and ")),
            tier::CLASS_COMBINED,
        ));
    }
    for class in classes {
        raw.push((
            format!("//{}[{}]", tag, class_predicate(class)),
            tier::TAG_CLASS,
        ));
    }
}

fn text_expressions(location: &ElementLocation, tag: &str, raw: &mut Vec<(String, f64)>) {
    let Some(text) = location.text_content() else {
        return;
    };
    if text.chars().count() > MAX_TEXT_CHARS {
        return;
    }

    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    raw.push((
        format!("//{}[text()={}]", tag, xpath_literal(text)),
        TEXT_EXACT,
    ));
    raw.push((
        format!(
            "//{}[normalize-space(text())={}]",
            tag,
            xpath_literal(&normalized)
        ),
        TEXT_NORMALIZED,
    ));
    raw.push((
        format!("//{}[contains(text(),{})]", tag, xpath_literal(&normalized)),
        TEXT_CONTAINS,
    ));

    if text.chars().count() > LONG_TEXT_CHARS {
        let words = significant_words(&normalized);
        if !words.is_empty() {
            let predicates: Vec<String> = words
                .iter()
                .take(PARTIAL_WORDS)
                .map(|w| format!("contains(text(),{})", xpath_literal(w)))
                .collect();
            raw.push((
                format!("//{}[{}]", tag, predicates.join(" and ")),
                TEXT_PARTIAL,
            ));
        }
    }
}

/// XPath selector strategy
#[derive(Debug, Clone, Default)]
pub struct XpathStrategy {
    generator: XpathGenerator,
}

impl XpathStrategy {
    pub fn new(settings: XpathSettings) -> Self {
        Self {
            generator: XpathGenerator::new(settings),
        }
    }
}

#[async_trait]
impl HealingStrategy for XpathStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Xpath
    }

    async fn candidates(
        &self,
        ctx: &HealingContext,
        location: Option<&ElementLocation>,
    ) -> Result<Vec<ElementSelector>, HealError> {
        let location = require_location(location, ctx)?;
        let candidates = self.generator.generate(location);
        debug!("XPath generator produced {} candidates", candidates.len());
        if candidates.is_empty() {
            return Err(HealError::NoCandidatesGenerated(
                "no identifying attributes".to_string(),
            ));
        }
        Ok(candidates)
    }
}
