//! Descriptive element snapshots

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::escape::css_ident;

/// Axis-aligned rectangle in page CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    /// Intersection-over-union of two boxes, 0.0 when disjoint
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        if right <= left || bottom <= top {
            return 0.0;
        }
        let intersection = (right - left) * (bottom - top);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// One ancestor in an element's parent chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorNode {
    pub tag: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    /// 1-based position among same-tag siblings
    #[serde(default = "first_position")]
    pub index: usize,
}

fn first_position() -> usize {
    1
}

impl AncestorNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            id: None,
            classes: Vec::new(),
            index: 1,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes = classes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index.max(1);
        self
    }

    /// `tag#id`, else `tag.class.class`, else the bare tag
    pub fn css_fragment(&self) -> String {
        if let Some(id) = self.id.as_deref().filter(|id| !id.trim().is_empty()) {
            return format!("{}#{}", self.tag, css_ident(id));
        }
        let mut fragment = self.tag.clone();
        for class in self.classes.iter().filter(|c| !c.is_empty()) {
            fragment.push('.');
            fragment.push_str(&css_ident(class));
        }
        fragment
    }

    pub fn is_identifiable(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.trim().is_empty()) || !self.classes.is_empty()
    }
}

/// Position of an element among its same-tag siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiblingPosition {
    /// 1-based
    pub index: usize,
    pub count: usize,
    #[serde(default)]
    pub child_count: usize,
}

impl SiblingPosition {
    pub fn new(index: usize, count: usize, child_count: usize) -> Self {
        let index = index.max(1);
        Self {
            index,
            count: count.max(index),
            child_count,
        }
    }

    pub fn is_first(&self) -> bool {
        self.index == 1
    }

    pub fn is_last(&self) -> bool {
        self.index == self.count
    }
}

/// Descriptive snapshot of one element.
///
/// Page queries return these and strategies consume them. Since no live
/// handle is held, a location captured in one run can seed healing in a
/// later one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementLocation {
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
    /// Nearest ancestor first
    #[serde(default)]
    pub ancestors: Vec<AncestorNode>,
    #[serde(default)]
    pub position: Option<SiblingPosition>,
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
    #[serde(default)]
    pub perceptual_hash: Option<u64>,
}

impl ElementLocation {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_bounding_box(mut self, bbox: BoundingBox) -> Self {
        self.bounding_box = Some(bbox);
        self
    }

    pub fn with_ancestors(mut self, ancestors: Vec<AncestorNode>) -> Self {
        self.ancestors = ancestors;
        self
    }

    pub fn with_position(mut self, position: SiblingPosition) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles.insert(property.into(), value.into());
        self
    }

    pub fn with_perceptual_hash(mut self, hash: u64) -> Self {
        self.perceptual_hash = Some(hash);
        self
    }

    /// Non-empty attribute value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attributes
            .get("class")
            .map(|value| value.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Trimmed, non-empty text content
    pub fn text_content(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// CSS fragments of the ancestor chain, nearest first
    pub fn ancestor_selectors(&self) -> Vec<String> {
        self.ancestors.iter().map(AncestorNode::css_fragment).collect()
    }

    pub fn child_count(&self) -> usize {
        self.position.map(|p| p.child_count).unwrap_or(0)
    }

    /// True when nothing identifying survives: no attributes, no text and no
    /// ancestry to anchor on.
    pub fn is_anonymous(&self) -> bool {
        self.attributes.values().all(|v| v.trim().is_empty())
            && self.text_content().is_none()
            && self.ancestors.is_empty()
    }
}
