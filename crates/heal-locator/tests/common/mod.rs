//! Shared fixtures for the healing integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use heal_locator::{
    BoundingBox, ElementLocation, ElementSelector, HealError, HealingContext, HealingStrategy,
    PageError, PagePort, StrategyKind,
};
use image::{DynamicImage, ImageBuffer, Luma};
use visual_match::decode::{crop, decode, encode_png};

/// Scripted page: selectors resolve only when registered as live
#[derive(Default)]
pub struct FakePage {
    live: HashMap<String, usize>,
    described: HashMap<String, ElementLocation>,
    by_tag: HashMap<String, Vec<ElementLocation>>,
    screenshot: Option<Vec<u8>>,
    boxes: HashMap<String, BoundingBox>,
    regions: Vec<(BoundingBox, ElementLocation)>,
    count_delay: Option<Duration>,
    unreachable: AtomicBool,
    counts: Mutex<Vec<String>>,
    describes: AtomicUsize,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// `value` resolves to one element
    pub fn live(mut self, value: &str) -> Self {
        self.live.insert(value.to_string(), 1);
        self
    }

    pub fn live_many(mut self, value: &str, count: usize) -> Self {
        self.live.insert(value.to_string(), count);
        self
    }

    /// `describe(value)` returns `location`
    pub fn describes(mut self, value: &str, location: ElementLocation) -> Self {
        self.described.insert(value.to_string(), location);
        self
    }

    /// Element returned by `query_all(location.tag)`
    pub fn element(mut self, location: ElementLocation) -> Self {
        self.by_tag
            .entry(location.tag.clone())
            .or_default()
            .push(location);
        self
    }

    pub fn screenshot(mut self, png: Vec<u8>) -> Self {
        self.screenshot = Some(png);
        self
    }

    pub fn bounding_box(mut self, value: &str, bbox: BoundingBox) -> Self {
        self.boxes.insert(value.to_string(), bbox);
        self
    }

    /// `element_at_point` inside `bbox` returns `location`
    pub fn region(mut self, bbox: BoundingBox, location: ElementLocation) -> Self {
        self.regions.push((bbox, location));
        self
    }

    pub fn slow_counts(mut self, delay: Duration) -> Self {
        self.count_delay = Some(delay);
        self
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Selector values passed to `count`, in call order
    pub fn counted(&self) -> Vec<String> {
        self.counts.lock().unwrap().clone()
    }

    pub fn describe_calls(&self) -> usize {
        self.describes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), PageError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(PageError::Unreachable("target closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PagePort for FakePage {
    async fn count(&self, selector: &ElementSelector) -> Result<usize, PageError> {
        self.check()?;
        self.counts.lock().unwrap().push(selector.value.clone());
        if let Some(delay) = self.count_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.live.get(&selector.value).copied().unwrap_or(0))
    }

    async fn describe(
        &self,
        selector: &ElementSelector,
    ) -> Result<Option<ElementLocation>, PageError> {
        self.check()?;
        self.describes.fetch_add(1, Ordering::SeqCst);
        Ok(self.described.get(&selector.value).cloned())
    }

    async fn query_all(&self, tag: &str) -> Result<Vec<ElementLocation>, PageError> {
        self.check()?;
        Ok(self.by_tag.get(tag).cloned().unwrap_or_default())
    }

    async fn screenshot(&self, clip: Option<BoundingBox>) -> Result<Vec<u8>, PageError> {
        self.check()?;
        let Some(png) = &self.screenshot else {
            return Err(PageError::Unsupported("no screenshot scripted".to_string()));
        };
        match clip {
            None => Ok(png.clone()),
            Some(bbox) => {
                let page = decode(png).map_err(|e| PageError::Evaluation(e.to_string()))?;
                let cropped = crop(&page, &bbox).map_err(|e| PageError::Evaluation(e.to_string()))?;
                encode_png(&cropped).map_err(|e| PageError::Evaluation(e.to_string()))
            }
        }
    }

    async fn bounding_box(
        &self,
        selector: &ElementSelector,
    ) -> Result<Option<BoundingBox>, PageError> {
        self.check()?;
        Ok(self.boxes.get(&selector.value).copied())
    }

    async fn element_at_point(
        &self,
        x: f64,
        y: f64,
    ) -> Result<Option<ElementLocation>, PageError> {
        self.check()?;
        Ok(self
            .regions
            .iter()
            .find(|(bbox, _)| bbox.contains(x, y))
            .map(|(_, location)| location.clone()))
    }
}

/// Strategy counting its invocations, optionally answering with fixed
/// candidates after a delay
pub struct ScriptedStrategy {
    pub calls: AtomicUsize,
    candidates: Vec<ElementSelector>,
    delay: Option<Duration>,
}

impl ScriptedStrategy {
    pub fn new(candidates: Vec<ElementSelector>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            candidates,
            delay: None,
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            candidates: Vec::new(),
            delay: Some(delay),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealingStrategy for ScriptedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Structural
    }

    async fn candidates(
        &self,
        _ctx: &HealingContext,
        _location: Option<&ElementLocation>,
    ) -> Result<Vec<ElementSelector>, HealError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.candidates.clone())
    }
}

pub fn login_button() -> ElementLocation {
    ElementLocation::new("button")
        .with_attribute("id", "login-btn")
        .with_attribute("type", "submit")
        .with_text("Log in")
}

pub fn context(page: Arc<FakePage>, original: &str) -> HealingContext {
    HealingContext::new(page, ElementSelector::css(original, 1.0))
}

fn noise(x: u32, y: u32) -> u8 {
    let v = x.wrapping_mul(374_761_393) ^ y.wrapping_mul(668_265_263);
    (v.wrapping_mul(1_274_126_177) >> 24) as u8
}

pub const PATCH_W: u32 = 24;
pub const PATCH_H: u32 = 16;

/// Textured patch standing in for a rendered element
pub fn patch_png() -> Vec<u8> {
    let patch = DynamicImage::ImageLuma8(ImageBuffer::from_fn(PATCH_W, PATCH_H, |x, y| {
        Luma([noise(x, y)])
    }));
    encode_png(&patch).unwrap()
}

/// Dark 160x120 page with the patch drawn at (px, py)
pub fn page_png(px: u32, py: u32) -> Vec<u8> {
    let page = DynamicImage::ImageLuma8(ImageBuffer::from_fn(160, 120, |x, y| {
        if x >= px && x < px + PATCH_W && y >= py && y < py + PATCH_H {
            Luma([noise(x - px, y - py)])
        } else {
            Luma([0])
        }
    }));
    encode_png(&page).unwrap()
}
