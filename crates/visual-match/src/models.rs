///! Data models for visual matching
use selfheal_core_types::BoundingBox;
use serde::{Deserialize, Serialize};

/// Image region retained by template matching
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,

    /// Match score (0.0-1.0, 1.0 = perfect alignment)
    pub score: f64,
}

impl Region {
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(
            self.x as f64,
            self.y as f64,
            self.width as f64,
            self.height as f64,
        )
    }

    pub fn center(&self) -> (f64, f64) {
        self.bounding_box().center()
    }

    pub fn iou(&self, other: &Region) -> f64 {
        self.bounding_box().iou(&other.bounding_box())
    }
}

/// Template matching score function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Normalized cross-correlation, higher is better
    #[default]
    CrossCorrelationNormalized,

    /// Normalized sum of squared errors, mapped to `1 - error`
    SquaredErrorNormalized,
}

impl MatchMethod {
    /// Map a raw score from the matcher into a `[0, 1]` similarity
    pub fn similarity(&self, raw: f32) -> Option<f64> {
        if !raw.is_finite() {
            return None;
        }
        let raw = raw as f64;
        let score = match self {
            MatchMethod::CrossCorrelationNormalized => raw,
            MatchMethod::SquaredErrorNormalized => 1.0 - raw,
        };
        Some(score.clamp(0.0, 1.0))
    }
}

/// Options for template matching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Minimum score for a window to count as a detection
    pub threshold: f64,

    pub method: MatchMethod,

    /// Overlap above which a lower-scoring detection is suppressed
    pub iou_threshold: f64,

    /// Raw detections kept (best first) before suppression
    pub max_detections: usize,

    /// Regions returned after suppression
    pub max_regions: usize,

    /// Upper bound on `image pixels x template pixels`; larger searches are
    /// run on downscaled copies
    pub search_budget: u64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            method: MatchMethod::default(),
            iou_threshold: 0.3,
            max_detections: 500,
            max_regions: 5,
            search_budget: 400_000_000,
        }
    }
}

/// Blend weights for image similarity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    pub pixel: f64,
    pub feature: f64,
    pub histogram: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            pixel: 0.4,
            feature: 0.4,
            histogram: 0.2,
        }
    }
}

impl SimilarityWeights {
    pub fn total(&self) -> f64 {
        self.pixel + self.feature + self.histogram
    }
}

/// Breakdown of an image comparison
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityReport {
    /// `1 - mean absolute channel difference`
    pub pixel: f64,

    /// Share of keypoints with a partner in the other image
    pub feature: f64,

    /// Colour histogram correlation, clamped to `[0, 1]`
    pub histogram: f64,

    /// Weighted blend of the three
    pub combined: f64,
}
