///! Tri-modal image similarity
///!
///! Pixel difference catches exact re-renders, keypoint matching survives
///! small scale/translation changes, histogram correlation survives minor
///! layout shifts. The blend is symmetric in its two inputs.
use crate::{decode::decode, errors::VisualError, models::*};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbaImage};
use imageproc::corners::{corners_fast9, Corner};

const HISTOGRAM_BINS: usize = 32;
const MAX_KEYPOINTS: usize = 256;

/// Image similarity scorer
#[derive(Debug, Clone)]
pub struct ImageSimilarity {
    weights: SimilarityWeights,

    /// Both images are resampled to a `frame x frame` square before comparing
    frame: u32,

    /// FAST-9 intensity threshold
    fast_threshold: u8,

    /// Max distance (in frame pixels) for two keypoints to pair up
    match_radius: u32,
}

impl Default for ImageSimilarity {
    fn default() -> Self {
        Self::new(SimilarityWeights::default())
    }
}

impl ImageSimilarity {
    pub fn new(weights: SimilarityWeights) -> Self {
        Self {
            weights,
            frame: 128,
            fast_threshold: 20,
            match_radius: 3,
        }
    }

    pub fn weights(&self) -> SimilarityWeights {
        self.weights
    }

    /// Compare two encoded images
    pub fn compare_bytes(&self, a: &[u8], b: &[u8]) -> Result<SimilarityReport, VisualError> {
        let a = decode(a)?;
        let b = decode(b)?;
        Ok(self.compare(&a, &b))
    }

    pub fn compare(&self, a: &DynamicImage, b: &DynamicImage) -> SimilarityReport {
        let a = a.resize_exact(self.frame, self.frame, FilterType::Triangle);
        let b = b.resize_exact(self.frame, self.frame, FilterType::Triangle);
        let (a_rgba, b_rgba) = (a.to_rgba8(), b.to_rgba8());

        let pixel = pixel_similarity(&a_rgba, &b_rgba);
        let feature = self.feature_similarity(&a.to_luma8(), &b.to_luma8());
        let histogram = histogram_correlation(&a_rgba, &b_rgba);

        let total = self.weights.total();
        let combined = if total <= 0.0 {
            0.0
        } else {
            (pixel * self.weights.pixel
                + feature * self.weights.feature
                + histogram * self.weights.histogram)
                / total
        };

        SimilarityReport {
            pixel,
            feature,
            histogram,
            combined: combined.clamp(0.0, 1.0),
        }
    }

    fn feature_similarity(&self, a: &GrayImage, b: &GrayImage) -> f64 {
        let a_points = strongest(corners_fast9(a, self.fast_threshold));
        let b_points = strongest(corners_fast9(b, self.fast_threshold));

        let total = a_points.len() + b_points.len();
        if total == 0 {
            // Neither image has texture; nothing distinguishes them
            return 1.0;
        }

        let matched_a = count_partnered(&a_points, &b_points, self.match_radius);
        let matched_b = count_partnered(&b_points, &a_points, self.match_radius);
        (matched_a + matched_b) as f64 / total as f64
    }
}

fn strongest(mut corners: Vec<Corner>) -> Vec<Corner> {
    corners.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.cmp(&b.y))
            .then(a.x.cmp(&b.x))
    });
    corners.truncate(MAX_KEYPOINTS);
    corners
}

fn count_partnered(points: &[Corner], others: &[Corner], radius: u32) -> usize {
    points
        .iter()
        .filter(|p| {
            others
                .iter()
                .any(|o| p.x.abs_diff(o.x) <= radius && p.y.abs_diff(o.y) <= radius)
        })
        .count()
}

fn pixel_similarity(a: &RgbaImage, b: &RgbaImage) -> f64 {
    let mut diff = 0u64;
    let mut samples = 0u64;
    for (pa, pb) in a.pixels().zip(b.pixels()) {
        for channel in 0..3 {
            diff += pa[channel].abs_diff(pb[channel]) as u64;
            samples += 1;
        }
    }
    if samples == 0 {
        return 1.0;
    }
    1.0 - diff as f64 / (samples as f64 * 255.0)
}

fn histogram_correlation(a: &RgbaImage, b: &RgbaImage) -> f64 {
    let (ha, hb) = (histograms(a), histograms(b));
    let total: f64 = (0..3).map(|c| correlation(&ha[c], &hb[c])).sum();
    (total / 3.0).clamp(0.0, 1.0)
}

fn histograms(image: &RgbaImage) -> [[f64; HISTOGRAM_BINS]; 3] {
    let mut bins = [[0.0; HISTOGRAM_BINS]; 3];
    let width = 256 / HISTOGRAM_BINS;
    for pixel in image.pixels() {
        for (channel, hist) in bins.iter_mut().enumerate() {
            hist[pixel[channel] as usize / width] += 1.0;
        }
    }
    bins
}

/// Pearson correlation of two histograms
fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON {
        return if a == b { 1.0 } else { 0.0 };
    }
    cov / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn textured(width: u32, height: u32, shift: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(ImageBuffer::from_fn(width, height, |x, y| {
            let v = (((x + shift) / 8 + y / 8) % 2) as u8 * 200 + 30;
            Rgba([v, v / 2, 255 - v, 255])
        }))
    }

    fn solid(color: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(ImageBuffer::from_pixel(32, 32, Rgba(color)))
    }

    #[test]
    fn test_identical_images_score_one() {
        let img = textured(64, 64, 0);
        let report = ImageSimilarity::default().compare(&img, &img);
        assert!((report.pixel - 1.0).abs() < 1e-9);
        assert!((report.feature - 1.0).abs() < 1e-9);
        assert!((report.histogram - 1.0).abs() < 1e-9);
        assert!((report.combined - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_symmetry() {
        let scorer = ImageSimilarity::default();
        let a = textured(64, 64, 0);
        let b = textured(64, 64, 5);
        let ab = scorer.compare(&a, &b);
        let ba = scorer.compare(&b, &a);
        assert!((ab.combined - ba.combined).abs() < 1e-12);
        assert!(ab.combined < 1.0);
    }

    #[test]
    fn test_different_colours_score_low() {
        let scorer = ImageSimilarity::default();
        let report = scorer.compare(&solid([255, 0, 0, 255]), &solid([0, 0, 255, 255]));
        assert!(report.pixel < 0.5);
        assert!(report.histogram < 0.5);
        assert!(report.combined < 0.7);
    }

    #[test]
    fn test_weights_drive_blend() {
        let scorer = ImageSimilarity::new(SimilarityWeights {
            pixel: 1.0,
            feature: 0.0,
            histogram: 0.0,
        });
        let report = scorer.compare(&solid([255, 0, 0, 255]), &solid([0, 0, 255, 255]));
        assert!((report.combined - report.pixel).abs() < 1e-9);
    }
}
