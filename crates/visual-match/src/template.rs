///! Template matching with non-maximum suppression
use crate::{decode::decode, errors::VisualError, models::*};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use imageproc::template_matching::{match_template, MatchTemplateMethod};
use tracing::debug;

/// Smallest template side kept when a search is downscaled
const MIN_TEMPLATE_SIDE: u32 = 8;

/// Template matching engine
#[derive(Debug, Clone, Default)]
pub struct TemplateMatcher {
    options: MatchOptions,
}

impl TemplateMatcher {
    pub fn new(options: MatchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Find `reference` inside `screenshot`, both encoded images
    pub fn find_bytes(
        &self,
        screenshot: &[u8],
        reference: &[u8],
    ) -> Result<Vec<Region>, VisualError> {
        let haystack = decode(screenshot)?;
        let template = decode(reference)?;
        self.find(&haystack, &template)
    }

    /// Regions of `haystack` resembling `template`, best first, overlaps
    /// suppressed
    pub fn find(
        &self,
        haystack: &DynamicImage,
        template: &DynamicImage,
    ) -> Result<Vec<Region>, VisualError> {
        let (image_w, image_h) = haystack.dimensions();
        let (template_w, template_h) = template.dimensions();
        if template_w == 0 || template_h == 0 {
            return Err(VisualError::InvalidInput("template is empty".to_string()));
        }
        if template_w > image_w || template_h > image_h {
            return Err(VisualError::TemplateTooLarge {
                template_w,
                template_h,
                image_w,
                image_h,
            });
        }

        let scale = self.search_scale(image_w, image_h, template_w, template_h);
        let (image, tpl) = if scale < 1.0 {
            debug!("Downscaling template search by {:.3}", scale);
            (
                resize(haystack, scale).to_luma8(),
                resize(template, scale).to_luma8(),
            )
        } else {
            (haystack.to_luma8(), template.to_luma8())
        };

        let scores = match_template(&image, &tpl, method_for(self.options.method));

        let mut detections = Vec::new();
        for (x, y, pixel) in scores.enumerate_pixels() {
            let Some(score) = self.options.method.similarity(pixel[0]) else {
                continue;
            };
            if score >= self.options.threshold {
                detections.push(Region {
                    x: (x as f64 / scale).round() as u32,
                    y: (y as f64 / scale).round() as u32,
                    width: template_w,
                    height: template_h,
                    score,
                });
            }
        }

        debug!(
            "Template search produced {} raw detections at threshold {:.2}",
            detections.len(),
            self.options.threshold
        );

        sort_by_score(&mut detections);
        detections.truncate(self.options.max_detections);

        Ok(non_max_suppression(
            detections,
            self.options.iou_threshold,
            self.options.max_regions,
        ))
    }

    /// Factor in `(0, 1]` keeping `image px * template px` within budget
    fn search_scale(&self, image_w: u32, image_h: u32, template_w: u32, template_h: u32) -> f64 {
        let cost = image_w as f64 * image_h as f64 * template_w as f64 * template_h as f64;
        let budget = self.options.search_budget as f64;
        if budget <= 0.0 || cost <= budget {
            return 1.0;
        }
        // Both images shrink in two dimensions, so cost scales with s^4
        let scale = (budget / cost).powf(0.25);
        let floor = MIN_TEMPLATE_SIDE as f64 / template_w.min(template_h) as f64;
        scale.max(floor).min(1.0)
    }
}

fn resize(image: &DynamicImage, scale: f64) -> DynamicImage {
    let (w, h) = image.dimensions();
    let w = ((w as f64 * scale).round() as u32).max(1);
    let h = ((h as f64 * scale).round() as u32).max(1);
    image.resize_exact(w, h, FilterType::Triangle)
}

fn method_for(method: MatchMethod) -> MatchTemplateMethod {
    match method {
        MatchMethod::CrossCorrelationNormalized => MatchTemplateMethod::CrossCorrelationNormalized,
        MatchMethod::SquaredErrorNormalized => MatchTemplateMethod::SumOfSquaredErrorsNormalized,
    }
}

fn sort_by_score(regions: &mut [Region]) {
    regions.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.cmp(&b.y))
            .then(a.x.cmp(&b.x))
    });
}

/// Greedy non-maximum suppression: walk detections best first and keep one
/// only if it overlaps every kept region by at most `iou_threshold`.
pub fn non_max_suppression(
    mut detections: Vec<Region>,
    iou_threshold: f64,
    max_keep: usize,
) -> Vec<Region> {
    sort_by_score(&mut detections);
    let mut kept: Vec<Region> = Vec::new();
    for candidate in detections {
        if kept.len() >= max_keep {
            break;
        }
        if kept.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    fn noise(x: u32, y: u32) -> u8 {
        let v = x.wrapping_mul(374_761_393) ^ y.wrapping_mul(668_265_263);
        (v.wrapping_mul(1_274_126_177) >> 24) as u8
    }

    /// Dark background with a textured patch at (px, py); `cell` sets the
    /// texture grain
    fn scene(px: u32, py: u32, cell: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_fn(120, 90, |x, y| {
            if x >= px && x < px + 24 && y >= py && y < py + 16 {
                Luma([noise((x - px) / cell, (y - py) / cell)])
            } else {
                Luma([0])
            }
        }))
    }

    fn patch(cell: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_fn(24, 16, |x, y| {
            Luma([noise(x / cell, y / cell)])
        }))
    }

    #[test]
    fn test_finds_shifted_patch() {
        let matcher = TemplateMatcher::default();
        let regions = matcher.find(&scene(45, 35, 1), &patch(1)).unwrap();
        assert!(!regions.is_empty());
        let best = regions[0];
        assert_eq!((best.x, best.y), (45, 35));
        assert!(best.score > 0.99);
    }

    #[test]
    fn test_squared_error_method() {
        let matcher = TemplateMatcher::new(MatchOptions {
            method: MatchMethod::SquaredErrorNormalized,
            ..MatchOptions::default()
        });
        let regions = matcher.find(&scene(10, 60, 1), &patch(1)).unwrap();
        assert_eq!((regions[0].x, regions[0].y), (10, 60));
    }

    #[test]
    fn test_template_too_large() {
        let small = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(10, 10, Luma([0])));
        let err = TemplateMatcher::default().find(&small, &patch(1)).unwrap_err();
        assert!(matches!(err, VisualError::TemplateTooLarge { .. }));
    }

    #[test]
    fn test_nms_collapses_overlaps() {
        let region = |x, score| Region {
            x,
            y: 0,
            width: 10,
            height: 10,
            score,
        };
        let kept = non_max_suppression(
            vec![region(0, 0.85), region(1, 0.95), region(2, 0.9), region(40, 0.82)],
            0.3,
            5,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].x, 1);
        assert_eq!(kept[0].score, 0.95);
        assert_eq!(kept[1].x, 40);
    }

    #[test]
    fn test_downscaled_search_maps_back() {
        let matcher = TemplateMatcher::new(MatchOptions {
            search_budget: 1_000_000,
            ..MatchOptions::default()
        });
        let regions = matcher.find(&scene(48, 32, 4), &patch(4)).unwrap();
        assert!(!regions.is_empty());
        let best = regions[0];
        assert!(best.x.abs_diff(48) <= 3 && best.y.abs_diff(32) <= 3);
        assert_eq!((best.width, best.height), (24, 16));
    }
}
