//! Average perceptual hash
//!
//! The image is reduced to 8x8 grayscale and each cell becomes one bit:
//! set when brighter than the mean. Small re-render noise rarely flips a
//! bit, so the Hamming distance between two hashes is a cheap similarity.

use image::imageops::FilterType;
use image::DynamicImage;

const HASH_SIDE: u32 = 8;
const HASH_BITS: u32 = HASH_SIDE * HASH_SIDE;

pub fn perceptual_hash(image: &DynamicImage) -> u64 {
    let small = image
        .resize_exact(HASH_SIDE, HASH_SIDE, FilterType::Triangle)
        .to_luma8();
    let pixels: Vec<u32> = small.pixels().map(|p| p[0] as u32).collect();
    let mean = pixels.iter().sum::<u32>() as f64 / pixels.len().max(1) as f64;

    pixels
        .iter()
        .enumerate()
        .fold(0u64, |hash, (bit, &value)| {
            if value as f64 > mean {
                hash | (1u64 << (HASH_BITS as usize - 1 - bit))
            } else {
                hash
            }
        })
}

pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// `1 - distance / 64`
pub fn hash_similarity(a: u64, b: u64) -> f64 {
    1.0 - hamming_distance(a, b) as f64 / HASH_BITS as f64
}

pub fn to_hex(hash: u64) -> String {
    format!("{:016x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    fn gradient(width: u32, height: u32, offset: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_fn(width, height, |x, _| {
            Luma([((x * 255 / width.max(1)) as u8).saturating_add(offset)])
        }))
    }

    #[test]
    fn test_hash_is_stable_under_scaling() {
        let small = perceptual_hash(&gradient(64, 64, 0));
        let large = perceptual_hash(&gradient(256, 128, 0));
        assert!(hamming_distance(small, large) <= 4);
    }

    #[test]
    fn test_hash_tolerates_brightness_shift() {
        let a = perceptual_hash(&gradient(64, 64, 0));
        let b = perceptual_hash(&gradient(64, 64, 3));
        assert!(hash_similarity(a, b) > 0.9);
    }

    #[test]
    fn test_uniform_image_hashes_to_zero() {
        let flat = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(16, 16, Luma([128])));
        assert_eq!(perceptual_hash(&flat), 0);
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(hash_similarity(0, 0), 1.0);
        assert_eq!(hash_similarity(0, u64::MAX), 0.0);
        assert_eq!(to_hex(255), "00000000000000ff");
    }
}
