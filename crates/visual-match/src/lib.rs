//! Visual matching primitives for element recovery
//!
//! This crate provides the image side of healing:
//! - Image decoding and cropping
//! - Template matching with non-maximum suppression
//! - 8x8 average perceptual hash
//! - Tri-modal image similarity (pixel, keypoint, histogram)

pub mod decode;
pub mod errors;
pub mod hash;
pub mod models;
pub mod similarity;
pub mod template;

// Re-exports
pub use errors::VisualError;
pub use hash::{hamming_distance, hash_similarity, perceptual_hash};
pub use models::*;
pub use similarity::ImageSimilarity;
pub use template::{non_max_suppression, TemplateMatcher};
