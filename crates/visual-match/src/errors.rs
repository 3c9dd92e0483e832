//! Error types for visual matching

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VisualError {
    /// Image bytes could not be decoded
    #[error("Image decode failed: {0}")]
    Decode(String),

    /// Image processing error
    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    /// Template does not fit inside the searched image
    #[error("Template {template_w}x{template_h} larger than image {image_w}x{image_h}")]
    TemplateTooLarge {
        template_w: u32,
        template_h: u32,
        image_w: u32,
        image_h: u32,
    },

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<image::ImageError> for VisualError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing(err.to_string())
    }
}
