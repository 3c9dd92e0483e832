///! Image decode/encode helpers
use crate::errors::VisualError;
use image::{DynamicImage, GenericImageView};
use selfheal_core_types::BoundingBox;

/// Decode PNG/JPEG bytes
pub fn decode(data: &[u8]) -> Result<DynamicImage, VisualError> {
    if data.is_empty() {
        return Err(VisualError::Decode("empty image buffer".to_string()));
    }
    image::load_from_memory(data)
        .map_err(|e| VisualError::Decode(format!("Failed to decode image: {}", e)))
}

/// Encode as PNG
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, VisualError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| VisualError::ImageProcessing(format!("Failed to encode image: {}", e)))?;
    Ok(buf)
}

/// Crop a region, clamped to the image bounds
pub fn crop(image: &DynamicImage, bbox: &BoundingBox) -> Result<DynamicImage, VisualError> {
    let (width, height) = image.dimensions();
    let x = bbox.x.max(0.0).floor() as u32;
    let y = bbox.y.max(0.0).floor() as u32;
    if x >= width || y >= height {
        return Err(VisualError::InvalidInput(format!(
            "crop origin ({}, {}) outside {}x{} image",
            x, y, width, height
        )));
    }
    let w = (bbox.width.max(0.0).ceil() as u32).min(width - x);
    let h = (bbox.height.max(0.0).ceil() as u32).min(height - y);
    if w == 0 || h == 0 {
        return Err(VisualError::InvalidInput("crop region is empty".to_string()));
    }
    Ok(image.crop_imm(x, y, w, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    #[test]
    fn test_round_trip_png() {
        let img = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(4, 3, Rgba([1, 2, 3, 255])));
        let bytes = encode_png(&img).unwrap();
        let back = decode(&bytes).unwrap();
        assert_eq!(back.dimensions(), (4, 3));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(&[]), Err(VisualError::Decode(_))));
        assert!(matches!(decode(b"not an image"), Err(VisualError::Decode(_))));
    }

    #[test]
    fn test_crop_is_clamped() {
        let img = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(10, 10, Rgba([0, 0, 0, 255])));
        let cropped = crop(&img, &BoundingBox::new(8.0, 8.0, 10.0, 10.0)).unwrap();
        assert_eq!(cropped.dimensions(), (2, 2));
        assert!(crop(&img, &BoundingBox::new(20.0, 0.0, 5.0, 5.0)).is_err());
    }
}
