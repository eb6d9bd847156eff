use crate::config::OcrConfig;
use crate::error::{MeterError, Result};
use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat, ImageReader, Luma};

/// Turn encoded image bytes into a recognition-ready raster
///
/// Applies the following transformations:
/// 1. Decodes any format the `image` crate can guess from the bytes
/// 2. Resizes large images while maintaining aspect ratio
/// 3. Converts to 8-bit grayscale, discarding alpha
/// 4. Amplifies contrast around the mean intensity by `config.contrast_factor`
///
/// Fails with `MeterError::Decode` when the bytes are not an image.
pub fn normalize_image(bytes: &[u8], config: &OcrConfig) -> Result<GrayImage> {
    let reader = ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| MeterError::Decode(format!("Failed to read image: {e}")))?;

    let img = reader
        .decode()
        .map_err(|e| MeterError::Decode(format!("Failed to decode image: {e}")))?;

    let img = resize_if_needed(img, config.max_image_dimension);
    let gray = img.to_luma8();

    Ok(enhance_contrast(gray, config.contrast_factor))
}

/// Encode a raster as PNG, the format handed to the OCR engine.
pub fn encode_png(gray: &GrayImage) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    gray.write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|e| MeterError::Encode(format!("Failed to encode image: {e}")))?;
    Ok(output)
}

/// Resize image if it exceeds maximum dimension while maintaining aspect ratio
///
/// Uses Lanczos3 filter for high-quality downscaling
fn resize_if_needed(img: DynamicImage, max_dim: u32) -> DynamicImage {
    let (width, height) = img.dimensions();

    if width <= max_dim && height <= max_dim {
        return img;
    }

    let ratio = if width > height {
        max_dim as f32 / width as f32
    } else {
        max_dim as f32 / height as f32
    };

    let new_width = ((width as f32 * ratio) as u32).max(1);
    let new_height = ((height as f32 * ratio) as u32).max(1);

    img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3)
}

/// Scale every pixel's distance from the mean intensity by `factor`
///
/// `factor` 1.0 leaves the image unchanged, 0.0 flattens it to the mean and
/// values above 1.0 push pixels towards black and white. Results are clamped
/// to the 8-bit range.
fn enhance_contrast(gray: GrayImage, factor: f32) -> GrayImage {
    let pixel_count = u64::from(gray.width()) * u64::from(gray.height());
    if pixel_count == 0 {
        return gray;
    }

    let sum: u64 = gray.pixels().map(|p| u64::from(p[0])).sum();
    let mean = (sum as f64 / pixel_count as f64).round() as f32;

    let mut out = gray;
    for pixel in out.pixels_mut() {
        let value = mean + factor * (f32::from(pixel[0]) - mean);
        *pixel = Luma([value.round().clamp(0.0, 255.0) as u8]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> OcrConfig {
        OcrConfig {
            max_image_dimension: 4096,
            ..OcrConfig::default()
        }
    }

    fn create_test_png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_rgb8(width, height);
        let mut output = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)
            .unwrap();
        output
    }

    fn create_test_rgba_png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_rgba8(width, height);
        let mut output = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)
            .unwrap();
        output
    }

    fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_rgb8(width, height);
        let mut output = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Jpeg)
            .unwrap();
        output
    }

    #[test]
    fn test_normalize_valid_png() {
        let config = create_test_config();
        let image_data = create_test_png(120, 40);

        let result = normalize_image(&image_data, &config);
        assert!(
            result.is_ok(),
            "Normalizing should succeed for valid image: {:?}",
            result.err()
        );

        let gray = result.unwrap();
        assert_eq!(gray.dimensions(), (120, 40), "Dimensions should be preserved");
    }

    #[test]
    fn test_normalize_rgba_drops_alpha() {
        let config = create_test_config();
        let rgba = create_test_rgba_png(64, 64);

        let gray = normalize_image(&rgba, &config).unwrap();
        assert_eq!(gray.dimensions(), (64, 64));
    }

    #[test]
    fn test_normalize_jpeg() {
        let config = create_test_config();
        let jpeg = create_test_jpeg(100, 100);

        let result = normalize_image(&jpeg, &config);
        assert!(
            result.is_ok(),
            "Should handle JPEG images: {:?}",
            result.err()
        );
    }

    #[test]
    fn test_invalid_image_data_is_decode_error() {
        let config = create_test_config();
        let invalid_data = vec![0u8, 1, 2, 3, 4, 5];

        let result = normalize_image(&invalid_data, &config);
        assert!(matches!(result, Err(MeterError::Decode(_))));
    }

    #[test]
    fn test_empty_payload_is_decode_error() {
        let config = create_test_config();
        let result = normalize_image(&[], &config);
        assert!(matches!(result, Err(MeterError::Decode(_))));
    }

    #[test]
    fn test_normalize_downscales_large_image() {
        let config = OcrConfig {
            max_image_dimension: 500,
            ..create_test_config()
        };
        let large = create_test_png(1000, 200);

        let gray = normalize_image(&large, &config).unwrap();
        assert_eq!(gray.dimensions(), (500, 100));
    }

    #[test]
    fn test_resize_if_needed_no_change() {
        let img = DynamicImage::new_rgb8(500, 500);
        let resized = resize_if_needed(img, 1000);

        let (w, h) = resized.dimensions();
        assert_eq!(w, 500, "Should not resize when under max dimension");
        assert_eq!(h, 500);
    }

    #[test]
    fn test_resize_if_needed_height_exceeded() {
        let img = DynamicImage::new_rgb8(500, 2000);
        let resized = resize_if_needed(img, 1000);

        let (w, h) = resized.dimensions();
        assert_eq!(w, 250, "Width should maintain aspect ratio");
        assert_eq!(h, 1000, "Height should be resized to max");
    }

    #[test]
    fn test_enhance_contrast_doubles_distance_from_mean() {
        // Two pixels at 100 and 140: mean 120, factor 2.0 gives 80 and 160.
        let mut gray = GrayImage::new(2, 1);
        gray.put_pixel(0, 0, Luma([100]));
        gray.put_pixel(1, 0, Luma([140]));

        let enhanced = enhance_contrast(gray, 2.0);
        assert_eq!(enhanced.get_pixel(0, 0)[0], 80);
        assert_eq!(enhanced.get_pixel(1, 0)[0], 160);
    }

    #[test]
    fn test_enhance_contrast_clamps() {
        let mut gray = GrayImage::new(2, 1);
        gray.put_pixel(0, 0, Luma([0]));
        gray.put_pixel(1, 0, Luma([255]));

        let enhanced = enhance_contrast(gray, 2.0);
        assert_eq!(enhanced.get_pixel(0, 0)[0], 0);
        assert_eq!(enhanced.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn test_enhance_contrast_identity_factor() {
        let mut gray = GrayImage::new(10, 10);
        for (i, pixel) in gray.pixels_mut().enumerate() {
            pixel[0] = (50 + i % 90) as u8;
        }

        let enhanced = enhance_contrast(gray.clone(), 1.0);
        assert_eq!(enhanced, gray);
    }

    #[test]
    fn test_enhance_contrast_flat_image() {
        let gray = GrayImage::from_pixel(10, 10, Luma([100]));
        let enhanced = enhance_contrast(gray, 2.0);

        for pixel in enhanced.pixels() {
            assert_eq!(pixel[0], 100, "Flat image pixels should remain unchanged");
        }
    }

    #[test]
    fn test_encode_png_roundtrips_dimensions() {
        let gray = GrayImage::from_pixel(30, 12, Luma([200]));
        let png = encode_png(&gray).unwrap();

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.dimensions(), (30, 12));
    }
}
